//! Core data model definitions shared across driftframe crates.
#![allow(missing_docs)]

pub mod cursor;
pub mod filters;
pub mod folder;
pub mod item;
pub mod sort;

// Intentionally curated re-exports for downstream consumers.
pub use cursor::{CursorValue, PageCursor};
pub use filters::{DateBound, DateRange, FavoriteFilter, QueryFilters};
pub use folder::ScannedFolder;
pub use item::{MediaItem, MediaKind, MediaMetadata, normalize_media_id};
pub use sort::{OrderBy, OrderDirection, compare_by_date_fallback, sort_date};
