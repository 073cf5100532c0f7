//! Media source strategies behind one uniform contract.
//!
//! The façade ([`FolderProvider`]) dispatches over a tagged set of
//! variants rather than an inheritance chain: the filesystem scanner,
//! the cursor-paginated index provider, the batch-random index
//! provider, and the trivial single-file provider.

pub mod folder;
pub mod paged;
pub mod random;
pub mod single;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use driftframe_model::{MediaItem, normalize_media_id};

use crate::error::Result;

pub use folder::FolderProvider;
pub use paged::PagedIndexProvider;
pub use random::RandomIndexProvider;
pub use single::SingleFileProvider;

/// Normalized ids of items the session has already displayed. Owned by
/// the navigation controller; providers hold a read-mostly handle for
/// duplicate filtering. The one sanctioned cross-owner write is the
/// random provider clearing it on a dynamic-filter reset.
pub type SharedSeen = Arc<RwLock<HashSet<String>>>;

/// Uniform contract implemented by every media source strategy.
#[async_trait]
pub trait MediaProvider: Send {
    /// Prepare the provider. Hard failures (an explicitly requested
    /// index backend that cannot answer, filters that match nothing)
    /// surface here as errors; they are never silently downgraded.
    async fn initialize(&mut self) -> Result<()>;

    /// Next item, or `None` when the source is exhausted for now.
    /// Never errors for read-path degradation.
    async fn get_next(&mut self) -> Result<Option<MediaItem>>;

    /// Tri-state existence check; `None` means unknown — proceed
    /// optimistically.
    async fn check_file_exists(&self, item: &MediaItem) -> Option<bool>;

    /// Record a 404'd file so it is never returned again.
    async fn exclude_file(&mut self, id: &str);

    /// Clear cursors/caches so the next [`Self::get_next`] starts from
    /// the beginning of the collection.
    async fn reset(&mut self) -> Result<()>;

    /// Re-discover the backing source from scratch.
    async fn rescan(&mut self) -> Result<()>;

    /// Items discovered after `cutoff`, for freshness reconciliation.
    async fn files_newer_than(&self, cutoff: DateTime<Utc>) -> Vec<MediaItem>;
}

/// Excluded-path set holding both the raw and the normalized form of
/// every id. The same file can arrive tagged by path or by URI
/// depending on the call site; membership checks must try both.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    raw: HashSet<String>,
    normalized: HashSet<String>,
    uri_prefix: Option<String>,
}

impl ExclusionSet {
    pub fn new(uri_prefix: Option<String>) -> Self {
        Self {
            raw: HashSet::new(),
            normalized: HashSet::new(),
            uri_prefix,
        }
    }

    pub fn insert(&mut self, id: &str) {
        self.raw.insert(id.to_string());
        self.normalized
            .insert(normalize_media_id(id, self.uri_prefix.as_deref()));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.raw.contains(id)
            || self
                .normalized
                .contains(&normalize_media_id(id, self.uri_prefix.as_deref()))
    }

    pub fn clear(&mut self) {
        self.raw.clear();
        self.normalized.clear();
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusion_matches_both_uri_and_path_forms() {
        let mut set = ExclusionSet::new(Some("media-source://immich/".to_string()));
        set.insert("media-source://immich/photos/a%20b.jpg");
        assert!(set.contains("media-source://immich/photos/a%20b.jpg"));
        assert!(set.contains("photos/a b.jpg"));
        assert!(!set.contains("photos/other.jpg"));
    }
}
