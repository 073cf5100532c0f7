//! # driftframe-core
//!
//! Media discovery and navigation engine for the driftframe slideshow:
//! given a media source (a single file, or a folder discovered via
//! host-side browsing or a companion indexing service), produce an
//! ordered or random stream of image/video items, track navigation
//! history, and keep a long-running display fresh.
//!
//! ## Architecture
//!
//! - [`host`]: the dashboard host's RPC surface behind an async seam,
//!   with an HTTP adapter and an in-memory fake
//! - [`index`]: typed client for the indexing integration, with
//!   sentinel-valued degradation on the read path
//! - [`extract`]: pure path/filename metadata and date heuristics
//! - [`scan`]: recursive folder scanning with weighted sampling
//! - [`providers`]: the uniform provider contract and its strategies
//! - [`navigation`]: the sliding-window queue and session history
//! - [`session`]: optional page-reconnect handoff
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use driftframe_core::{Engine, host::memory::MemoryHost};
//!
//! async fn run() -> driftframe_core::Result<()> {
//!     let cfg = driftframe_config::load_toml_str(
//!         r#"
//!         media_source_type = "folder"
//!
//!         [folder]
//!         path = "media-source://media_source/local/photos"
//!         "#,
//!     )?;
//!     let host = Arc::new(MemoryHost::new());
//!     let mut engine = Engine::from_config(host, cfg, None).await?;
//!     while let Some(item) = engine.controller_mut().advance().await? {
//!         println!("showing {}", item.id);
//!     }
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

pub mod engine;
pub mod error;
pub mod extract;
pub mod host;
pub mod index;
pub mod navigation;
pub mod providers;
pub mod retry;
pub mod scan;
pub mod session;

pub use engine::Engine;
pub use error::{EngineError, Result};
pub use index::{EffectiveFilters, IndexGateway};
pub use navigation::{NavigationConfig, NavigationController};
pub use providers::{
    FolderProvider, MediaProvider, PagedIndexProvider, RandomIndexProvider, SingleFileProvider,
};
pub use scan::{FolderScanner, ScanPhase, ScanProgress, ScannerConfig};
pub use session::{MemorySessionStore, SessionStore};
