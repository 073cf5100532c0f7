use serde::{Deserialize, Serialize};

use crate::item::MediaItem;

/// A directory node discovered during a scan pass.
///
/// Rescanning the same path replaces the node wholesale (no merging);
/// nodes live for the life of the scanner instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannedFolder {
    pub path: String,
    /// Files not yet moved into the working queue.
    pub files: Vec<MediaItem>,
    /// File count at discovery time; stays fixed while `files` drains,
    /// so sampling weights do not shift as the queue is replenished.
    pub file_count: usize,
    pub depth: u32,
    /// Whether this folder has already been counted toward discovery
    /// totals (guards double counting on rescan).
    pub recorded: bool,
}

impl ScannedFolder {
    pub fn new(path: impl Into<String>, files: Vec<MediaItem>, depth: u32) -> Self {
        let file_count = files.len();
        Self {
            path: path.into(),
            files,
            file_count,
            depth,
            recorded: false,
        }
    }
}
