//! Fully-defaulted configuration structs read by the engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use driftframe_model::{OrderBy, OrderDirection, QueryFilters};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideshowMode {
    Random,
    Sequential,
}

/// A folder-path pattern that boosts the sampling probability of files
/// under matching folders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityFolder {
    pub path: String,
    pub weight_multiplier: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedSource {
    SingleMedia { path: String },
    Folder(ResolvedFolder),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFolder {
    pub path: String,
    pub mode: SlideshowMode,
    /// `None` = unlimited recursion; `Some(0)` = base folder only.
    pub scan_depth: Option<u32>,
    pub estimated_total_photos: Option<u64>,
    pub priority_folders: Vec<PriorityFolder>,
    pub use_media_index_for_discovery: bool,
    pub priority_new_files: bool,
    pub new_files_threshold_seconds: u64,
    pub order_by: OrderBy,
    pub order_direction: OrderDirection,
    pub media_root_marker: String,
    pub folder_date_pattern: Option<String>,
}

impl ResolvedFolder {
    /// Bounded sibling concurrency for the scanner: 2 in random mode, 1
    /// in sequential mode to preserve strict ordering.
    pub fn scan_concurrency(&self) -> usize {
        match self.mode {
            SlideshowMode::Random => 2,
            SlideshowMode::Sequential => 1,
        }
    }
}

/// Heuristic constants. The values match the behavior the engine was
/// tuned against; none of them is load-bearing for correctness, so they
/// are configurable rather than hard-coded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tuning {
    /// Duplicate-filter rate above which a random refill counts as
    /// "mostly exhausted".
    pub high_filter_rate: f64,
    /// Consecutive high-filter refills before the prioritize-recent
    /// query path is skipped proactively.
    pub exhaustion_latch: u32,
    /// Buffer size under which index-backed providers refill.
    pub refill_low_water: usize,
    /// Multiplier applied when a priority-folder rule omits its own.
    pub default_priority_multiplier: f64,
    pub browse_timeout_secs: u64,
    /// Retry ceiling when a provider keeps returning items already in
    /// the navigation queue.
    pub max_repeat_retries: u32,
    pub rpc_retry_attempts: u32,
    pub rpc_retry_base_ms: u64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            high_filter_rate: 0.8,
            exhaustion_latch: 2,
            refill_low_water: 10,
            default_priority_multiplier: 3.0,
            browse_timeout_secs: 30,
            max_repeat_retries: 10,
            rpc_retry_attempts: 3,
            rpc_retry_base_ms: 250,
        }
    }
}

impl Tuning {
    pub fn browse_timeout(&self) -> Duration {
        Duration::from_secs(self.browse_timeout_secs)
    }

    pub fn rpc_retry_base(&self) -> Duration {
        Duration::from_millis(self.rpc_retry_base_ms)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub source: ResolvedSource,
    pub media_index_entity: Option<String>,
    /// Target queue size / scan batch size.
    pub slideshow_window: usize,
    /// Sliding-window maximum for the navigation queue.
    pub navigation_queue_size: usize,
    pub filters: QueryFilters,
    pub tuning: Tuning,
}

impl ResolvedConfig {
    /// Session-history cap, derived from the queue window and the
    /// refresh cadence.
    pub fn history_cap(&self) -> usize {
        self.navigation_queue_size + 2 * self.slideshow_window
    }
}
