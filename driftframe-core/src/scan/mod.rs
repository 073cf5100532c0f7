//! Hierarchical folder scanning with probabilistic sampling.

pub mod estimate;
pub mod sampling;
pub mod scanner;

pub use estimate::EstimateTracker;
pub use scanner::{FolderScanner, ScanPhase, ScanProgress, ScanSnapshot, ScannerConfig};
