//! Configuration for the driftframe slideshow engine.
//!
//! The schema mirrors what a dashboard card hands us (TOML or JSON);
//! `schema` holds the raw serde layer and `resolved` the fully-defaulted
//! structs the engine actually reads. Every default is applied in one
//! place — [`schema::CardConfig::resolve`] — so downstream code never
//! touches raw, partially-specified configuration.

pub mod error;
pub mod resolved;
pub mod schema;

use std::path::Path;

pub use error::{ConfigError, Result};
pub use resolved::{
    PriorityFolder, ResolvedConfig, ResolvedFolder, ResolvedSource, SlideshowMode, Tuning,
};
pub use schema::CardConfig;

/// Load and resolve a configuration document from a TOML string.
pub fn load_toml_str(input: &str) -> Result<ResolvedConfig> {
    let raw: CardConfig = toml::from_str(input)?;
    raw.resolve()
}

/// Load and resolve a configuration document from a JSON string.
pub fn load_json_str(input: &str) -> Result<ResolvedConfig> {
    let raw: CardConfig = serde_json::from_str(input)?;
    raw.resolve()
}

/// Load a configuration file, dispatching on the file extension
/// (`.toml` vs `.json`).
pub fn load_path(path: impl AsRef<Path>) -> Result<ResolvedConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(path.display().to_string(), e))?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => load_json_str(&contents),
        _ => load_toml_str(&contents),
    }
}
