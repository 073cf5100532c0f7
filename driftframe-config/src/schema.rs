//! Raw serde layer for card configuration documents.
//!
//! Nothing outside this module reads these types; [`CardConfig::resolve`]
//! turns them into [`crate::resolved`] structs with every default applied.

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use driftframe_model::{DateBound, DateRange, FavoriteFilter, OrderBy, OrderDirection, QueryFilters};

use crate::error::{ConfigError, Result};
use crate::resolved::{
    PriorityFolder, ResolvedConfig, ResolvedFolder, ResolvedSource, SlideshowMode, Tuning,
};

static ENTITY_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_]+\.[A-Za-z0-9_]+$").expect("valid entity id regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaSourceType {
    SingleMedia,
    Folder,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CardConfig {
    pub media_source_type: MediaSourceType,
    /// Path or URI of the single item when `media_source_type` is
    /// `single_media`.
    #[serde(default)]
    pub media_path: Option<String>,
    #[serde(default)]
    pub folder: Option<FolderSection>,
    #[serde(default)]
    pub media_index: Option<MediaIndexSection>,
    /// Target queue size, also used as the scan batch size.
    #[serde(default)]
    pub slideshow_window: Option<usize>,
    /// Sliding-window maximum for the navigation queue.
    #[serde(default)]
    pub navigation_queue_size: Option<usize>,
    #[serde(default)]
    pub filters: Option<FiltersSection>,
    #[serde(default)]
    pub tuning: Option<TuningSection>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FolderSection {
    pub path: String,
    #[serde(default)]
    pub mode: Option<ModeRaw>,
    #[serde(default)]
    pub recursive: Option<bool>,
    /// `null`/absent = unlimited recursion (when `recursive`), `0` =
    /// base folder only, `N` = recurse N levels below base.
    #[serde(default)]
    pub scan_depth: Option<u32>,
    #[serde(default)]
    pub estimated_total_photos: Option<u64>,
    #[serde(default)]
    pub priority_folders: Vec<PriorityFolderRaw>,
    #[serde(default)]
    pub use_media_index_for_discovery: Option<bool>,
    #[serde(default)]
    pub priority_new_files: Option<bool>,
    #[serde(default)]
    pub new_files_threshold_seconds: Option<u64>,
    #[serde(default)]
    pub sequential: Option<SequentialSection>,
    /// Path segment marking the media root; folders are reported
    /// relative to it.
    #[serde(default)]
    pub media_root_marker: Option<String>,
    /// Custom date pattern (`YYYY`/`MM`/`DD`/`HH`/`mm`/`ss` tokens)
    /// matched against folder names before any filename heuristics.
    #[serde(default)]
    pub folder_date_pattern: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeRaw {
    Random,
    Sequential,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PriorityFolderRaw {
    pub path: String,
    #[serde(default)]
    pub weight_multiplier: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SequentialSection {
    #[serde(default)]
    pub order_by: Option<OrderBy>,
    #[serde(default)]
    pub order_direction: Option<OrderDirection>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MediaIndexSection {
    pub entity_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FiltersSection {
    /// `true`/`false`, or an entity id resolved at query time.
    #[serde(default)]
    pub favorites: Option<FavoriteRaw>,
    #[serde(default)]
    pub date_range: Option<DateRangeRaw>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FavoriteRaw {
    Fixed(bool),
    Entity(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DateRangeRaw {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TuningSection {
    #[serde(default)]
    pub high_filter_rate: Option<f64>,
    #[serde(default)]
    pub exhaustion_latch: Option<u32>,
    #[serde(default)]
    pub refill_low_water: Option<usize>,
    #[serde(default)]
    pub default_priority_multiplier: Option<f64>,
    #[serde(default)]
    pub browse_timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_repeat_retries: Option<u32>,
    #[serde(default)]
    pub rpc_retry_attempts: Option<u32>,
    #[serde(default)]
    pub rpc_retry_base_ms: Option<u64>,
}

impl CardConfig {
    /// Apply every default and validation in one pass. This is the only
    /// place raw configuration is interpreted.
    pub fn resolve(self) -> Result<ResolvedConfig> {
        let tuning = resolve_tuning(self.tuning.unwrap_or_default());
        let filters = match self.filters {
            Some(section) => resolve_filters(section)?,
            None => QueryFilters::default(),
        };

        let source = match self.media_source_type {
            MediaSourceType::SingleMedia => {
                let path = self.media_path.ok_or_else(|| {
                    ConfigError::Invalid("media_source_type single_media requires media_path".into())
                })?;
                ResolvedSource::SingleMedia { path }
            }
            MediaSourceType::Folder => {
                let section = self.folder.ok_or_else(|| {
                    ConfigError::Invalid("media_source_type folder requires a folder section".into())
                })?;
                ResolvedSource::Folder(resolve_folder(section, &tuning)?)
            }
        };

        Ok(ResolvedConfig {
            source,
            media_index_entity: self.media_index.map(|s| s.entity_id),
            slideshow_window: self.slideshow_window.unwrap_or(50).max(1),
            navigation_queue_size: self.navigation_queue_size.unwrap_or(100).max(2),
            filters,
            tuning,
        })
    }
}

fn resolve_folder(section: FolderSection, tuning: &Tuning) -> Result<ResolvedFolder> {
    if section.path.is_empty() {
        return Err(ConfigError::Invalid("folder.path must not be empty".into()));
    }

    let recursive = section.recursive.unwrap_or(true);
    let scan_depth = if recursive { section.scan_depth } else { Some(0) };

    let sequential = section.sequential.unwrap_or(SequentialSection {
        order_by: None,
        order_direction: None,
    });

    Ok(ResolvedFolder {
        path: section.path,
        mode: match section.mode.unwrap_or(ModeRaw::Random) {
            ModeRaw::Random => SlideshowMode::Random,
            ModeRaw::Sequential => SlideshowMode::Sequential,
        },
        scan_depth,
        estimated_total_photos: section.estimated_total_photos,
        priority_folders: section
            .priority_folders
            .into_iter()
            .map(|p| PriorityFolder {
                path: p.path,
                weight_multiplier: p
                    .weight_multiplier
                    .unwrap_or(tuning.default_priority_multiplier),
            })
            .collect(),
        use_media_index_for_discovery: section.use_media_index_for_discovery.unwrap_or(false),
        priority_new_files: section.priority_new_files.unwrap_or(false),
        new_files_threshold_seconds: section.new_files_threshold_seconds.unwrap_or(86_400),
        order_by: sequential.order_by.unwrap_or(OrderBy::DateTaken),
        order_direction: sequential.order_direction.unwrap_or(OrderDirection::Desc),
        media_root_marker: section
            .media_root_marker
            .unwrap_or_else(|| "media".to_string()),
        folder_date_pattern: section.folder_date_pattern,
    })
}

fn resolve_tuning(section: TuningSection) -> Tuning {
    let defaults = Tuning::default();
    Tuning {
        high_filter_rate: section.high_filter_rate.unwrap_or(defaults.high_filter_rate),
        exhaustion_latch: section.exhaustion_latch.unwrap_or(defaults.exhaustion_latch),
        refill_low_water: section.refill_low_water.unwrap_or(defaults.refill_low_water),
        default_priority_multiplier: section
            .default_priority_multiplier
            .unwrap_or(defaults.default_priority_multiplier),
        browse_timeout_secs: section
            .browse_timeout_secs
            .unwrap_or(defaults.browse_timeout_secs),
        max_repeat_retries: section
            .max_repeat_retries
            .unwrap_or(defaults.max_repeat_retries),
        rpc_retry_attempts: section
            .rpc_retry_attempts
            .unwrap_or(defaults.rpc_retry_attempts),
        rpc_retry_base_ms: section
            .rpc_retry_base_ms
            .unwrap_or(defaults.rpc_retry_base_ms),
    }
}

fn resolve_filters(section: FiltersSection) -> Result<QueryFilters> {
    let favorites = match section.favorites {
        Some(FavoriteRaw::Fixed(value)) => Some(FavoriteFilter::Fixed(value)),
        Some(FavoriteRaw::Entity(id)) => {
            if !ENTITY_ID.is_match(&id) {
                return Err(ConfigError::Invalid(format!(
                    "filters.favorites is neither a boolean nor an entity id: {id}"
                )));
            }
            Some(FavoriteFilter::Entity(id))
        }
        None => None,
    };

    let date_range = match section.date_range {
        Some(range) => {
            let start = range.start.map(|s| resolve_date_bound(&s, "start")).transpose()?;
            let end = range.end.map(|s| resolve_date_bound(&s, "end")).transpose()?;
            Some(DateRange { start, end })
        }
        None => None,
    };

    Ok(QueryFilters {
        favorites,
        date_range,
    })
}

fn resolve_date_bound(input: &str, which: &str) -> Result<DateBound> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(DateBound::Fixed(dt.with_timezone(&Utc)));
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let dt = date
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            .and_utc();
        return Ok(DateBound::Fixed(dt));
    }
    if ENTITY_ID.is_match(input) {
        return Ok(DateBound::Entity(input.to_string()));
    }
    Err(ConfigError::Invalid(format!(
        "filters.date_range.{which} is neither a date nor an entity id: {input}"
    )))
}
