use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Media classification derived from a file extension or a
/// source-provided class hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Unknown,
}

impl MediaKind {
    pub fn is_displayable(&self) -> bool {
        matches!(self, MediaKind::Image | MediaKind::Video)
    }
}

/// Metadata for one media item, merged lazily from path-derived and
/// index-derived values. Index values are authoritative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub filename: Option<String>,
    /// Folder relative to the configured media root, slash-separated.
    pub folder: Option<String>,
    pub captured_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub favorite: Option<bool>,
    pub camera: Option<String>,
    /// Monotonic row identifier from the backing index, when known.
    /// Used as the pagination tie-break for runs of equal sort values.
    pub index_id: Option<i64>,
}

impl MediaMetadata {
    /// Merge index-derived values over the current (path-derived) ones.
    /// Fields present on `index` win; fields absent there keep whatever
    /// was already known.
    pub fn merge_from_index(&mut self, index: MediaMetadata) {
        if index.filename.is_some() {
            self.filename = index.filename;
        }
        if index.folder.is_some() {
            self.folder = index.folder;
        }
        if index.captured_at.is_some() {
            self.captured_at = index.captured_at;
        }
        if index.modified_at.is_some() {
            self.modified_at = index.modified_at;
        }
        if index.created_at.is_some() {
            self.created_at = index.created_at;
        }
        if index.latitude.is_some() {
            self.latitude = index.latitude;
        }
        if index.longitude.is_some() {
            self.longitude = index.longitude;
        }
        if index.favorite.is_some() {
            self.favorite = index.favorite;
        }
        if index.camera.is_some() {
            self.camera = index.camera;
        }
        if index.index_id.is_some() {
            self.index_id = index.index_id;
        }
    }
}

/// The universal unit flowing through providers and the navigation queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Opaque URI or filesystem path. Unique within one provider's
    /// namespace only; the same file can carry both a URI form and a
    /// path form, so consumers normalize before comparing.
    pub id: String,
    pub kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MediaMetadata>,
}

impl MediaItem {
    pub fn new(id: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            id: id.into(),
            kind,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: MediaMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn filename(&self) -> Option<&str> {
        self.metadata.as_ref()?.filename.as_deref()
    }

    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        self.metadata.as_ref()?.captured_at
    }

    pub fn index_id(&self) -> Option<i64> {
        self.metadata.as_ref()?.index_id
    }

    /// Apply authoritative index metadata on top of whatever is present.
    pub fn enrich_from_index(&mut self, index: MediaMetadata) {
        match &mut self.metadata {
            Some(existing) => existing.merge_from_index(index),
            None => self.metadata = Some(index),
        }
    }
}

/// Normalize an item id for duplicate comparison: percent-decode it and
/// strip a known indexing-URI prefix so the URI form and the raw-path
/// form of the same file compare equal.
pub fn normalize_media_id(id: &str, index_prefix: Option<&str>) -> String {
    let decoded = urlencoding::decode(id)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| id.to_string());
    let stripped = match index_prefix {
        Some(prefix) if !prefix.is_empty() => decoded
            .strip_prefix(prefix)
            .map(|s| s.to_string())
            .unwrap_or(decoded),
        _ => decoded,
    };
    stripped.trim_start_matches('/').to_string()
}
