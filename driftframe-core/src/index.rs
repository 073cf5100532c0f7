//! Typed client for the companion media-indexing service.
//!
//! Every read-path method degrades gracefully: sentinel returns with
//! distinct meanings (`None` = unavailable/unknown, empty = confirmed
//! no match) instead of errors, so callers can fall back to
//! path-derived data. Write-path mutations are user-initiated and
//! surface their failures.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use driftframe_model::{
    MediaItem, MediaKind, MediaMetadata, OrderBy, OrderDirection, PageCursor,
};

use crate::error::{EngineError, Result};
use crate::extract;
use crate::host::{HostError, HostGateway, HostResult};
use crate::retry::retry_with_backoff;

/// Filter values after live entity references have been resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectiveFilters {
    pub favorites: Option<bool>,
    pub taken_after: Option<DateTime<Utc>>,
    pub taken_before: Option<DateTime<Utc>>,
}

impl EffectiveFilters {
    fn apply_to(&self, params: &mut Map<String, Value>) {
        if let Some(favorites) = self.favorites {
            params.insert("favorites".into(), Value::Bool(favorites));
        }
        if let Some(after) = self.taken_after {
            params.insert("taken_after".into(), Value::String(after.to_rfc3339()));
        }
        if let Some(before) = self.taken_before {
            params.insert("taken_before".into(), Value::String(before.to_rfc3339()));
        }
    }
}

/// Thin RPC wrapper around the host's indexing integration.
pub struct IndexGateway {
    host: Arc<dyn HostGateway>,
    entity_id: Option<String>,
    retry_attempts: u32,
    retry_base: Duration,
    exists_unsupported: AtomicBool,
}

impl std::fmt::Debug for IndexGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexGateway")
            .field("entity_id", &self.entity_id)
            .finish_non_exhaustive()
    }
}

impl IndexGateway {
    pub fn new(
        host: Arc<dyn HostGateway>,
        entity_id: Option<String>,
        retry_attempts: u32,
        retry_base: Duration,
    ) -> Self {
        Self {
            host,
            entity_id,
            retry_attempts,
            retry_base,
            exists_unsupported: AtomicBool::new(false),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.entity_id.is_some()
    }

    /// URI prefix the index puts in front of raw paths. Duplicate
    /// detection strips it so the URI form and path form of the same
    /// file compare equal.
    pub fn uri_prefix(&self) -> Option<String> {
        let entity = self.entity_id.as_deref()?;
        let integration = entity.split('.').nth(1).unwrap_or(entity);
        Some(format!("media-source://{integration}/"))
    }

    /// Fetch authoritative metadata for one file, flattening the nested
    /// `exif` record onto the top level. `None` when the index is not
    /// configured or the call fails; callers keep their path-derived
    /// metadata in that case.
    pub async fn fetch_file_metadata(&self, uri: &str) -> Option<MediaMetadata> {
        if !self.is_configured() {
            return None;
        }
        match self
            .call_with_retry("get_file_metadata", json!({ "media_id": uri }))
            .await
        {
            Ok(value) => Some(wire::metadata_from_wire(&flatten_exif(value))),
            Err(err) => {
                debug!(uri, "metadata fetch failed, using path-derived values: {err}");
                None
            }
        }
    }

    /// Tri-state existence check. `Some(false)` is confirmed missing;
    /// `None` means the index cannot answer — treat as unknown and
    /// proceed optimistically.
    pub async fn check_exists(&self, item: &MediaItem) -> Option<bool> {
        if !self.is_configured() || self.exists_unsupported.load(Ordering::Relaxed) {
            return None;
        }
        match self
            .call_with_retry("check_file_exists", json!({ "media_id": item.id }))
            .await
        {
            Ok(value) => value.get("exists").and_then(Value::as_bool),
            Err(HostError::Unsupported(_)) => {
                self.exists_unsupported.store(true, Ordering::Relaxed);
                None
            }
            Err(err) => {
                debug!(id = %item.id, "existence check failed: {err}");
                None
            }
        }
    }

    /// Batch random query. `None` signals a hard service failure,
    /// distinct from `Some(vec![])` ("query succeeded, no matches").
    pub async fn query_random(
        &self,
        count: usize,
        filters: &EffectiveFilters,
        prioritize_recent: bool,
    ) -> Option<Vec<MediaItem>> {
        let mut params = Map::new();
        params.insert("count".into(), json!(count));
        filters.apply_to(&mut params);
        if prioritize_recent {
            // Omitted entirely when off; the service treats the key's
            // presence as the signal.
            params.insert("prioritize_recent".into(), Value::Bool(true));
        }
        match self
            .call_with_retry("get_random_items", Value::Object(params))
            .await
        {
            Ok(value) => Some(parse_item_array(&value)),
            Err(err) => {
                warn!("random query failed: {err}");
                None
            }
        }
    }

    /// Forward-only ordered page. Returning fewer than `count` items
    /// signals exhaustion.
    pub async fn query_ordered(
        &self,
        count: usize,
        cursor: Option<&PageCursor>,
        order_by: OrderBy,
        direction: OrderDirection,
    ) -> Result<Vec<MediaItem>> {
        if !self.is_configured() {
            return Err(EngineError::IndexUnavailable(
                "no media index entity configured".into(),
            ));
        }
        let mut params = Map::new();
        params.insert("count".into(), json!(count));
        params.insert("order_by".into(), json!(order_by.as_str()));
        params.insert("direction".into(), json!(direction.as_str()));
        if let Some(cursor) = cursor {
            params.insert("cursor".into(), serde_json::to_value(cursor)?);
        }
        let value = self
            .call_with_retry("get_ordered_files", Value::Object(params))
            .await
            .map_err(|e| EngineError::IndexUnavailable(e.to_string()))?;
        Ok(parse_item_array(&value))
    }

    /// Items the index learned about after `cutoff`, newest first.
    /// Soft: an empty list on failure.
    pub async fn query_newer_than(&self, cutoff: DateTime<Utc>, count: usize) -> Vec<MediaItem> {
        if !self.is_configured() {
            return Vec::new();
        }
        match self
            .query_ordered(count, None, OrderBy::ModifiedTime, OrderDirection::Desc)
            .await
        {
            Ok(items) => items
                .into_iter()
                .take_while(|item| {
                    item.metadata
                        .as_ref()
                        .and_then(|m| m.modified_at.or(m.created_at).or(m.captured_at))
                        .is_some_and(|ts| ts > cutoff)
                })
                .collect(),
            Err(err) => {
                debug!("newer-than query failed: {err}");
                Vec::new()
            }
        }
    }

    /// Files related to `uri` (bursts, live-photo companions). Soft:
    /// empty on failure.
    pub async fn query_related(&self, uri: &str) -> Vec<MediaItem> {
        if !self.is_configured() {
            return Vec::new();
        }
        match self
            .call_with_retry("get_related_files", json!({ "media_id": uri }))
            .await
        {
            Ok(value) => parse_item_array(&value),
            Err(err) => {
                debug!(uri, "related-files query failed: {err}");
                Vec::new()
            }
        }
    }

    pub async fn mark_favorite(&self, uri: &str, value: bool) -> Result<()> {
        self.mutate("mark_favorite", json!({ "media_id": uri, "favorite": value }))
            .await
    }

    pub async fn mark_for_edit(&self, uri: &str) -> Result<()> {
        self.mutate("mark_for_edit", json!({ "media_id": uri })).await
    }

    pub async fn delete_media(&self, uri: &str) -> Result<()> {
        self.mutate("delete_media", json!({ "media_id": uri })).await
    }

    pub async fn update_burst_metadata(&self, uri: &str, make_cover: bool) -> Result<()> {
        self.mutate(
            "update_burst_metadata",
            json!({ "media_id": uri, "cover": make_cover }),
        )
        .await
    }

    /// Mutations are user-initiated: no retry loop, failures surface
    /// immediately, and callers must not mutate local state until the
    /// call succeeds.
    async fn mutate(&self, service: &str, params: Value) -> Result<()> {
        let entity = self.entity_id.as_deref().ok_or_else(|| {
            EngineError::IndexUnavailable("no media index entity configured".into())
        })?;
        self.host
            .call_index_service(service, params, Some(entity))
            .await
            .map(|_| ())
            .map_err(|e| EngineError::Mutation(e.to_string()))
    }

    /// Read-path call with backoff on transient failures only.
    async fn call_with_retry(&self, service: &str, params: Value) -> HostResult<Value> {
        let entity = self
            .entity_id
            .as_deref()
            .ok_or_else(|| HostError::Unsupported("no media index entity configured".into()))?;
        let outcome = retry_with_backoff(
            || async {
                match self
                    .host
                    .call_index_service(service, params.clone(), Some(entity))
                    .await
                {
                    Ok(value) => Ok(Ok(value)),
                    Err(err) if err.is_transient() => Err(err),
                    Err(err) => Ok(Err(err)),
                }
            },
            self.retry_attempts,
            self.retry_base,
        )
        .await;
        match outcome {
            Ok(inner) => inner,
            Err(err) => Err(err),
        }
    }
}

fn parse_item_array(value: &Value) -> Vec<MediaItem> {
    let Some(array) = value.as_array().or_else(|| {
        value.get("items").and_then(Value::as_array)
    }) else {
        return Vec::new();
    };
    array.iter().filter_map(wire::item_from_wire).collect()
}

/// Lift the keys of a nested `exif` object onto the top level. Existing
/// top-level keys win.
fn flatten_exif(mut value: Value) -> Value {
    let Some(obj) = value.as_object_mut() else {
        return value;
    };
    if let Some(Value::Object(exif)) = obj.remove("exif") {
        for (key, val) in exif {
            obj.entry(key).or_insert(val);
        }
    }
    value
}

/// Wire-shape conversions shared with the in-memory host fixture.
pub mod wire {
    use super::*;

    /// Parse one item record as returned by the indexing service.
    pub fn item_from_wire(value: &Value) -> Option<MediaItem> {
        let id = value
            .get("media_content_id")
            .or_else(|| value.get("path"))
            .and_then(Value::as_str)?;
        let kind = match value.get("media_class").and_then(Value::as_str) {
            Some("image") => MediaKind::Image,
            Some("video") => MediaKind::Video,
            _ => extract::detect_kind(id),
        };
        Some(MediaItem::new(id, kind).with_metadata(metadata_from_wire(value)))
    }

    pub fn metadata_from_wire(value: &Value) -> MediaMetadata {
        MediaMetadata {
            filename: value
                .get("filename")
                .and_then(Value::as_str)
                .map(str::to_string),
            folder: value
                .get("folder")
                .and_then(Value::as_str)
                .map(str::to_string),
            captured_at: value.get("date_taken").and_then(parse_datetime),
            modified_at: value.get("modified_time").and_then(parse_datetime),
            created_at: value.get("created_time").and_then(parse_datetime),
            latitude: value.get("latitude").and_then(Value::as_f64),
            longitude: value.get("longitude").and_then(Value::as_f64),
            favorite: value.get("favorite").and_then(Value::as_bool),
            camera: value
                .get("camera")
                .and_then(Value::as_str)
                .map(str::to_string),
            index_id: value.get("id").and_then(Value::as_i64),
        }
    }

    /// Serialize an item into the service's record shape (used by the
    /// in-memory host).
    pub fn item_to_wire(item: &MediaItem) -> Value {
        let mut obj = Map::new();
        obj.insert("media_content_id".into(), json!(item.id));
        obj.insert(
            "media_class".into(),
            json!(match item.kind {
                MediaKind::Image => "image",
                MediaKind::Video => "video",
                MediaKind::Unknown => "unknown",
            }),
        );
        if let Some(meta) = &item.metadata {
            if let Some(filename) = &meta.filename {
                obj.insert("filename".into(), json!(filename));
            }
            if let Some(folder) = &meta.folder {
                obj.insert("folder".into(), json!(folder));
            }
            if let Some(ts) = meta.captured_at {
                obj.insert("date_taken".into(), json!(ts.to_rfc3339()));
            }
            if let Some(ts) = meta.modified_at {
                obj.insert("modified_time".into(), json!(ts.to_rfc3339()));
            }
            if let Some(ts) = meta.created_at {
                obj.insert("created_time".into(), json!(ts.to_rfc3339()));
            }
            if let Some(favorite) = meta.favorite {
                obj.insert("favorite".into(), json!(favorite));
            }
            if let Some(id) = meta.index_id {
                obj.insert("id".into(), json!(id));
            }
        }
        Value::Object(obj)
    }

    fn parse_datetime(value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Value::Number(n) => n
                .as_i64()
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exif_keys_flatten_without_clobbering() {
        let flattened = flatten_exif(json!({
            "media_content_id": "/a.jpg",
            "camera": "top-level wins",
            "exif": {"camera": "EXIF Cam", "latitude": 52.1}
        }));
        assert_eq!(flattened["camera"], "top-level wins");
        assert_eq!(flattened["latitude"], 52.1);
        assert!(flattened.get("exif").is_none());
    }

    #[test]
    fn wire_round_trip_preserves_cursor_fields() {
        let item = wire::item_from_wire(&json!({
            "media_content_id": "/media/a.jpg",
            "media_class": "image",
            "date_taken": "2024-06-01T10:00:00Z",
            "id": 42
        }))
        .unwrap();
        assert_eq!(item.index_id(), Some(42));
        let back = wire::item_to_wire(&item);
        assert_eq!(back["id"], 42);
        assert_eq!(back["media_class"], "image");
    }

    #[test]
    fn uri_prefix_derives_from_the_entity_id() {
        let host: Arc<dyn HostGateway> = Arc::new(crate::host::memory::MemoryHost::new());
        let gateway = IndexGateway::new(
            host,
            Some("sensor.immich".into()),
            1,
            Duration::from_millis(1),
        );
        assert_eq!(gateway.uri_prefix().as_deref(), Some("media-source://immich/"));
    }
}
