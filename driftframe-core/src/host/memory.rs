//! In-memory host for tests: scriptable folder trees, an index dataset
//! with compound-cursor pagination, failure injection, and simulated
//! entity state.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::broadcast;

use driftframe_model::{CursorValue, MediaItem, OrderBy, OrderDirection, PageCursor};

use super::{BrowseNode, BrowseResult, HostError, HostGateway, HostResult, ResolvedMedia, StateChange};
use crate::index::wire;

/// Scriptable [`HostGateway`] implementation backed by plain maps.
pub struct MemoryHost {
    folders: Mutex<HashMap<String, Vec<BrowseNode>>>,
    fail_browse: Mutex<HashSet<String>>,
    hang_browse: Mutex<HashSet<String>>,
    states: Mutex<HashMap<String, String>>,
    dataset: Mutex<Vec<MediaItem>>,
    deleted: Mutex<HashSet<String>>,
    exif: Mutex<HashMap<String, Value>>,
    scripted_ordered: Mutex<VecDeque<Vec<MediaItem>>>,
    scripted_random: Mutex<VecDeque<Vec<MediaItem>>>,
    service_calls: Mutex<Vec<(String, Value)>>,
    index_fail: AtomicBool,
    exists_supported: AtomicBool,
    browse_calls: AtomicUsize,
    state_tx: broadcast::Sender<StateChange>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryHost").finish_non_exhaustive()
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(64);
        Self {
            folders: Mutex::new(HashMap::new()),
            fail_browse: Mutex::new(HashSet::new()),
            hang_browse: Mutex::new(HashSet::new()),
            states: Mutex::new(HashMap::new()),
            dataset: Mutex::new(Vec::new()),
            deleted: Mutex::new(HashSet::new()),
            exif: Mutex::new(HashMap::new()),
            scripted_ordered: Mutex::new(VecDeque::new()),
            scripted_random: Mutex::new(VecDeque::new()),
            service_calls: Mutex::new(Vec::new()),
            index_fail: AtomicBool::new(false),
            exists_supported: AtomicBool::new(true),
            browse_calls: AtomicUsize::new(0),
            state_tx,
        }
    }

    /// Register a folder with explicit children.
    pub fn add_folder(&self, uri: impl Into<String>, children: Vec<BrowseNode>) {
        self.folders
            .lock()
            .expect("folders lock poisoned")
            .insert(uri.into(), children);
    }

    /// Register a folder holding `files` leaf nodes named after the
    /// final path segment.
    pub fn add_media_folder(&self, uri: impl Into<String>, files: &[&str]) {
        let children = files
            .iter()
            .map(|id| {
                let title = id.rsplit('/').next().unwrap_or(id).to_string();
                BrowseNode::file(*id, title)
            })
            .collect();
        self.add_folder(uri, children);
    }

    pub fn fail_browse_for(&self, uri: impl Into<String>) {
        self.fail_browse
            .lock()
            .expect("fail set lock poisoned")
            .insert(uri.into());
    }

    pub fn hang_browse_for(&self, uri: impl Into<String>) {
        self.hang_browse
            .lock()
            .expect("hang set lock poisoned")
            .insert(uri.into());
    }

    pub fn browse_call_count(&self) -> usize {
        self.browse_calls.load(Ordering::Relaxed)
    }

    /// Seed the index dataset.
    pub fn seed_index(&self, items: Vec<MediaItem>) {
        *self.dataset.lock().expect("dataset lock poisoned") = items;
    }

    pub fn set_index_fail(&self, fail: bool) {
        self.index_fail.store(fail, Ordering::Relaxed);
    }

    pub fn set_exists_supported(&self, supported: bool) {
        self.exists_supported.store(supported, Ordering::Relaxed);
    }

    pub fn set_exif(&self, uri: impl Into<String>, exif: Value) {
        self.exif
            .lock()
            .expect("exif lock poisoned")
            .insert(uri.into(), exif);
    }

    /// Queue a scripted response for the next `get_ordered_files` call;
    /// once scripted batches run out, the dataset answers again.
    pub fn push_ordered_batch(&self, items: Vec<MediaItem>) {
        self.scripted_ordered
            .lock()
            .expect("scripted lock poisoned")
            .push_back(items);
    }

    pub fn push_random_batch(&self, items: Vec<MediaItem>) {
        self.scripted_random
            .lock()
            .expect("scripted lock poisoned")
            .push_back(items);
    }

    /// All recorded parameter payloads for one service.
    pub fn calls_for(&self, service: &str) -> Vec<Value> {
        self.service_calls
            .lock()
            .expect("calls lock poisoned")
            .iter()
            .filter(|(name, _)| name == service)
            .map(|(_, params)| params.clone())
            .collect()
    }

    /// Update an entity state and notify subscribers.
    pub fn set_state(&self, entity_id: impl Into<String>, state: impl Into<String>) {
        let entity_id = entity_id.into();
        let state = state.into();
        self.states
            .lock()
            .expect("states lock poisoned")
            .insert(entity_id.clone(), state.clone());
        let _ = self.state_tx.send(StateChange { entity_id, state });
    }

    fn visible_dataset(&self) -> Vec<MediaItem> {
        let deleted = self.deleted.lock().expect("deleted lock poisoned");
        self.dataset
            .lock()
            .expect("dataset lock poisoned")
            .iter()
            .filter(|item| !deleted.contains(&item.id))
            .cloned()
            .collect()
    }

    fn ordered_page(&self, params: &Value) -> Value {
        if let Some(batch) = self
            .scripted_ordered
            .lock()
            .expect("scripted lock poisoned")
            .pop_front()
        {
            return Value::Array(batch.iter().map(wire::item_to_wire).collect());
        }

        let count = params.get("count").and_then(Value::as_u64).unwrap_or(10) as usize;
        let order_by = match params.get("order_by").and_then(Value::as_str) {
            Some("filename") => OrderBy::Filename,
            Some("path") => OrderBy::Path,
            Some("modified_time") => OrderBy::ModifiedTime,
            _ => OrderBy::DateTaken,
        };
        let direction = match params.get("direction").and_then(Value::as_str) {
            Some("asc") => OrderDirection::Asc,
            _ => OrderDirection::Desc,
        };
        let cursor: Option<PageCursor> = params
            .get("cursor")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok());

        let mut entries = self.visible_dataset();
        entries.sort_by(|a, b| {
            traversal_key(a, order_by)
                .compare(&traversal_key(b, order_by), direction)
                .then(a.index_id().unwrap_or(0).cmp(&b.index_id().unwrap_or(0)))
        });

        let page: Vec<Value> = entries
            .iter()
            .filter(|item| match &cursor {
                Some(cursor) => {
                    let key = traversal_key(item, order_by);
                    let cursor_key = TraversalKey::from_cursor(&cursor.sort_value);
                    match key.compare(&cursor_key, direction) {
                        std::cmp::Ordering::Greater => true,
                        std::cmp::Ordering::Equal => {
                            item.index_id().unwrap_or(0) > cursor.tie_break_id
                        }
                        std::cmp::Ordering::Less => false,
                    }
                }
                None => true,
            })
            .take(count)
            .map(wire::item_to_wire)
            .collect();
        Value::Array(page)
    }

    fn random_page(&self, params: &Value) -> Value {
        if let Some(batch) = self
            .scripted_random
            .lock()
            .expect("scripted lock poisoned")
            .pop_front()
        {
            return Value::Array(batch.iter().map(wire::item_to_wire).collect());
        }

        let count = params.get("count").and_then(Value::as_u64).unwrap_or(10) as usize;
        let favorites = params.get("favorites").and_then(Value::as_bool);
        let taken_after = params
            .get("taken_after")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let taken_before = params
            .get("taken_before")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let prioritize_recent = params
            .get("prioritize_recent")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let mut entries: Vec<MediaItem> = self
            .visible_dataset()
            .into_iter()
            .filter(|item| {
                let meta = item.metadata.as_ref();
                if let Some(wanted) = favorites {
                    if meta.and_then(|m| m.favorite).unwrap_or(false) != wanted {
                        return false;
                    }
                }
                let taken = meta.and_then(|m| m.captured_at);
                if let (Some(after), Some(taken)) = (taken_after, taken) {
                    if taken <= after {
                        return false;
                    }
                }
                if taken_after.is_some() && taken.is_none() {
                    return false;
                }
                if let (Some(before), Some(taken)) = (taken_before, taken) {
                    if taken >= before {
                        return false;
                    }
                }
                true
            })
            .collect();

        if prioritize_recent {
            entries.sort_by_key(|item| {
                std::cmp::Reverse(
                    item.metadata
                        .as_ref()
                        .and_then(|m| m.created_at.or(m.modified_at).or(m.captured_at))
                        .map(|ts| ts.timestamp())
                        .unwrap_or(0),
                )
            });
        } else {
            use rand::seq::SliceRandom;
            entries.shuffle(&mut rand::rng());
        }
        Value::Array(entries.iter().take(count).map(wire::item_to_wire).collect())
    }

    fn file_metadata(&self, params: &Value) -> HostResult<Value> {
        let uri = params
            .get("media_id")
            .and_then(Value::as_str)
            .ok_or_else(|| HostError::Rejected("media_id missing".into()))?;
        let dataset = self.dataset.lock().expect("dataset lock poisoned");
        let Some(item) = dataset.iter().find(|item| item.id == uri) else {
            return Err(HostError::Rejected(format!("unknown media id {uri}")));
        };
        let mut record = wire::item_to_wire(item);
        if let Some(exif) = self.exif.lock().expect("exif lock poisoned").get(uri) {
            record["exif"] = exif.clone();
        }
        Ok(record)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TraversalKey {
    Date(i64),
    Text(String),
}

impl TraversalKey {
    fn from_cursor(value: &CursorValue) -> Self {
        match value {
            CursorValue::Date(dt) => TraversalKey::Date(dt.timestamp()),
            CursorValue::Text(text) => TraversalKey::Text(text.clone()),
        }
    }

    /// Compare in traversal order. The backend quirk the engine works
    /// around lives here: missing dates read as the epoch rather than
    /// sorting last.
    fn compare(&self, other: &Self, direction: OrderDirection) -> std::cmp::Ordering {
        let natural = match (self, other) {
            (TraversalKey::Date(a), TraversalKey::Date(b)) => a.cmp(b),
            (TraversalKey::Text(a), TraversalKey::Text(b)) => a.cmp(b),
            (TraversalKey::Date(_), TraversalKey::Text(_)) => std::cmp::Ordering::Less,
            (TraversalKey::Text(_), TraversalKey::Date(_)) => std::cmp::Ordering::Greater,
        };
        if direction.is_desc() { natural.reverse() } else { natural }
    }
}

fn traversal_key(item: &MediaItem, order_by: OrderBy) -> TraversalKey {
    let meta = item.metadata.as_ref();
    match order_by {
        OrderBy::DateTaken => TraversalKey::Date(
            meta.and_then(|m| m.captured_at)
                .map(|ts| ts.timestamp())
                .unwrap_or(0),
        ),
        OrderBy::ModifiedTime => TraversalKey::Date(
            meta.and_then(|m| m.modified_at)
                .map(|ts| ts.timestamp())
                .unwrap_or(0),
        ),
        OrderBy::Filename => TraversalKey::Text(
            meta.and_then(|m| m.filename.clone())
                .unwrap_or_else(|| item.id.clone()),
        ),
        OrderBy::Path => TraversalKey::Text(item.id.clone()),
    }
}

#[async_trait]
impl HostGateway for MemoryHost {
    async fn browse(&self, folder_uri: &str) -> HostResult<BrowseResult> {
        self.browse_calls.fetch_add(1, Ordering::Relaxed);
        if self
            .hang_browse
            .lock()
            .expect("hang set lock poisoned")
            .contains(folder_uri)
        {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self
            .fail_browse
            .lock()
            .expect("fail set lock poisoned")
            .contains(folder_uri)
        {
            return Err(HostError::Transport(format!("injected failure for {folder_uri}")));
        }
        let folders = self.folders.lock().expect("folders lock poisoned");
        match folders.get(folder_uri) {
            Some(children) => Ok(BrowseResult {
                children: children.clone(),
            }),
            None => Err(HostError::Rejected(format!("unknown folder {folder_uri}"))),
        }
    }

    async fn resolve_playback_url(
        &self,
        media_id: &str,
        ttl: Duration,
    ) -> HostResult<ResolvedMedia> {
        Ok(ResolvedMedia {
            url: format!("http://host.local/resolved{}?ttl={}", media_id, ttl.as_secs()),
            mime_type: None,
        })
    }

    async fn call_index_service(
        &self,
        service: &str,
        params: Value,
        _target_entity: Option<&str>,
    ) -> HostResult<Value> {
        self.service_calls
            .lock()
            .expect("calls lock poisoned")
            .push((service.to_string(), params.clone()));

        if self.index_fail.load(Ordering::Relaxed) {
            return Err(HostError::Transport("index integration is down".into()));
        }

        match service {
            "get_ordered_files" => Ok(self.ordered_page(&params)),
            "get_random_items" => Ok(self.random_page(&params)),
            "get_file_metadata" => self.file_metadata(&params),
            "get_related_files" => Ok(json!([])),
            "check_file_exists" => {
                if !self.exists_supported.load(Ordering::Relaxed) {
                    return Err(HostError::Unsupported("check_file_exists".into()));
                }
                let uri = params.get("media_id").and_then(Value::as_str).unwrap_or("");
                let deleted = self.deleted.lock().expect("deleted lock poisoned");
                let in_dataset = self
                    .dataset
                    .lock()
                    .expect("dataset lock poisoned")
                    .iter()
                    .any(|item| item.id == uri);
                let in_folders = self
                    .folders
                    .lock()
                    .expect("folders lock poisoned")
                    .values()
                    .flatten()
                    .any(|node| node.id == uri);
                Ok(json!({ "exists": (in_dataset || in_folders) && !deleted.contains(uri) }))
            }
            "mark_favorite" => {
                let uri = params.get("media_id").and_then(Value::as_str).unwrap_or("");
                let favorite = params.get("favorite").and_then(Value::as_bool).unwrap_or(true);
                let mut dataset = self.dataset.lock().expect("dataset lock poisoned");
                match dataset.iter_mut().find(|item| item.id == uri) {
                    Some(item) => {
                        item.enrich_from_index(driftframe_model::MediaMetadata {
                            favorite: Some(favorite),
                            ..Default::default()
                        });
                        Ok(json!({}))
                    }
                    None => Err(HostError::Rejected(format!("unknown media id {uri}"))),
                }
            }
            "delete_media" => {
                let uri = params.get("media_id").and_then(Value::as_str).unwrap_or("");
                self.deleted
                    .lock()
                    .expect("deleted lock poisoned")
                    .insert(uri.to_string());
                Ok(json!({}))
            }
            "mark_for_edit" | "update_burst_metadata" => Ok(json!({})),
            other => Err(HostError::Unsupported(other.to_string())),
        }
    }

    async fn get_state(&self, entity_id: &str) -> HostResult<Option<String>> {
        Ok(self
            .states
            .lock()
            .expect("states lock poisoned")
            .get(entity_id)
            .cloned())
    }

    fn subscribe_state_changes(&self, _entity_ids: &[String]) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }
}
