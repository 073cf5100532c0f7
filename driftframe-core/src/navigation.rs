//! Card-level navigation: the sliding-window queue, the session trail,
//! and the wrap/refresh logic that unifies all providers.
//!
//! `advance`/`retreat` take `&mut self`, so overlapping calls cannot
//! happen by construction; callers that share a controller across tasks
//! serialize through whatever lock they wrap it in.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use driftframe_model::{MediaItem, normalize_media_id};

use crate::error::{EngineError, Result};
use crate::host::{HostGateway, ResolvedMedia};
use crate::providers::{MediaProvider, SharedSeen};

/// The only valid index for an empty queue.
const EMPTY: isize = -1;

#[derive(Debug, Clone)]
pub struct NavigationConfig {
    /// Sliding-window maximum for the queue.
    pub max_window: usize,
    pub history_cap: usize,
    /// Items displayed between freshness checks.
    pub refresh_cadence: usize,
    /// Retry ceiling when the provider keeps repeating queue items.
    pub max_repeat_retries: u32,
    /// Indexing-URI prefix stripped before duplicate comparison.
    pub uri_prefix: Option<String>,
}

/// Owns the authoritative navigation queue and session history.
/// Providers never mutate either; they only return new items.
pub struct NavigationController {
    provider: Box<dyn MediaProvider>,
    host: Arc<dyn HostGateway>,
    cfg: NavigationConfig,
    queue: Vec<MediaItem>,
    index: isize,
    history: Vec<MediaItem>,
    seen: SharedSeen,
    displayed_since_refresh: usize,
    newer_cutoff: DateTime<Utc>,
}

impl std::fmt::Debug for NavigationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationController")
            .field("queue", &self.queue.len())
            .field("index", &self.index)
            .field("history", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl NavigationController {
    pub fn new(
        provider: Box<dyn MediaProvider>,
        host: Arc<dyn HostGateway>,
        cfg: NavigationConfig,
        seen: SharedSeen,
    ) -> Self {
        Self {
            provider,
            host,
            cfg,
            queue: Vec::new(),
            index: EMPTY,
            history: Vec::new(),
            seen,
            displayed_since_refresh: 0,
            newer_cutoff: Utc::now(),
        }
    }

    pub fn current(&self) -> Option<&MediaItem> {
        if self.index < 0 {
            return None;
        }
        self.queue.get(self.index as usize)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Read-only view of the live window (oldest first).
    pub fn queue(&self) -> &[MediaItem] {
        &self.queue
    }

    pub fn navigation_index(&self) -> isize {
        self.index
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Move to the next item: a pure pointer move when forward history
    /// exists, otherwise a provider pull with duplicate retries, and a
    /// wrap-with-refresh once the provider is exhausted.
    pub async fn advance(&mut self) -> Result<Option<&MediaItem>> {
        if self.index + 1 < self.queue.len() as isize {
            self.index += 1;
            self.record_display().await;
            self.maybe_reconcile().await;
            return Ok(self.current());
        }

        let mut fresh = None;
        for attempt in 0..=self.cfg.max_repeat_retries {
            match self.provider.get_next().await? {
                None => break,
                Some(item) => {
                    if self.position_of(&item.id).is_some() {
                        debug!(id = %item.id, attempt, "provider repeated a queued item, retrying");
                        continue;
                    }
                    fresh = Some(item);
                    break;
                }
            }
        }

        match fresh {
            Some(item) => {
                self.append_and_point(item);
                self.record_display().await;
                self.maybe_reconcile().await;
                Ok(self.current())
            }
            None => {
                let wrapped = self.wrap_with_refresh().await?;
                Ok(wrapped)
            }
        }
    }

    /// Pure pointer decrement with wraparound to the queue tail; never
    /// touches the provider — backward navigation is always satisfied
    /// from what was already materialized.
    pub fn retreat(&mut self) -> Option<&MediaItem> {
        if self.queue.is_empty() {
            return None;
        }
        if self.index <= 0 {
            self.index = self.queue.len() as isize - 1;
        } else {
            self.index -= 1;
        }
        self.current()
    }

    /// Exclude a 404'd file everywhere and drop it from the live queue.
    /// The caller advances afterwards; an ambient display skips missing
    /// files silently rather than interrupting with a dialog.
    pub async fn mark_unavailable(&mut self, id: &str) -> Result<()> {
        self.provider.exclude_file(id).await;
        if let Some(pos) = self.queue.iter().position(|item| item.id == id) {
            self.queue.remove(pos);
            if (pos as isize) < self.index {
                self.index -= 1;
            }
            if self.queue.is_empty() {
                self.index = EMPTY;
            } else if self.index >= self.queue.len() as isize {
                self.index = self.queue.len() as isize - 1;
            }
        }
        Ok(())
    }

    /// Resolve the playback URL for an item via the host.
    pub async fn playback_url(&self, item: &MediaItem, ttl: Duration) -> Result<ResolvedMedia> {
        self.host
            .resolve_playback_url(&item.id, ttl)
            .await
            .map_err(|e| EngineError::Rpc(e.to_string()))
    }

    pub async fn check_current_exists(&self) -> Option<bool> {
        let item = self.current()?;
        self.provider.check_file_exists(item).await
    }

    /// Provider exhausted: reset it (clearing cursors and caches), pull
    /// one fresh item, and jump to it — this is how a long-running
    /// display discovers newly-arrived files without a restart.
    async fn wrap_with_refresh(&mut self) -> Result<Option<&MediaItem>> {
        if self.queue.is_empty() {
            // Wrapping an empty queue means nothing was ever
            // materialized; abort the step instead of looping.
            return Err(EngineError::NoMediaAvailable);
        }
        info!("provider exhausted, wrapping with a fresh query");
        self.provider.reset().await?;
        match self.provider.get_next().await? {
            None => Err(EngineError::NoMediaAvailable),
            Some(item) => {
                match self.position_of(&item.id) {
                    Some(pos) => self.index = pos as isize,
                    None => self.append_and_point(item),
                }
                self.record_display().await;
                Ok(self.current())
            }
        }
    }

    fn append_and_point(&mut self, item: MediaItem) {
        self.queue.push(item);
        self.index = self.queue.len() as isize - 1;
        self.evict_overflow();
    }

    /// Keep the sliding window bounded, shifting the pointer to
    /// compensate for head evictions.
    fn evict_overflow(&mut self) {
        while self.queue.len() > self.cfg.max_window {
            if self.index > 0 {
                self.queue.remove(0);
                self.index -= 1;
            } else {
                // Pointer sits at the head; trim the tail instead so the
                // current item survives.
                self.queue.pop();
            }
        }
    }

    fn position_of(&self, id: &str) -> Option<usize> {
        let needle = self.normalize(id);
        self.queue
            .iter()
            .position(|item| self.normalize(&item.id) == needle)
    }

    fn normalize(&self, id: &str) -> String {
        normalize_media_id(id, self.cfg.uri_prefix.as_deref())
    }

    async fn record_display(&mut self) {
        let Some(item) = self.current().cloned() else {
            return;
        };
        let normalized = self.normalize(&item.id);
        self.history.push(item);
        if self.history.len() > self.cfg.history_cap {
            let overflow = self.history.len() - self.cfg.history_cap;
            self.history.drain(..overflow);
        }
        self.seen.write().await.insert(normalized);
        self.displayed_since_refresh += 1;
    }

    /// Every `refresh_cadence` displays, poll the provider for files
    /// newer than the last check and slot them in right after the
    /// pointer so they appear next.
    async fn maybe_reconcile(&mut self) {
        if self.displayed_since_refresh < self.cfg.refresh_cadence {
            return;
        }
        self.displayed_since_refresh = 0;
        let cutoff = self.newer_cutoff;
        self.newer_cutoff = Utc::now();

        let fresh = self.provider.files_newer_than(cutoff).await;
        if fresh.is_empty() {
            return;
        }
        let seen = self.seen.read().await;
        let mut offset = 0usize;
        for item in fresh {
            if self.position_of(&item.id).is_some() {
                continue;
            }
            if seen.contains(&normalize_media_id(&item.id, self.cfg.uri_prefix.as_deref())) {
                continue;
            }
            let at = ((self.index + 1) as usize + offset).min(self.queue.len());
            debug!(id = %item.id, "queueing newly discovered file ahead of the pointer");
            self.queue.insert(at, item);
            offset += 1;
        }
        drop(seen);
        self.evict_overflow();
        if self.queue.is_empty() {
            self.index = EMPTY;
        } else if self.index >= self.queue.len() as isize {
            self.index = self.queue.len() as isize - 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use driftframe_model::MediaKind;
    use std::collections::HashSet;
    use std::collections::VecDeque;
    use tokio::sync::RwLock;

    /// Scripted provider: pops from a queue of responses, optionally
    /// repeating one id forever to exercise the retry ceiling.
    struct ScriptedProvider {
        responses: VecDeque<Option<MediaItem>>,
        after_reset: VecDeque<Option<MediaItem>>,
        newer: Vec<MediaItem>,
    }

    impl ScriptedProvider {
        fn new(ids: &[&str]) -> Self {
            Self {
                responses: ids
                    .iter()
                    .map(|id| Some(MediaItem::new(*id, MediaKind::Image)))
                    .collect(),
                after_reset: VecDeque::new(),
                newer: Vec::new(),
            }
        }

        fn with_after_reset(mut self, ids: &[&str]) -> Self {
            self.after_reset = ids
                .iter()
                .map(|id| Some(MediaItem::new(*id, MediaKind::Image)))
                .collect();
            self
        }

        fn with_newer(mut self, ids: &[&str]) -> Self {
            self.newer = ids
                .iter()
                .map(|id| MediaItem::new(*id, MediaKind::Image))
                .collect();
            self
        }
    }

    #[async_trait]
    impl MediaProvider for ScriptedProvider {
        async fn initialize(&mut self) -> Result<()> {
            Ok(())
        }

        async fn get_next(&mut self) -> Result<Option<MediaItem>> {
            Ok(self.responses.pop_front().flatten())
        }

        async fn check_file_exists(&self, _item: &MediaItem) -> Option<bool> {
            None
        }

        async fn exclude_file(&mut self, _id: &str) {}

        async fn reset(&mut self) -> Result<()> {
            self.responses = std::mem::take(&mut self.after_reset);
            Ok(())
        }

        async fn rescan(&mut self) -> Result<()> {
            Ok(())
        }

        async fn files_newer_than(&self, _cutoff: DateTime<Utc>) -> Vec<MediaItem> {
            self.newer.clone()
        }
    }

    fn controller(provider: ScriptedProvider, max_window: usize) -> NavigationController {
        controller_with_cadence(provider, max_window, 100)
    }

    fn controller_with_cadence(
        provider: ScriptedProvider,
        max_window: usize,
        refresh_cadence: usize,
    ) -> NavigationController {
        let seen: SharedSeen = Arc::new(RwLock::new(HashSet::new()));
        NavigationController::new(
            Box::new(provider),
            Arc::new(crate::host::memory::MemoryHost::new()),
            NavigationConfig {
                max_window,
                history_cap: 10,
                refresh_cadence,
                max_repeat_retries: 10,
                uri_prefix: None,
            },
            seen,
        )
    }

    #[tokio::test]
    async fn window_eviction_compensates_the_pointer() {
        let mut nav = controller(ScriptedProvider::new(&["a", "b", "c", "d", "e"]), 3);
        for _ in 0..5 {
            nav.advance().await.unwrap();
            assert!(nav.queue_len() <= 3);
            let idx = nav.navigation_index();
            assert!(idx >= 0 && (idx as usize) < nav.queue_len());
        }
        // Window holds the last three, pointer at the tail.
        assert_eq!(nav.current().unwrap().id, "e");
        assert_eq!(nav.queue_len(), 3);
    }

    #[tokio::test]
    async fn retreat_is_pointer_only_with_tail_wraparound() {
        let mut nav = controller(ScriptedProvider::new(&["a", "b", "c"]), 10);
        for _ in 0..3 {
            nav.advance().await.unwrap();
        }
        assert_eq!(nav.retreat().unwrap().id, "b");
        assert_eq!(nav.retreat().unwrap().id, "a");
        // Wrap to the tail from the head.
        assert_eq!(nav.retreat().unwrap().id, "c");
    }

    #[tokio::test]
    async fn exhaustion_wraps_with_a_fresh_provider_query() {
        let provider = ScriptedProvider::new(&["a", "b"]).with_after_reset(&["fresh"]);
        let mut nav = controller(provider, 10);
        nav.advance().await.unwrap();
        nav.advance().await.unwrap();
        // Provider is now empty: wrap resets it and jumps to the fresh item.
        let current = nav.advance().await.unwrap().unwrap();
        assert_eq!(current.id, "fresh");
        assert_eq!(nav.queue_len(), 3);
    }

    #[tokio::test]
    async fn wrap_on_an_empty_queue_reports_no_media() {
        let mut nav = controller(ScriptedProvider::new(&[]), 10);
        let err = nav.advance().await.unwrap_err();
        assert!(matches!(err, EngineError::NoMediaAvailable));
    }

    #[tokio::test]
    async fn repeated_items_are_retried_not_duplicated() {
        let provider = ScriptedProvider::new(&["a", "a", "a", "b"]);
        let mut nav = controller(provider, 10);
        nav.advance().await.unwrap();
        let current = nav.advance().await.unwrap().unwrap();
        assert_eq!(current.id, "b");
        assert_eq!(nav.queue_len(), 2);
    }

    #[tokio::test]
    async fn reconciliation_slots_new_files_right_after_the_pointer() {
        let provider = ScriptedProvider::new(&["a", "b", "c"]).with_newer(&["fresh"]);
        let mut nav = controller_with_cadence(provider, 10, 2);
        nav.advance().await.unwrap();
        // Second display crosses the cadence boundary; the newly
        // discovered file is queued directly after the pointer.
        nav.advance().await.unwrap();
        assert_eq!(
            nav.queue().iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
            ["a", "b", "fresh"]
        );
        // It shows next, ahead of anything the provider would return.
        assert_eq!(nav.advance().await.unwrap().unwrap().id, "fresh");
    }

    #[tokio::test]
    async fn mark_unavailable_drops_the_item_and_fixes_the_pointer() {
        let mut nav = controller(ScriptedProvider::new(&["a", "b", "c"]), 10);
        for _ in 0..3 {
            nav.advance().await.unwrap();
        }
        nav.mark_unavailable("c").await.unwrap();
        assert_eq!(nav.queue_len(), 2);
        assert_eq!(nav.current().unwrap().id, "b");
        nav.mark_unavailable("a").await.unwrap();
        assert_eq!(nav.current().unwrap().id, "b");
        assert_eq!(nav.navigation_index(), 0);
    }
}
