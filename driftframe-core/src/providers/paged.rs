//! Deterministic forward-only traversal of a remote collection using
//! compound-cursor pagination.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use async_trait::async_trait;
use tracing::{debug, warn};

use driftframe_model::{
    MediaItem, OrderBy, OrderDirection, PageCursor, compare_by_date_fallback,
};

use crate::error::Result;
use crate::index::IndexGateway;
use crate::providers::{ExclusionSet, MediaProvider};

#[derive(Debug, Clone)]
pub struct PagedProviderConfig {
    pub order_by: OrderBy,
    pub direction: OrderDirection,
    /// Target batch size per fetch pass (the slideshow window).
    pub queue_size: usize,
    /// Buffer level that triggers a refill.
    pub low_water: usize,
}

/// Cursor-paginated puller against the media index.
#[derive(Debug)]
pub struct PagedIndexProvider {
    gateway: Arc<IndexGateway>,
    cfg: PagedProviderConfig,
    buffer: VecDeque<MediaItem>,
    cursor: Option<PageCursor>,
    exhausted: bool,
    excluded: ExclusionSet,
    /// Wrap to the start when the collection is exhausted. Disabled
    /// only during the small-collection preload pass.
    auto_loop: bool,
}

impl PagedIndexProvider {
    pub fn new(gateway: Arc<IndexGateway>, cfg: PagedProviderConfig) -> Self {
        let excluded = ExclusionSet::new(gateway.uri_prefix());
        Self {
            gateway,
            cfg,
            buffer: VecDeque::new(),
            cursor: None,
            exhausted: false,
            excluded,
            auto_loop: true,
        }
    }

    pub fn set_auto_loop(&mut self, auto_loop: bool) {
        self.auto_loop = auto_loop;
    }

    /// Whether the whole collection fit into the buffer on the first
    /// pass (small-collection preload).
    pub fn fully_loaded(&self) -> bool {
        self.exhausted && !self.buffer.is_empty()
    }

    /// Multi-iteration fetch: accumulate filtered items batch by batch
    /// until the target count is reached or the backend signals
    /// exhaustion by returning a short page.
    async fn fetch_batch(&mut self) -> Result<()> {
        let target = self.cfg.queue_size;
        let max_iterations = self.cfg.queue_size.div_ceil(10).clamp(5, 20);

        let mut fetched: Vec<MediaItem> = Vec::new();
        let mut seen: HashSet<String> = self.buffer.iter().map(|i| i.id.clone()).collect();

        for _ in 0..max_iterations {
            let batch = self
                .gateway
                .query_ordered(
                    target,
                    self.cursor.as_ref(),
                    self.cfg.order_by,
                    self.cfg.direction,
                )
                .await?;
            let raw_len = batch.len();

            // Provisional cursor from the raw tail keeps the loop
            // advancing; the post-re-sort recompute below supersedes it.
            if let Some(last) = batch.last() {
                if let Some(cursor) = PageCursor::for_item(last, self.cfg.order_by) {
                    self.cursor = Some(cursor);
                }
            }

            for item in batch {
                if self.excluded.contains(&item.id) {
                    continue;
                }
                if !seen.insert(item.id.clone()) {
                    continue;
                }
                if !item.kind.is_displayable() {
                    continue;
                }
                fetched.push(item);
            }

            if raw_len < target {
                self.exhausted = true;
                break;
            }
            if fetched.len() >= target {
                break;
            }
        }

        if self.cfg.order_by.is_date() && !fetched.is_empty() {
            // The backend's null handling for missing dates is not
            // trusted: re-sort client-side with the three-way date
            // fallback, then recompute the cursor from the re-sorted
            // tail — using the raw tail here can skip or repeat items
            // on the next page.
            fetched.sort_by(|a, b| compare_by_date_fallback(a, b, self.cfg.direction));
            if let Some(last) = fetched.last() {
                if let Some(cursor) = PageCursor::for_item(last, self.cfg.order_by) {
                    self.cursor = Some(cursor);
                }
            }
        }

        debug!(
            fetched = fetched.len(),
            exhausted = self.exhausted,
            "ordered fetch pass finished"
        );
        self.buffer.extend(fetched);
        Ok(())
    }

    /// Reset pagination to the start of the collection.
    fn rewind(&mut self) {
        self.cursor = None;
        self.exhausted = false;
        self.excluded.clear();
    }
}

#[async_trait]
impl MediaProvider for PagedIndexProvider {
    /// The first fetch doubles as the preload pass: a collection
    /// smaller than one batch is fully buffered here, and
    /// [`Self::fully_loaded`] reports it.
    async fn initialize(&mut self) -> Result<()> {
        self.fetch_batch().await?;
        if self.buffer.is_empty() && self.exhausted {
            return Err(crate::EngineError::FiltersTooRestrictive(
                "the media index returned no items for the configured source".into(),
            ));
        }
        Ok(())
    }

    async fn get_next(&mut self) -> Result<Option<MediaItem>> {
        if self.buffer.len() < self.cfg.low_water && !self.exhausted {
            // Mid-stream degradation is soft: log, mark exhausted, and
            // let the wrap logic take over.
            if let Err(err) = self.fetch_batch().await {
                warn!("ordered refill failed, treating collection as exhausted: {err}");
                self.exhausted = true;
            }
        }
        if let Some(item) = self.buffer.pop_front() {
            return Ok(Some(item));
        }
        if !self.auto_loop {
            return Ok(None);
        }
        // Wrap to the beginning with a fresh query; cleared exclusions
        // give previously-404'd files another chance after a rescan on
        // the index side.
        self.rewind();
        if let Err(err) = self.fetch_batch().await {
            warn!("wrap-around fetch failed: {err}");
            return Ok(None);
        }
        Ok(self.buffer.pop_front())
    }

    async fn check_file_exists(&self, item: &MediaItem) -> Option<bool> {
        self.gateway.check_exists(item).await
    }

    async fn exclude_file(&mut self, id: &str) {
        self.excluded.insert(id);
        self.buffer.retain(|item| item.id != id);
    }

    async fn reset(&mut self) -> Result<()> {
        self.buffer.clear();
        self.rewind();
        Ok(())
    }

    async fn rescan(&mut self) -> Result<()> {
        self.buffer.clear();
        self.rewind();
        self.fetch_batch().await
    }

    async fn files_newer_than(&self, cutoff: DateTime<Utc>) -> Vec<MediaItem> {
        self.gateway
            .query_newer_than(cutoff, self.cfg.queue_size)
            .await
    }
}
