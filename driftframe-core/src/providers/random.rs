//! Rolling random buffer over the media index, with cache-exhaustion
//! detection and live filter re-evaluation.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use driftframe_model::{DateBound, FavoriteFilter, MediaItem, QueryFilters, normalize_media_id};

use crate::error::Result;
use crate::host::HostGateway;
use crate::index::{EffectiveFilters, IndexGateway};
use crate::providers::{ExclusionSet, MediaProvider, SharedSeen};

#[derive(Debug, Clone)]
pub struct RandomProviderConfig {
    pub filters: QueryFilters,
    /// Favor recently-indexed files on refills.
    pub prioritize_recent: bool,
    pub batch_size: usize,
    pub low_water: usize,
    /// Duplicate-filter rate counting as "mostly exhausted".
    pub high_filter_rate: f64,
    /// Consecutive high-rate refills before the prioritize-recent path
    /// is skipped proactively.
    pub exhaustion_latch: u32,
}

/// Batch-random puller against the media index.
pub struct RandomIndexProvider {
    gateway: Arc<IndexGateway>,
    host: Arc<dyn HostGateway>,
    cfg: RandomProviderConfig,
    buffer: VecDeque<MediaItem>,
    seen: SharedSeen,
    excluded: ExclusionSet,
    consecutive_high: u32,
    /// Latched after `exhaustion_latch` consecutive high-filter
    /// refills; cleared by the first low-rate response.
    skip_recent: bool,
    needs_reset: Arc<AtomicBool>,
    subscription: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for RandomIndexProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomIndexProvider")
            .field("buffer", &self.buffer.len())
            .field("skip_recent", &self.skip_recent)
            .finish_non_exhaustive()
    }
}

impl RandomIndexProvider {
    pub fn new(
        gateway: Arc<IndexGateway>,
        host: Arc<dyn HostGateway>,
        cfg: RandomProviderConfig,
        seen: SharedSeen,
    ) -> Self {
        let excluded = ExclusionSet::new(gateway.uri_prefix());
        Self {
            gateway,
            host,
            cfg,
            buffer: VecDeque::new(),
            seen,
            excluded,
            consecutive_high: 0,
            skip_recent: false,
            needs_reset: Arc::new(AtomicBool::new(false)),
            subscription: None,
        }
    }

    /// Resolve live entity references in the configured filters to
    /// concrete values.
    async fn effective_filters(&self) -> EffectiveFilters {
        let mut effective = EffectiveFilters::default();
        match &self.cfg.filters.favorites {
            Some(FavoriteFilter::Fixed(value)) => effective.favorites = Some(*value),
            Some(FavoriteFilter::Entity(entity)) => {
                effective.favorites = match self.host.get_state(entity).await {
                    Ok(Some(state)) => Some(matches!(state.as_str(), "on" | "true")),
                    Ok(None) => None,
                    Err(err) => {
                        debug!(entity, "favorite entity unavailable, filter skipped: {err}");
                        None
                    }
                };
            }
            None => {}
        }
        if let Some(range) = &self.cfg.filters.date_range {
            effective.taken_after = self.resolve_bound(range.start.as_ref()).await;
            effective.taken_before = self.resolve_bound(range.end.as_ref()).await;
        }
        effective
    }

    async fn resolve_bound(&self, bound: Option<&DateBound>) -> Option<DateTime<Utc>> {
        match bound? {
            DateBound::Fixed(ts) => Some(*ts),
            DateBound::Entity(entity) => match self.host.get_state(entity).await {
                Ok(Some(state)) => DateTime::parse_from_rfc3339(&state)
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok(),
                _ => None,
            },
        }
    }

    /// Drop everything a previously-seen filter value could have
    /// shaped: buffer, the caller's seen set, and the exhaustion latch.
    /// Filter changes are rare user actions; correctness over
    /// efficiency.
    async fn full_reset(&mut self) {
        info!("filter entity changed, resetting the random buffer");
        self.buffer.clear();
        self.seen.write().await.clear();
        self.consecutive_high = 0;
        self.skip_recent = false;
    }

    /// Fraction of `batch` already known (buffer, session history, or
    /// excluded), plus the survivors.
    async fn filter_batch(&self, batch: Vec<MediaItem>) -> (Vec<MediaItem>, f64) {
        let total = batch.len();
        if total == 0 {
            return (Vec::new(), 0.0);
        }
        let prefix = self.excluded_prefix();
        let seen = self.seen.read().await;
        let kept: Vec<MediaItem> = batch
            .into_iter()
            .filter(|item| {
                if self.excluded.contains(&item.id) {
                    return false;
                }
                if self.buffer.iter().any(|b| b.id == item.id) {
                    return false;
                }
                !seen.contains(&normalize_media_id(&item.id, prefix.as_deref()))
            })
            .collect();
        let rate = 1.0 - kept.len() as f64 / total as f64;
        (kept, rate)
    }

    fn excluded_prefix(&self) -> Option<String> {
        self.gateway.uri_prefix()
    }

    /// One refill pass. Returns `None` on a hard service failure (for
    /// `initialize` to surface; mid-stream callers absorb it).
    async fn refill(&mut self) -> Option<()> {
        let filters = self.effective_filters().await;
        let prioritize = self.cfg.prioritize_recent && !self.skip_recent;

        let batch = self
            .gateway
            .query_random(self.cfg.batch_size, &filters, prioritize)
            .await?;
        let (mut kept, rate) = self.filter_batch(batch).await;

        if rate > self.cfg.high_filter_rate && prioritize {
            // The recently-indexed pool is likely exhausted; retry once
            // against the full random pool.
            debug!(rate, "high duplicate rate with prioritize-recent, retrying without it");
            if let Some(retry) = self
                .gateway
                .query_random(self.cfg.batch_size, &filters, false)
                .await
            {
                let (more, _) = self.filter_batch(retry).await;
                let known: std::collections::HashSet<String> =
                    kept.iter().map(|i| i.id.clone()).collect();
                kept.extend(more.into_iter().filter(|i| !known.contains(&i.id)));
            }
        }

        if rate > self.cfg.high_filter_rate {
            self.consecutive_high += 1;
            if self.consecutive_high >= self.cfg.exhaustion_latch && !self.skip_recent {
                debug!(
                    consecutive = self.consecutive_high,
                    "latching prioritize-recent off after consecutive exhausted refills"
                );
                self.skip_recent = true;
            }
        } else {
            // A single healthy refill unlatches the skip.
            self.consecutive_high = 0;
            self.skip_recent = false;
        }

        self.buffer.extend(kept);
        Some(())
    }
}

impl Drop for RandomIndexProvider {
    fn drop(&mut self) {
        if let Some(task) = self.subscription.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl MediaProvider for RandomIndexProvider {
    async fn initialize(&mut self) -> Result<()> {
        // Dynamic filters: subscribe to the referenced entities and
        // force a full reset on any relevant change.
        let entities = self.cfg.filters.referenced_entities();
        if !entities.is_empty() {
            let mut events = self.host.subscribe_state_changes(&entities);
            let needs_reset = Arc::clone(&self.needs_reset);
            self.subscription = Some(tokio::spawn(async move {
                while let Ok(change) = events.recv().await {
                    if entities.contains(&change.entity_id) {
                        needs_reset.store(true, Ordering::SeqCst);
                    }
                }
            }));
        }

        if self.refill().await.is_none() {
            return Err(crate::EngineError::IndexUnavailable(
                "random query against the media index failed".into(),
            ));
        }
        if self.buffer.is_empty() {
            return Err(crate::EngineError::FiltersTooRestrictive(
                "the configured filters matched no items".into(),
            ));
        }
        Ok(())
    }

    async fn get_next(&mut self) -> Result<Option<MediaItem>> {
        if self.needs_reset.swap(false, Ordering::SeqCst) {
            self.full_reset().await;
        }
        if self.buffer.len() < self.cfg.low_water {
            if self.refill().await.is_none() {
                warn!("random refill failed, serving the remaining buffer");
            }
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
        self.consecutive_high = 0;
        self.skip_recent = false;
        Ok(())
    }

    async fn rescan(&mut self) -> Result<()> {
        self.full_reset().await;
        if self.refill().await.is_none() {
            warn!("rescan refill failed, buffer left empty");
        }
        Ok(())
    }

    async fn files_newer_than(&self, cutoff: DateTime<Utc>) -> Vec<MediaItem> {
        self.gateway
            .query_newer_than(cutoff, self.cfg.batch_size)
            .await
    }
}
