//! Recursive folder scanner over the host's browse RPC.
//!
//! Maintains a work queue of pending subfolders (processed with bounded
//! sibling concurrency), a pool of discovered folders, and a working
//! queue of not-yet-shown items. Random mode samples files with the
//! weighted probabilities from [`super::sampling`]; sequential mode
//! collects everything in chronological traversal order and stops early
//! once the target queue size is reached.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use rand::Rng;
use rand::seq::SliceRandom;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};
use uuid::Uuid;

use driftframe_config::{ResolvedFolder, SlideshowMode, Tuning};
use driftframe_model::{MediaItem, ScannedFolder};

use crate::extract::{self, PathMetadataOptions};
use crate::host::HostGateway;
use crate::scan::estimate::EstimateTracker;
use crate::scan::sampling;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Scanning,
    Paused,
}

/// Control-flow signal unwinding the scan loop. Pausing is not an
/// error: it yields silently and preserves all accumulated state for a
/// later resume. Cancellation is sticky and unwinds completely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanSignal {
    Paused,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub folder: ResolvedFolder,
    /// Target working-queue size (the slideshow window).
    pub target_queue_size: usize,
    /// Session-history size, used to derive the refill low-water mark.
    pub history_size: usize,
    pub tuning: Tuning,
}

/// Lightweight progress view for the "X of Y" indicator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanProgress {
    pub phase: ScanPhase,
    pub folders_discovered: usize,
    pub files_discovered: u64,
    pub estimated_total: u64,
    pub queue_len: usize,
    pub scan_complete: bool,
}

/// Page-reconnect handoff state. Queued items keep their FIFO order; a
/// restored scanner resumes folder traversal where it left off.
#[derive(Debug, Clone)]
pub struct ScanSnapshot {
    pub(crate) base_path: String,
    state: ScanState,
}

impl ScanSnapshot {
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Items waiting in the working queue, in FIFO order.
    pub fn queued(&self) -> impl Iterator<Item = &MediaItem> {
        self.state.queue.iter()
    }

    pub fn pending_folders(&self) -> usize {
        self.state.pending.len()
    }
}

#[derive(Debug, Clone)]
struct ScanState {
    phase: ScanPhase,
    /// Subfolders awaiting traversal, with their depth below base.
    pending: VecDeque<(String, u32)>,
    /// Discovered pool. Folders keep their full file lists for the life
    /// of the scanner; the working queue only ever holds copies.
    folders: Vec<ScannedFolder>,
    queue: VecDeque<MediaItem>,
    /// Ids currently sitting in the working queue.
    queued: HashSet<String>,
    /// Items appended since the last shuffle batch.
    unshuffled: usize,
    shown: HashSet<String>,
    shown_order: VecDeque<String>,
    excluded: HashSet<String>,
    estimate: EstimateTracker,
    files_discovered: u64,
    scan_complete: bool,
}

impl ScanState {
    fn fresh(base_path: &str, user_estimate: Option<u64>) -> Self {
        Self {
            phase: ScanPhase::Idle,
            pending: VecDeque::from([(base_path.to_string(), 0)]),
            folders: Vec::new(),
            queue: VecDeque::new(),
            queued: HashSet::new(),
            unshuffled: 0,
            shown: HashSet::new(),
            shown_order: VecDeque::new(),
            excluded: HashSet::new(),
            estimate: EstimateTracker::new(user_estimate),
            files_discovered: 0,
            scan_complete: false,
        }
    }

    fn enqueue(&mut self, item: MediaItem) {
        if self.queued.insert(item.id.clone()) {
            self.queue.push_back(item);
            self.unshuffled += 1;
        }
    }

    /// Whether the pool still holds anything not shown and not already
    /// queued.
    fn has_pool_candidates(&self) -> bool {
        self.folders.iter().any(|folder| {
            folder.files.iter().any(|item| {
                !self.shown.contains(&item.id)
                    && !self.queued.contains(&item.id)
                    && !self.excluded.contains(&item.id)
            })
        })
    }
}

pub struct FolderScanner {
    host: Arc<dyn HostGateway>,
    cfg: ScannerConfig,
    scan_id: Uuid,
    cancelled: AtomicBool,
    /// Set when a sequential scan stopped early at the target size;
    /// distinguishes a resumable stop from a user cancellation.
    stopped_early: AtomicBool,
    paused: AtomicBool,
    scanning: AtomicBool,
    refilling: AtomicBool,
    state: Mutex<ScanState>,
    progress_notify: Notify,
}

impl std::fmt::Debug for FolderScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderScanner")
            .field("scan_id", &self.scan_id)
            .field("path", &self.cfg.folder.path)
            .finish_non_exhaustive()
    }
}

impl FolderScanner {
    pub fn new(host: Arc<dyn HostGateway>, cfg: ScannerConfig) -> Self {
        let state = ScanState::fresh(&cfg.folder.path, cfg.folder.estimated_total_photos);
        Self {
            host,
            cfg,
            scan_id: Uuid::new_v4(),
            cancelled: AtomicBool::new(false),
            stopped_early: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            scanning: AtomicBool::new(false),
            refilling: AtomicBool::new(false),
            state: Mutex::new(state),
            progress_notify: Notify::new(),
        }
    }

    /// Rebuild a scanner from a handoff snapshot. Falls back to a fresh
    /// scanner when the snapshot belongs to a different path.
    pub fn from_snapshot(
        host: Arc<dyn HostGateway>,
        cfg: ScannerConfig,
        snapshot: ScanSnapshot,
    ) -> Self {
        if snapshot.base_path != cfg.folder.path {
            debug!(
                snapshot = %snapshot.base_path,
                configured = %cfg.folder.path,
                "snapshot path differs, starting a cold scan"
            );
            return Self::new(host, cfg);
        }
        let mut state = snapshot.state;
        state.phase = ScanPhase::Idle;
        Self {
            state: Mutex::new(state),
            ..Self::new(host, cfg)
        }
    }

    /// Start (or resume) scanning and wait until at least one item is
    /// available or the scan settled.
    pub async fn initialize(self: &Arc<Self>) -> crate::Result<()> {
        {
            let mut st = self.state.lock().await;
            if st.scan_complete && !st.queue.is_empty() {
                return Ok(());
            }
            st.phase = ScanPhase::Scanning;
        }
        tokio::spawn(Arc::clone(self).run_scan());
        loop {
            let notified = self.progress_notify.notified();
            {
                let st = self.state.lock().await;
                if !st.queue.is_empty() || st.scan_complete || st.phase == ScanPhase::Paused {
                    break;
                }
            }
            notified.await;
        }
        let st = self.state.lock().await;
        if st.queue.is_empty() && st.scan_complete && st.files_discovered == 0 {
            return Err(crate::EngineError::NoMediaAvailable);
        }
        Ok(())
    }

    async fn run_scan(self: Arc<Self>) {
        if self.scanning.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(scan_id = %self.scan_id, path = %self.cfg.folder.path, "folder scan running");
        let concurrency = self.cfg.folder.scan_concurrency();
        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                break;
            }
            if self.paused.load(Ordering::SeqCst) {
                self.enter_paused().await;
                return;
            }

            let batch: Vec<(String, u32)> = {
                let mut st = self.state.lock().await;
                let take = concurrency.min(st.pending.len());
                st.pending.drain(..take).collect()
            };
            if batch.is_empty() {
                let mut st = self.state.lock().await;
                st.scan_complete = true;
                st.estimate.lock();
                st.phase = ScanPhase::Idle;
                info!(
                    scan_id = %self.scan_id,
                    folders = st.folders.len(),
                    files = st.files_discovered,
                    queued = st.queue.len(),
                    "folder scan complete"
                );
                drop(st);
                self.scanning.store(false, Ordering::SeqCst);
                self.progress_notify.notify_waiters();
                return;
            }

            // Siblings run settled: one folder's failure never aborts
            // the others in its batch.
            let results = join_all(
                batch
                    .iter()
                    .map(|(uri, depth)| self.process_folder(uri, *depth)),
            )
            .await;

            let mut signal = None;
            for ((uri, depth), result) in batch.into_iter().zip(results) {
                if let Err(sig) = result {
                    // The folder was not processed; keep it at the head
                    // so a resume picks up exactly where traversal left
                    // off.
                    let mut st = self.state.lock().await;
                    st.pending.push_front((uri, depth));
                    signal = Some(match (signal, sig) {
                        (Some(ScanSignal::Cancelled), _) | (_, ScanSignal::Cancelled) => {
                            ScanSignal::Cancelled
                        }
                        _ => ScanSignal::Paused,
                    });
                }
            }
            self.progress_notify.notify_waiters();

            match signal {
                Some(ScanSignal::Paused) => {
                    self.enter_paused().await;
                    return;
                }
                Some(ScanSignal::Cancelled) => break,
                None => {}
            }
        }

        // Cancelled: unwind, keeping accumulated state (a sequential
        // early-stop resumes from here when the queue runs low).
        let mut st = self.state.lock().await;
        if st.pending.is_empty() {
            // Nothing left to traverse; the stop doubled as completion.
            st.scan_complete = true;
            st.estimate.lock();
        }
        st.phase = ScanPhase::Idle;
        drop(st);
        self.scanning.store(false, Ordering::SeqCst);
        self.progress_notify.notify_waiters();
    }

    async fn enter_paused(&self) {
        let mut st = self.state.lock().await;
        st.phase = ScanPhase::Paused;
        drop(st);
        self.scanning.store(false, Ordering::SeqCst);
        self.progress_notify.notify_waiters();
        debug!(scan_id = %self.scan_id, "scan paused, state preserved");
    }

    async fn process_folder(&self, uri: &str, depth: u32) -> Result<(), ScanSignal> {
        self.check_cancelled()?;
        self.wait_if_paused()?;

        let timeout = self.cfg.tuning.browse_timeout();
        let browse = match tokio::time::timeout(timeout, self.host.browse(uri)).await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                warn!(uri, "browse failed, subtree contributes no files: {err}");
                return Ok(());
            }
            Err(_) => {
                warn!(uri, ?timeout, "browse timed out, subtree contributes no files");
                return Ok(());
            }
        };

        let opts = PathMetadataOptions {
            media_root_marker: &self.cfg.folder.media_root_marker,
            folder_date_pattern: self.cfg.folder.folder_date_pattern.as_deref(),
        };
        let mut files: Vec<MediaItem> = Vec::new();
        let mut subdirs: Vec<(String, String)> = Vec::new();
        for node in browse.children {
            if node.can_expand {
                subdirs.push((node.id, node.title));
                continue;
            }
            let kind = match node.media_class.as_deref() {
                Some("image") => driftframe_model::MediaKind::Image,
                Some("video") => driftframe_model::MediaKind::Video,
                _ => extract::detect_kind(&node.id),
            };
            if !kind.is_displayable() {
                continue;
            }
            let metadata = extract::extract_path_metadata(&node.id, &opts);
            files.push(MediaItem::new(node.id, kind).with_metadata(metadata));
        }

        if self.cfg.folder.mode == SlideshowMode::Sequential {
            sort_files_chronologically(&mut files, self.cfg.folder.order_direction.is_desc());
        }

        {
            let mut st = self.state.lock().await;
            self.absorb_folder(&mut st, uri, depth, files);

            let descend = match self.cfg.folder.scan_depth {
                None => true,
                Some(limit) => depth < limit,
            };
            if descend && !subdirs.is_empty() {
                if self.cfg.folder.mode == SlideshowMode::Sequential {
                    // Depth-first in approximate date order: sort by the
                    // folder-name date heuristic and push to the head so
                    // the first subfolder is traversed next.
                    subdirs.sort_by(|(_, a), (_, b)| {
                        match (extract::folder_date_value(a), extract::folder_date_value(b)) {
                            (Some(va), Some(vb)) => va.cmp(&vb),
                            (Some(_), None) => std::cmp::Ordering::Less,
                            (None, Some(_)) => std::cmp::Ordering::Greater,
                            (None, None) => a.cmp(b),
                        }
                    });
                    for (id, _) in subdirs.into_iter().rev() {
                        st.pending.push_front((id, depth + 1));
                    }
                } else {
                    for (id, _) in subdirs {
                        st.pending.push_back((id, depth + 1));
                    }
                }
            }
        }
        Ok(())
    }

    /// Record a folder in the pool and copy files into the working
    /// queue. The pool keeps the full file list either way; the queue
    /// only receives copies. Runs synchronously under the state lock;
    /// all randomness is scoped here.
    fn absorb_folder(&self, st: &mut ScanState, uri: &str, depth: u32, files: Vec<MediaItem>) {
        let file_count = files.len();

        match self.cfg.folder.mode {
            SlideshowMode::Sequential => {
                for item in &files {
                    if !st.excluded.contains(&item.id) {
                        st.enqueue(item.clone());
                    }
                }
                self.record_folder(st, uri, depth, files, file_count);
                if st.queue.len() >= self.cfg.target_queue_size {
                    debug!(
                        queued = st.queue.len(),
                        target = self.cfg.target_queue_size,
                        "sequential target reached, stopping scan early"
                    );
                    self.stopped_early.store(true, Ordering::SeqCst);
                    self.cancelled.store(true, Ordering::SeqCst);
                }
            }
            SlideshowMode::Random => {
                let multiplier =
                    sampling::priority_multiplier(uri, &self.cfg.folder.priority_folders);
                let mut rng = rand::rng();
                // Count the folder before sampling so the estimate the
                // probability uses already includes it.
                self.record_folder(st, uri, depth, files.clone(), file_count);
                for item in files {
                    if st.excluded.contains(&item.id) {
                        continue;
                    }
                    let probability = sampling::acceptance_probability(
                        self.cfg.target_queue_size,
                        st.estimate.current(true),
                        st.queue.len(),
                        file_count,
                        multiplier,
                    );
                    if rng.random::<f64>() < probability {
                        st.enqueue(item);
                    }
                }
                Self::maybe_shuffle(st, &mut rng);
            }
        }
    }

    fn record_folder(
        &self,
        st: &mut ScanState,
        uri: &str,
        depth: u32,
        files: Vec<MediaItem>,
        file_count: usize,
    ) {
        match st.folders.iter_mut().find(|f| f.path == uri) {
            Some(existing) => {
                // Rescan of a known path: replace, not merge.
                let previous = existing.file_count;
                st.files_discovered = st.files_discovered - previous as u64 + file_count as u64;
                *existing = ScannedFolder {
                    path: uri.to_string(),
                    files,
                    file_count,
                    depth,
                    recorded: true,
                };
            }
            None => {
                let mut folder = ScannedFolder::new(uri, files, depth);
                folder.file_count = file_count;
                folder.recorded = true;
                st.folders.push(folder);
                st.files_discovered += file_count as u64;
                st.estimate.add_discovered(file_count as u64);
            }
        }
    }

    fn maybe_shuffle(st: &mut ScanState, rng: &mut impl Rng) {
        if st.unshuffled >= sampling::shuffle_threshold(st.queue.len()) {
            st.queue.make_contiguous().shuffle(rng);
            st.unshuffled = 0;
        }
    }

    /// Pop the next not-yet-shown item. When the queue is drained, age
    /// out 70% of the shown set (keeping the most recent 30%) and
    /// replenish from the discovered pool before giving up.
    pub async fn get_next(self: &Arc<Self>) -> Option<MediaItem> {
        let mut st = self.state.lock().await;
        let mut item = Self::pop_unshown(&mut st);
        if item.is_none() {
            Self::age_shown(&mut st);
            self.refill_from_pool(&mut st);
            item = Self::pop_unshown(&mut st);
        }
        if let Some(item) = &item {
            st.shown.insert(item.id.clone());
            st.shown_order.push_back(item.id.clone());
        }

        // Background replenish once the unshown buffer runs low.
        let min_buffer = self.min_buffer(&st);
        let pool_has_more = st.has_pool_candidates() || !st.pending.is_empty();
        if st.queue.len() < min_buffer && pool_has_more && !self.refilling.load(Ordering::SeqCst) {
            tokio::spawn(Arc::clone(self).background_refill());
        }
        item
    }

    fn pop_unshown(st: &mut ScanState) -> Option<MediaItem> {
        while let Some(item) = st.queue.pop_front() {
            st.queued.remove(&item.id);
            if st.excluded.contains(&item.id) || st.shown.contains(&item.id) {
                continue;
            }
            return Some(item);
        }
        None
    }

    fn age_shown(st: &mut ScanState) {
        let keep = st.shown_order.len() * 3 / 10;
        while st.shown_order.len() > keep {
            if let Some(id) = st.shown_order.pop_front() {
                st.shown.remove(&id);
            }
        }
    }

    /// Minimum unshown buffer before a background refill is triggered:
    /// `max(history + 5, 15)`, scaled down for tiny collections.
    fn min_buffer(&self, st: &ScanState) -> usize {
        let base = (self.cfg.history_size + 5).max(15);
        let pool = st.files_discovered as usize;
        base.min((pool / 2).max(1))
    }

    /// Top the working queue back up from the discovered pool with
    /// items that are neither shown, queued, nor excluded. Random mode
    /// picks folders weighted by their sampling weight so large folders
    /// contribute proportionally more without starving small ones;
    /// sequential mode re-enqueues in traversal order.
    fn refill_from_pool(&self, st: &mut ScanState) {
        let needed = self.cfg.target_queue_size.saturating_sub(st.queue.len());
        if needed == 0 {
            return;
        }

        if self.cfg.folder.mode == SlideshowMode::Sequential {
            let mut picked = Vec::new();
            'outer: for folder in &st.folders {
                for item in &folder.files {
                    if st.shown.contains(&item.id)
                        || st.queued.contains(&item.id)
                        || st.excluded.contains(&item.id)
                    {
                        continue;
                    }
                    picked.push(item.clone());
                    if picked.len() >= needed {
                        break 'outer;
                    }
                }
            }
            for item in picked {
                st.enqueue(item);
            }
            return;
        }

        // Per-folder candidate lists, so the weighted draw below never
        // spins on folders with nothing left to give.
        let mut candidates: Vec<(f64, Vec<MediaItem>)> = st
            .folders
            .iter()
            .map(|folder| {
                let eligible: Vec<MediaItem> = folder
                    .files
                    .iter()
                    .filter(|item| {
                        !st.shown.contains(&item.id)
                            && !st.queued.contains(&item.id)
                            && !st.excluded.contains(&item.id)
                    })
                    .cloned()
                    .collect();
                (sampling::folder_weight(folder.file_count), eligible)
            })
            .filter(|(_, eligible)| !eligible.is_empty())
            .collect();

        let mut rng = rand::rng();
        let mut picked = Vec::new();
        for _ in 0..needed {
            let total_weight: f64 = candidates.iter().map(|(w, _)| *w).sum();
            if total_weight <= 0.0 {
                break;
            }
            let mut pick = rng.random_range(0.0..total_weight);
            let mut chosen = 0;
            for (idx, (weight, _)) in candidates.iter().enumerate() {
                pick -= weight;
                if pick <= 0.0 {
                    chosen = idx;
                    break;
                }
            }
            let pool = &mut candidates[chosen].1;
            let at = rng.random_range(0..pool.len());
            picked.push(pool.swap_remove(at));
            if pool.is_empty() {
                candidates.remove(chosen);
            }
        }
        for item in picked {
            st.enqueue(item);
        }
        Self::maybe_shuffle(st, &mut rng);
    }

    async fn background_refill(self: Arc<Self>) {
        if self.refilling.swap(true, Ordering::SeqCst) {
            return;
        }
        {
            let mut st = self.state.lock().await;
            self.refill_from_pool(&mut st);
        }
        // Pool drained but traversal unfinished: resume the scan
        // (clearing an early-stop, never a user cancellation).
        let should_resume = {
            let st = self.state.lock().await;
            st.queue.len() < self.cfg.target_queue_size
                && !st.pending.is_empty()
                && !st.scan_complete
        };
        if should_resume
            && self.stopped_early.swap(false, Ordering::SeqCst)
        {
            self.cancelled.store(false, Ordering::SeqCst);
        }
        if should_resume && !self.cancelled.load(Ordering::SeqCst) {
            let mut st = self.state.lock().await;
            st.phase = ScanPhase::Scanning;
            drop(st);
            tokio::spawn(Arc::clone(&self).run_scan());
        }
        self.refilling.store(false, Ordering::SeqCst);
    }

    /// Forget shown-item history so a wrapped provider can serve the
    /// collection again; the discovered pool is kept.
    pub async fn reset(self: &Arc<Self>) {
        let mut st = self.state.lock().await;
        st.shown.clear();
        st.shown_order.clear();
        self.refill_from_pool(&mut st);
    }

    /// Drop all discovery state and re-traverse from the base folder.
    pub async fn rescan(self: &Arc<Self>) {
        self.cancelled.store(false, Ordering::SeqCst);
        self.stopped_early.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        {
            let mut st = self.state.lock().await;
            *st = ScanState::fresh(&self.cfg.folder.path, self.cfg.folder.estimated_total_photos);
            st.phase = ScanPhase::Scanning;
        }
        tokio::spawn(Arc::clone(self).run_scan());
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Resume a paused scan from where folder traversal left off.
    pub async fn resume(self: &Arc<Self>) {
        self.paused.store(false, Ordering::SeqCst);
        let has_work = {
            let mut st = self.state.lock().await;
            let resume = !st.scan_complete && !st.pending.is_empty();
            if resume {
                st.phase = ScanPhase::Scanning;
            } else {
                st.phase = ScanPhase::Idle;
            }
            resume
        };
        if has_work && !self.cancelled.load(Ordering::SeqCst) {
            tokio::spawn(Arc::clone(self).run_scan());
        }
    }

    /// Sticky cancellation: the scan unwinds completely.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub async fn exclude(&self, id: &str) {
        let mut st = self.state.lock().await;
        st.excluded.insert(id.to_string());
        st.queue.retain(|item| item.id != id);
        st.queued.remove(id);
    }

    /// Discovered-but-unshown items newer than `cutoff`.
    pub async fn files_newer_than(&self, cutoff: DateTime<Utc>) -> Vec<MediaItem> {
        let st = self.state.lock().await;
        st.folders
            .iter()
            .flat_map(|f| f.files.iter())
            .chain(st.queue.iter())
            .filter(|item| !st.shown.contains(&item.id))
            .filter(|item| {
                item.metadata
                    .as_ref()
                    .and_then(|m| m.captured_at.or(m.modified_at).or(m.created_at))
                    .is_some_and(|ts| ts > cutoff)
            })
            .cloned()
            .collect()
    }

    pub async fn progress(&self) -> ScanProgress {
        let st = self.state.lock().await;
        ScanProgress {
            phase: st.phase,
            folders_discovered: st.folders.len(),
            files_discovered: st.files_discovered,
            estimated_total: st.estimate.current(!st.scan_complete),
            queue_len: st.queue.len(),
            scan_complete: st.scan_complete,
        }
    }

    /// Capture the full discovery state for page-reconnect handoff.
    pub async fn snapshot(&self) -> ScanSnapshot {
        let st = self.state.lock().await;
        ScanSnapshot {
            base_path: self.cfg.folder.path.clone(),
            state: st.clone(),
        }
    }

    fn check_cancelled(&self) -> Result<(), ScanSignal> {
        if self.cancelled.load(Ordering::SeqCst) {
            Err(ScanSignal::Cancelled)
        } else {
            Ok(())
        }
    }

    fn wait_if_paused(&self) -> Result<(), ScanSignal> {
        if self.paused.load(Ordering::SeqCst) {
            Err(ScanSignal::Paused)
        } else {
            Ok(())
        }
    }
}

/// Order files by their extracted capture time (vendor dual-timestamp
/// URIs resolve to the second, true capture time), falling back to the
/// filename when no timestamp is recoverable.
fn sort_files_chronologically(files: &mut Vec<MediaItem>, descending: bool) {
    let mut keyed: Vec<(Option<DateTime<Utc>>, MediaItem)> = std::mem::take(files)
        .into_iter()
        .map(|item| (extract::capture_time_for_ordering(&item.id), item))
        .collect();
    keyed.sort_by(|(ka, a), (kb, b)| match (ka, kb) {
        (Some(ta), Some(tb)) => {
            let ord = ta.cmp(tb);
            if descending { ord.reverse() } else { ord }
        }
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a
            .filename()
            .unwrap_or(&a.id)
            .cmp(b.filename().unwrap_or(&b.id)),
    });
    *files = keyed.into_iter().map(|(_, item)| item).collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use driftframe_model::MediaKind;

    fn item(id: &str) -> MediaItem {
        MediaItem::new(id, MediaKind::Image)
    }

    #[test]
    fn chronological_sort_uses_second_timestamp_and_filename_fallback() {
        let mut files = vec![
            item("/p/zebra.jpg"),
            item("/p/20220727_090000_20220727_150000.jpg"),
            item("/p/20220727_120000.jpg"),
            item("/p/apple.jpg"),
        ];
        sort_files_chronologically(&mut files, false);
        let ids: Vec<&str> = files.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(
            ids,
            [
                "/p/20220727_120000.jpg",
                // Dual timestamp orders by the second (15:00), not the first (09:00).
                "/p/20220727_090000_20220727_150000.jpg",
                "/p/apple.jpg",
                "/p/zebra.jpg",
            ]
        );
    }

    #[test]
    fn aging_keeps_the_most_recent_third() {
        let mut st = ScanState::fresh("/media", None);
        for i in 0..10 {
            let id = format!("f{i}");
            st.shown.insert(id.clone());
            st.shown_order.push_back(id);
        }
        FolderScanner::age_shown(&mut st);
        assert_eq!(st.shown_order.len(), 3);
        assert!(st.shown.contains("f9"));
        assert!(st.shown.contains("f7"));
        assert!(!st.shown.contains("f0"));
    }
}
