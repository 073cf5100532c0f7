//! Façade selecting the concrete folder strategy at initialize time.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use driftframe_config::{ResolvedConfig, ResolvedFolder, SlideshowMode};
use driftframe_model::MediaItem;

use crate::error::{EngineError, Result};
use crate::host::HostGateway;
use crate::index::IndexGateway;
use crate::providers::paged::{PagedIndexProvider, PagedProviderConfig};
use crate::providers::random::{RandomIndexProvider, RandomProviderConfig};
use crate::providers::{MediaProvider, SharedSeen};
use crate::scan::{FolderScanner, ScannerConfig};
use crate::session::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActiveKind {
    Scanner,
    Paged,
    Random,
}

/// Dispatches the uniform provider contract over whichever strategy the
/// configuration selects:
///
/// - sequential + index-backed  → [`PagedIndexProvider`]
/// - sequential + filesystem    → [`FolderScanner`] (ordered collection)
/// - random + index-backed      → [`RandomIndexProvider`]
/// - random + filesystem        → [`FolderScanner`] (sampling)
pub struct FolderProvider {
    host: Arc<dyn HostGateway>,
    gateway: Arc<IndexGateway>,
    folder: ResolvedFolder,
    slideshow_window: usize,
    history_cap: usize,
    filters: driftframe_model::QueryFilters,
    tuning: driftframe_config::Tuning,
    seen: SharedSeen,
    session: Option<Arc<dyn SessionStore>>,
    scanner: Option<Arc<FolderScanner>>,
    paged: Option<PagedIndexProvider>,
    random: Option<RandomIndexProvider>,
    active: Option<ActiveKind>,
}

impl std::fmt::Debug for FolderProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderProvider")
            .field("path", &self.folder.path)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl FolderProvider {
    pub fn new(
        host: Arc<dyn HostGateway>,
        gateway: Arc<IndexGateway>,
        cfg: &ResolvedConfig,
        folder: ResolvedFolder,
        seen: SharedSeen,
        session: Option<Arc<dyn SessionStore>>,
    ) -> Self {
        Self {
            host,
            gateway,
            folder,
            slideshow_window: cfg.slideshow_window,
            history_cap: cfg.history_cap(),
            filters: cfg.filters.clone(),
            tuning: cfg.tuning.clone(),
            seen,
            session,
            scanner: None,
            paged: None,
            random: None,
            active: None,
        }
    }

    /// Progress of the underlying scan, when the filesystem strategy is
    /// active.
    pub async fn scan_progress(&self) -> Option<crate::scan::ScanProgress> {
        match &self.scanner {
            Some(scanner) => Some(scanner.progress().await),
            None => None,
        }
    }

    /// Hand the scanner's discovery state to the session store so a
    /// reconnecting page can resume instead of rescanning from zero.
    pub async fn suspend(&self) {
        if let (Some(scanner), Some(session)) = (&self.scanner, &self.session) {
            let snapshot = scanner.snapshot().await;
            session.put(&self.folder.path, snapshot);
            info!(path = %self.folder.path, "scanner state handed off to the session store");
        }
    }

    async fn initialize_scanner(&mut self) -> Result<()> {
        let scanner_cfg = ScannerConfig {
            folder: self.folder.clone(),
            target_queue_size: self.slideshow_window,
            history_size: self.history_cap,
            tuning: self.tuning.clone(),
        };
        let scanner = match self
            .session
            .as_ref()
            .and_then(|s| s.take_if_present(&self.folder.path))
        {
            Some(snapshot) => {
                info!(path = %self.folder.path, "resuming scanner from session snapshot");
                Arc::new(FolderScanner::from_snapshot(
                    Arc::clone(&self.host),
                    scanner_cfg,
                    snapshot,
                ))
            }
            None => Arc::new(FolderScanner::new(Arc::clone(&self.host), scanner_cfg)),
        };
        scanner.initialize().await?;
        self.scanner = Some(scanner);
        self.active = Some(ActiveKind::Scanner);
        Ok(())
    }

    /// A requested index backend that cannot initialize is a hard
    /// error; silently falling back to filesystem scanning shows the
    /// right feature with the wrong content.
    fn map_index_error(err: EngineError) -> EngineError {
        match err {
            EngineError::FiltersTooRestrictive(_) => err,
            other => EngineError::IndexUnavailable(format!(
                "media index discovery was requested but failed ({other}); check the media index configuration"
            )),
        }
    }
}

#[async_trait]
impl MediaProvider for FolderProvider {
    async fn initialize(&mut self) -> Result<()> {
        match (self.folder.mode, self.folder.use_media_index_for_discovery) {
            (SlideshowMode::Sequential, true) => {
                let mut provider = PagedIndexProvider::new(
                    Arc::clone(&self.gateway),
                    PagedProviderConfig {
                        order_by: self.folder.order_by,
                        direction: self.folder.order_direction,
                        queue_size: self.slideshow_window,
                        low_water: self.tuning.refill_low_water,
                    },
                );
                provider.initialize().await.map_err(Self::map_index_error)?;
                self.paged = Some(provider);
                self.active = Some(ActiveKind::Paged);
                Ok(())
            }
            (SlideshowMode::Random, true) => {
                let mut provider = RandomIndexProvider::new(
                    Arc::clone(&self.gateway),
                    Arc::clone(&self.host),
                    RandomProviderConfig {
                        filters: self.filters.clone(),
                        prioritize_recent: self.folder.priority_new_files,
                        batch_size: self.slideshow_window,
                        low_water: self.tuning.refill_low_water,
                        high_filter_rate: self.tuning.high_filter_rate,
                        exhaustion_latch: self.tuning.exhaustion_latch,
                    },
                    Arc::clone(&self.seen),
                );
                provider.initialize().await.map_err(Self::map_index_error)?;
                self.random = Some(provider);
                self.active = Some(ActiveKind::Random);
                Ok(())
            }
            (_, false) => self.initialize_scanner().await,
        }
    }

    async fn get_next(&mut self) -> Result<Option<MediaItem>> {
        match self.active {
            Some(ActiveKind::Scanner) => match &self.scanner {
                Some(scanner) => Ok(scanner.get_next().await),
                None => Ok(None),
            },
            Some(ActiveKind::Paged) => match &mut self.paged {
                Some(provider) => provider.get_next().await,
                None => Ok(None),
            },
            Some(ActiveKind::Random) => match &mut self.random {
                Some(provider) => provider.get_next().await,
                None => Ok(None),
            },
            None => {
                warn!("get_next called before initialize");
                Ok(None)
            }
        }
    }

    async fn check_file_exists(&self, item: &MediaItem) -> Option<bool> {
        match self.active {
            Some(ActiveKind::Paged) => self.paged.as_ref()?.check_file_exists(item).await,
            Some(ActiveKind::Random) => self.random.as_ref()?.check_file_exists(item).await,
            // Filesystem discovery still defers existence checks to the
            // index when one is configured.
            _ if self.gateway.is_configured() => self.gateway.check_exists(item).await,
            _ => None,
        }
    }

    /// Fans out to every constructed inner provider, not just the
    /// active one, to survive provider-switch races.
    async fn exclude_file(&mut self, id: &str) {
        if let Some(scanner) = &self.scanner {
            scanner.exclude(id).await;
        }
        if let Some(provider) = &mut self.paged {
            provider.exclude_file(id).await;
        }
        if let Some(provider) = &mut self.random {
            provider.exclude_file(id).await;
        }
    }

    async fn reset(&mut self) -> Result<()> {
        match self.active {
            Some(ActiveKind::Scanner) => {
                if let Some(scanner) = &self.scanner {
                    scanner.reset().await;
                }
                Ok(())
            }
            Some(ActiveKind::Paged) => match &mut self.paged {
                Some(provider) => provider.reset().await,
                None => Ok(()),
            },
            Some(ActiveKind::Random) => match &mut self.random {
                Some(provider) => provider.reset().await,
                None => Ok(()),
            },
            None => Ok(()),
        }
    }

    async fn rescan(&mut self) -> Result<()> {
        match self.active {
            Some(ActiveKind::Scanner) => {
                if let Some(scanner) = &self.scanner {
                    scanner.rescan().await;
                }
                Ok(())
            }
            Some(ActiveKind::Paged) => match &mut self.paged {
                Some(provider) => provider.rescan().await,
                None => Ok(()),
            },
            Some(ActiveKind::Random) => match &mut self.random {
                Some(provider) => provider.rescan().await,
                None => Ok(()),
            },
            None => Ok(()),
        }
    }

    async fn files_newer_than(&self, cutoff: DateTime<Utc>) -> Vec<MediaItem> {
        match self.active {
            Some(ActiveKind::Scanner) => match &self.scanner {
                Some(scanner) => scanner.files_newer_than(cutoff).await,
                None => Vec::new(),
            },
            Some(ActiveKind::Paged) => match &self.paged {
                Some(provider) => provider.files_newer_than(cutoff).await,
                None => Vec::new(),
            },
            Some(ActiveKind::Random) => match &self.random {
                Some(provider) => provider.files_newer_than(cutoff).await,
                None => Vec::new(),
            },
            None => Vec::new(),
        }
    }
}
