//! Top-level assembly: configuration in, a ready navigation controller
//! out.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use driftframe_config::{ResolvedConfig, ResolvedSource};

use crate::error::Result;
use crate::host::HostGateway;
use crate::index::IndexGateway;
use crate::navigation::{NavigationConfig, NavigationController};
use crate::providers::{FolderProvider, MediaProvider, SharedSeen, SingleFileProvider};
use crate::session::SessionStore;

/// A fully wired slideshow engine for one card instance.
pub struct Engine {
    controller: NavigationController,
    gateway: Arc<IndexGateway>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

impl Engine {
    /// Build and initialize the provider the configuration selects,
    /// then wrap it in a navigation controller. Hard configuration
    /// errors (index requested but unreachable, filters matching
    /// nothing) surface here.
    pub async fn from_config(
        host: Arc<dyn HostGateway>,
        cfg: ResolvedConfig,
        session: Option<Arc<dyn SessionStore>>,
    ) -> Result<Self> {
        let gateway = Arc::new(IndexGateway::new(
            Arc::clone(&host),
            cfg.media_index_entity.clone(),
            cfg.tuning.rpc_retry_attempts,
            cfg.tuning.rpc_retry_base(),
        ));
        let seen: SharedSeen = Arc::new(RwLock::new(HashSet::new()));

        let mut provider: Box<dyn MediaProvider> = match &cfg.source {
            ResolvedSource::SingleMedia { path } => {
                let enrichment = gateway.is_configured().then(|| Arc::clone(&gateway));
                Box::new(SingleFileProvider::new(path.clone(), enrichment))
            }
            ResolvedSource::Folder(folder) => Box::new(FolderProvider::new(
                Arc::clone(&host),
                Arc::clone(&gateway),
                &cfg,
                folder.clone(),
                Arc::clone(&seen),
                session,
            )),
        };
        provider.initialize().await?;
        info!("media provider initialized");

        let controller = NavigationController::new(
            provider,
            host,
            NavigationConfig {
                max_window: cfg.navigation_queue_size,
                history_cap: cfg.history_cap(),
                refresh_cadence: cfg.slideshow_window,
                max_repeat_retries: cfg.tuning.max_repeat_retries,
                uri_prefix: gateway.uri_prefix(),
            },
            seen,
        );

        Ok(Self {
            controller,
            gateway,
        })
    }

    pub fn controller(&self) -> &NavigationController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut NavigationController {
        &mut self.controller
    }

    /// Gateway handle for user-initiated mutations (favorite, edit,
    /// delete, burst metadata); their failures surface to the caller
    /// for notification.
    pub fn index(&self) -> &Arc<IndexGateway> {
        &self.gateway
    }
}
