//! The dashboard host's RPC surface, behind an async seam.
//!
//! The engine never talks to a network directly; every remote
//! interaction goes through [`HostGateway`]. `rest` provides the
//! production HTTP adapter, `memory` a scriptable fake for tests.

pub mod memory;
pub mod rest;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

/// One child returned by a browse call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowseNode {
    pub id: String,
    pub title: String,
    pub can_expand: bool,
    #[serde(default)]
    pub media_class: Option<String>,
}

impl BrowseNode {
    pub fn folder(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            can_expand: true,
            media_class: None,
        }
    }

    pub fn file(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            can_expand: false,
            media_class: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrowseResult {
    pub children: Vec<BrowseNode>,
}

/// Resolved playback target for a media id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMedia {
    pub url: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// State-change notification for a subscribed entity.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub entity_id: String,
    pub state: String,
}

#[derive(Error, Debug)]
pub enum HostError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("host rejected the call: {0}")]
    Rejected(String),

    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// The host (or the target integration) does not implement the
    /// requested call. Not transient; never retried.
    #[error("not supported: {0}")]
    Unsupported(String),
}

impl HostError {
    /// Whether a retry has any chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(self, HostError::Transport(_) | HostError::Timeout(_))
    }
}

pub type HostResult<T> = std::result::Result<T, HostError>;

/// Async client for the dashboard host's RPC channel.
#[async_trait]
pub trait HostGateway: Send + Sync {
    /// List the children of a browsable folder URI.
    async fn browse(&self, folder_uri: &str) -> HostResult<BrowseResult>;

    /// Resolve a media id to a playback URL valid for roughly `ttl`.
    async fn resolve_playback_url(
        &self,
        media_id: &str,
        ttl: Duration,
    ) -> HostResult<ResolvedMedia>;

    /// Invoke a service on the companion indexing integration.
    async fn call_index_service(
        &self,
        service: &str,
        params: Value,
        target_entity: Option<&str>,
    ) -> HostResult<Value>;

    /// Current state of an entity, or `None` if the entity is unknown.
    async fn get_state(&self, entity_id: &str) -> HostResult<Option<String>>;

    /// Subscribe to state changes for the given entities. The stream
    /// may deliver changes for other entities too; callers filter.
    /// Dropping the receiver unsubscribes.
    fn subscribe_state_changes(&self, entity_ids: &[String]) -> broadcast::Receiver<StateChange>;
}
