//! HTTP adapter for the dashboard host's RPC surface.
//!
//! One attempt per call; retry policy lives with the callers (the index
//! gateway backs off on transient failures, the scanner treats a failed
//! browse as a soft miss for that subtree).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use url::Url;

use super::{
    BrowseResult, HostError, HostGateway, HostResult, ResolvedMedia, StateChange,
};

#[derive(Debug, Clone)]
pub struct RestHostConfig {
    pub base_url: Url,
    pub token: String,
    /// Applied to every request; browse calls additionally race the
    /// scanner's own (longer) subtree timeout.
    pub request_timeout: Duration,
}

/// [`HostGateway`] over the host's HTTP API.
pub struct RestHost {
    client: reqwest::Client,
    cfg: RestHostConfig,
    state_tx: broadcast::Sender<StateChange>,
}

impl std::fmt::Debug for RestHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestHost")
            .field("base_url", &self.cfg.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl RestHost {
    pub fn new(cfg: RestHostConfig) -> HostResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .build()
            .map_err(|e| HostError::Transport(e.to_string()))?;
        let (state_tx, _) = broadcast::channel(64);
        Ok(Self {
            client,
            cfg,
            state_tx,
        })
    }

    /// Sink for pushed state events. The embedding application forwards
    /// the host's push channel (websocket, SSE, ...) into this sender;
    /// subscribers obtained from [`HostGateway::subscribe_state_changes`]
    /// receive whatever lands here.
    pub fn state_event_sink(&self) -> broadcast::Sender<StateChange> {
        self.state_tx.clone()
    }

    fn endpoint(&self, path: &str) -> HostResult<Url> {
        self.cfg
            .base_url
            .join(path)
            .map_err(|e| HostError::Rejected(format!("bad endpoint {path}: {e}")))
    }

    async fn post(&self, path: &str, body: Value) -> HostResult<Value> {
        let url = self.endpoint(path)?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.cfg.token)
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        decode_response(response).await
    }

    async fn get(&self, path: &str) -> HostResult<Value> {
        let url = self.endpoint(path)?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.cfg.token)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        decode_response(response).await
    }
}

fn map_reqwest_error(err: reqwest::Error) -> HostError {
    if err.is_timeout() {
        HostError::Timeout(Duration::from_secs(0))
    } else {
        HostError::Transport(err.to_string())
    }
}

async fn decode_response(response: reqwest::Response) -> HostResult<Value> {
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND
        || status == reqwest::StatusCode::NOT_IMPLEMENTED
    {
        return Err(HostError::Unsupported(status.to_string()));
    }
    if status.is_client_error() {
        let body = response.text().await.unwrap_or_default();
        return Err(HostError::Rejected(format!("{status}: {body}")));
    }
    if !status.is_success() {
        return Err(HostError::Transport(format!("unexpected status {status}")));
    }
    response
        .json()
        .await
        .map_err(|e| HostError::Transport(format!("invalid response body: {e}")))
}

#[async_trait]
impl HostGateway for RestHost {
    async fn browse(&self, folder_uri: &str) -> HostResult<BrowseResult> {
        let value = self
            .post("api/media/browse", json!({ "media_content_id": folder_uri }))
            .await?;
        serde_json::from_value(value)
            .map_err(|e| HostError::Transport(format!("malformed browse result: {e}")))
    }

    async fn resolve_playback_url(
        &self,
        media_id: &str,
        ttl: Duration,
    ) -> HostResult<ResolvedMedia> {
        let value = self
            .post(
                "api/media/resolve",
                json!({ "media_content_id": media_id, "expires": ttl.as_secs() }),
            )
            .await?;
        serde_json::from_value(value)
            .map_err(|e| HostError::Transport(format!("malformed resolve result: {e}")))
    }

    async fn call_index_service(
        &self,
        service: &str,
        params: Value,
        target_entity: Option<&str>,
    ) -> HostResult<Value> {
        let mut body = json!({ "data": params });
        if let Some(entity) = target_entity {
            body["target"] = json!({ "entity_id": entity });
        }
        self.post(&format!("api/services/media_index/{service}"), body)
            .await
    }

    async fn get_state(&self, entity_id: &str) -> HostResult<Option<String>> {
        match self.get(&format!("api/states/{entity_id}")).await {
            Ok(value) => Ok(value
                .get("state")
                .and_then(Value::as_str)
                .map(str::to_string)),
            Err(HostError::Rejected(_)) | Err(HostError::Unsupported(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn subscribe_state_changes(&self, _entity_ids: &[String]) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }
}
