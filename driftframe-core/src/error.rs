use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("host RPC failed: {0}")]
    Rpc(String),

    #[error("media index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("filters matched no media: {0}")]
    FiltersTooRestrictive(String),

    #[error("mutation rejected by the index: {0}")]
    Mutation(String),

    #[error("no media available")]
    NoMediaAvailable,

    #[error("configuration error: {0}")]
    Config(#[from] driftframe_config::ConfigError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
