//! CLI error types.

use chorus_config::ConfigError;
use chorus_mentions::{ExtractError, ProviderError};
use chorus_session::SessionError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Extract(#[from] ExtractError),

    #[error("{0}")]
    Session(#[from] SessionError),

    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("{0}")]
    Validation(String),
}
