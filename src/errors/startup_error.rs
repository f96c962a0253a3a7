use super::{ClientError, ConfigError};
use thiserror::Error;

/// Anything that stops the server before it serves its first request.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to authenticate with Vanta: {0}")]
    Auth(#[from] ClientError),

    #[error("stdio transport failed: {0}")]
    Io(#[from] std::io::Error),
}
