use std::path::PathBuf;
use thiserror::Error;

/// Startup failures. Any of these is fatal: the server refuses to start.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No Vanta API credentials found. Provide both VANTA_CLIENT_ID and VANTA_CLIENT_SECRET, or set VANTA_ENV_FILE to a JSON/dotenv credential file.")]
    MissingCredentials,

    #[error("{present} is set but {missing} is missing.")]
    PartialCredentials {
        present: &'static str,
        missing: &'static str,
    },

    #[error("Unable to read credential file {path}: {reason}")]
    CredentialFileUnreadable { path: PathBuf, reason: String },

    #[error("Credential file {path} contains invalid JSON: {reason}. Expected JSON with client_id/client_secret or dotenv key/value format.")]
    CredentialFileInvalidJson { path: PathBuf, reason: String },

    #[error("Credential file {path} is missing required property '{field}'.")]
    CredentialFieldMissing { path: PathBuf, field: &'static str },

    #[error("Credential file {path} must include VANTA_CLIENT_ID and VANTA_CLIENT_SECRET (or client_id/client_secret).")]
    CredentialFileIncomplete { path: PathBuf },

    #[error("Invalid URL in {variable}: {value}")]
    InvalidUrl { variable: &'static str, value: String },

    #[error("Operation catalog is invalid: {0}")]
    InvalidCatalog(String),
}
