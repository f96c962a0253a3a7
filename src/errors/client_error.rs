use thiserror::Error;

/// Failures below the envelope boundary: OAuth, transport and response decoding.
///
/// Upstream non-2xx responses are not errors at this layer; they come back as
/// `VantaResponse` values. `Clone` is required because a single in-flight token
/// fetch is shared by every waiter.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("OAuth token request failed ({status} {reason}): {body}")]
    TokenRejected {
        status: u16,
        reason: String,
        body: String,
    },

    #[error("OAuth token request failed after {attempts} attempts (last status {status})")]
    TokenRetriesExhausted { attempts: usize, status: u16 },

    #[error("OAuth response did not include a valid {field}.")]
    InvalidTokenPayload { field: &'static str },

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("HTTP request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Failed to parse JSON response (status {status}): {reason}")]
    InvalidJson { status: u16, reason: String },

    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("Request retry policy exhausted without a response.")]
    RetryExhausted,
}

impl ClientError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            ClientError::Timeout { timeout_ms }
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}
