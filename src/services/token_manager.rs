use crate::config::{Config, Credentials};
use crate::constants::{limits, network, oauth};
use crate::errors::ClientError;
use crate::services::logger::Logger;
use crate::services::retry::RetryPolicy;
use crate::utils::redact::{preview, redact_text};
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// A bearer token and the instant it stops being offered.
///
/// `expires_at` already has the safety buffer subtracted.
#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub token: String,
    pub expires_at: Instant,
}

impl TokenInfo {
    fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

type TokenFuture = Shared<BoxFuture<'static, Result<Arc<TokenInfo>, ClientError>>>;

struct InFlight {
    id: u64,
    future: TokenFuture,
}

#[derive(Default)]
struct TokenState {
    current: Option<Arc<TokenInfo>>,
    current_id: u64,
    in_flight: Option<InFlight>,
    next_id: u64,
}

fn lock(state: &Mutex<TokenState>) -> MutexGuard<'_, TokenState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct TokenFetcher {
    http: Client,
    token_url: String,
    credentials: Credentials,
    scope: String,
    retry: RetryPolicy,
    timeout_ms: u64,
    expiry_buffer: Duration,
    logger: Logger,
}

impl TokenFetcher {
    async fn fetch(&self) -> Result<TokenInfo, ClientError> {
        let body = json!({
            "client_id": self.credentials.client_id,
            "client_secret": self.credentials.client_secret,
            "grant_type": oauth::GRANT_TYPE,
            "scope": self.scope,
        });

        let mut attempt = 0usize;
        loop {
            let response = self
                .http
                .post(&self.token_url)
                .timeout(Duration::from_millis(self.timeout_ms))
                .json(&body)
                .send()
                .await
                .map_err(|err| ClientError::from_reqwest(err, self.timeout_ms))?;
            let status = response.status();

            if status.is_success() {
                let payload: Value = response
                    .json()
                    .await
                    .map_err(|err| ClientError::InvalidJson {
                        status: status.as_u16(),
                        reason: err.to_string(),
                    })?;
                let info = self.token_from_payload(&payload)?;
                self.logger.debug(
                    "token_fetched",
                    "OAuth token acquired",
                    Some(&json!({ "attempts": attempt + 1 })),
                );
                return Ok(info);
            }

            if self.retry.is_retryable(status.as_u16()) {
                if attempt < self.retry.max_retries {
                    let delay = self.retry.delay_for(attempt, Some(response.headers()));
                    self.logger.warn(
                        "token_retry",
                        "OAuth token endpoint returned a retryable status",
                        Some(&json!({
                            "status": status.as_u16(),
                            "attempt": attempt + 1,
                            "delay_ms": delay.as_millis() as u64,
                        })),
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                return Err(ClientError::TokenRetriesExhausted {
                    attempts: attempt + 1,
                    status: status.as_u16(),
                });
            }

            let reason = status.canonical_reason().unwrap_or("").to_string();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::TokenRejected {
                status: status.as_u16(),
                reason,
                body: preview(&redact_text(&body), limits::LOG_BODY_PREVIEW_BYTES),
            });
        }
    }

    fn token_from_payload(&self, payload: &Value) -> Result<TokenInfo, ClientError> {
        let token = payload
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or(ClientError::InvalidTokenPayload {
                field: "access_token",
            })?;
        let expires_in = payload
            .get("expires_in")
            .and_then(|v| v.as_f64())
            .ok_or(ClientError::InvalidTokenPayload {
                field: "expires_in",
            })?;
        let invalid = ClientError::InvalidTokenPayload {
            field: "expires_in",
        };
        let seconds = expires_in.clamp(0.0, oauth::MAX_TOKEN_LIFETIME_SECS as f64);
        let lifetime = Duration::try_from_secs_f64(seconds).map_err(|_| invalid.clone())?;
        let now = Instant::now();
        let expires_at = now
            .checked_add(lifetime)
            .ok_or(invalid)?
            .checked_sub(self.expiry_buffer)
            .unwrap_or(now);
        Ok(TokenInfo {
            token: token.to_string(),
            expires_at,
        })
    }
}

/// Client-credentials token cache with single-flight fetching.
///
/// Concurrent callers that find no fresh token share one OAuth request. A forced
/// refresh never joins an older fetch and discards the cached token first, so a token
/// the API has rejected is not offered again even if the refresh fails.
pub struct TokenManager {
    fetcher: Arc<TokenFetcher>,
    state: Arc<Mutex<TokenState>>,
    logger: Logger,
}

impl TokenManager {
    pub fn new(config: &Config, logger: Logger) -> Result<Self, ClientError> {
        let http = Client::builder()
            .user_agent(network::USER_AGENT)
            .build()
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        Ok(Self::with_client(config, http, logger))
    }

    pub fn with_client(config: &Config, http: Client, logger: Logger) -> Self {
        let logger = logger.child("token");
        let fetcher = TokenFetcher {
            http,
            token_url: config.token_url(),
            credentials: config.credentials.clone(),
            scope: config.oauth_scope.clone(),
            retry: config.oauth_retry.clone(),
            timeout_ms: config.request_timeout_ms,
            expiry_buffer: Duration::from_millis(config.token_expiry_buffer_ms),
            logger: logger.clone(),
        };
        Self {
            fetcher: Arc::new(fetcher),
            state: Arc::new(Mutex::new(TokenState::default())),
            logger,
        }
    }

    /// Fetches the first token so bad credentials fail at startup.
    pub async fn initialize(&self) -> Result<(), ClientError> {
        self.get_valid_token().await.map(|_| ())
    }

    pub async fn get_valid_token(&self) -> Result<String, ClientError> {
        if let Some(info) = self.cached() {
            return Ok(info.token.clone());
        }
        let info = self.fetch(false).await?;
        Ok(info.token.clone())
    }

    /// Unconditional refresh, used after the API answered 401.
    pub async fn refresh_token(&self) -> Result<String, ClientError> {
        self.logger
            .debug("token_refresh", "Forcing OAuth token refresh", None);
        let info = self.fetch(true).await?;
        Ok(info.token.clone())
    }

    fn cached(&self) -> Option<Arc<TokenInfo>> {
        let state = lock(&self.state);
        state.current.as_ref().filter(|info| info.is_fresh()).cloned()
    }

    async fn fetch(&self, force: bool) -> Result<Arc<TokenInfo>, ClientError> {
        let future = {
            let mut state = lock(&self.state);
            if force {
                state.in_flight = None;
                state.current = None;
            }
            match state.in_flight.as_ref() {
                Some(in_flight) => in_flight.future.clone(),
                None => {
                    state.next_id += 1;
                    let id = state.next_id;
                    let future = self.spawn_fetch(id);
                    state.in_flight = Some(InFlight {
                        id,
                        future: future.clone(),
                    });
                    future
                }
            }
        };
        future.await
    }

    fn spawn_fetch(&self, id: u64) -> TokenFuture {
        let fetcher = self.fetcher.clone();
        let state = self.state.clone();
        async move {
            let result = fetcher.fetch().await.map(Arc::new);
            let mut guard = lock(&state);
            if let Ok(info) = &result {
                if id >= guard.current_id {
                    guard.current = Some(info.clone());
                    guard.current_id = id;
                }
            }
            if guard.in_flight.as_ref().map(|f| f.id) == Some(id) {
                guard.in_flight = None;
            }
            result
        }
        .boxed()
        .shared()
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("token_url", &self.fetcher.token_url)
            .finish()
    }
}
