use crate::constants::{network, oauth, retry};
use crate::errors::ConfigError;
use crate::services::retry::RetryPolicy;
use crate::utils::flags::{parse_bool, parse_positive_u64, parse_tool_filter};
use crate::utils::user_paths::resolve_user_path;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use url::Url;

/// OAuth client credentials. The secret never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: Url,
    pub oauth_base_url: Url,
    pub oauth_scope: String,
    pub safe_mode: bool,
    pub write_enabled: bool,
    pub enabled_tools: HashSet<String>,
    pub credentials: Credentials,
    pub request_timeout_ms: u64,
    pub api_retry: RetryPolicy,
    pub oauth_retry: RetryPolicy,
    pub token_expiry_buffer_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. `from_env` passes the process
    /// environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_raw = lookup("VANTA_API_BASE_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| network::DEFAULT_API_BASE_URL.to_string());
        let api_base_url = parse_url("VANTA_API_BASE_URL", &api_raw)?;

        let oauth_base_url = match lookup("VANTA_OAUTH_BASE_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
        {
            Some(raw) => parse_url("VANTA_OAUTH_BASE_URL", &raw)?,
            None => parse_url(
                "VANTA_API_BASE_URL",
                &api_base_url.origin().ascii_serialization(),
            )?,
        };

        let oauth_scope = lookup("VANTA_OAUTH_SCOPE")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| oauth::DEFAULT_SCOPE.to_string());

        let safe_mode = parse_bool(lookup("VANTA_MCP_SAFE_MODE").as_deref(), true);
        let write_enabled = parse_bool(lookup("VANTA_MCP_ENABLE_WRITE").as_deref(), true);
        let enabled_tools = parse_tool_filter(lookup("VANTA_MCP_ENABLED_TOOLS").as_deref());

        let request_timeout_ms =
            parse_positive_u64(lookup("VANTA_MCP_REQUEST_TIMEOUT_MS").as_deref())
                .unwrap_or(network::TIMEOUT_API_REQUEST_MS);
        let max_retries = lookup("VANTA_MCP_MAX_RETRIES")
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .unwrap_or(retry::MAX_RETRIES);
        let base_delay_ms = lookup("VANTA_MCP_RETRY_BASE_DELAY_MS")
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .unwrap_or(retry::BASE_DELAY_MS);

        let credentials = load_credentials(&lookup)?;

        Ok(Self {
            api_base_url,
            oauth_base_url,
            oauth_scope,
            safe_mode,
            write_enabled,
            enabled_tools,
            credentials,
            request_timeout_ms,
            api_retry: RetryPolicy::new(max_retries, base_delay_ms, retry::STATUS_CODES),
            oauth_retry: RetryPolicy::new(max_retries, base_delay_ms, oauth::RETRY_STATUS_CODES),
            token_expiry_buffer_ms: oauth::EXPIRY_BUFFER_MS,
        })
    }

    pub fn token_url(&self) -> String {
        format!(
            "{}{}",
            self.oauth_base_url.as_str().trim_end_matches('/'),
            oauth::TOKEN_PATH
        )
    }
}

fn parse_url(variable: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let parsed = Url::parse(raw).map_err(|_| ConfigError::InvalidUrl {
        variable,
        value: raw.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            variable,
            value: raw.to_string(),
        });
    }
    Ok(parsed)
}

/// Credential resolution: the env pair wins, then `VANTA_ENV_FILE`.
pub fn load_credentials<F>(lookup: &F) -> Result<Credentials, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let client_id = lookup("VANTA_CLIENT_ID").filter(|v| !v.is_empty());
    let client_secret = lookup("VANTA_CLIENT_SECRET").filter(|v| !v.is_empty());
    match (client_id, client_secret) {
        (Some(client_id), Some(client_secret)) => {
            return Ok(Credentials {
                client_id,
                client_secret,
            })
        }
        (Some(_), None) => {
            return Err(ConfigError::PartialCredentials {
                present: "VANTA_CLIENT_ID",
                missing: "VANTA_CLIENT_SECRET",
            })
        }
        (None, Some(_)) => {
            return Err(ConfigError::PartialCredentials {
                present: "VANTA_CLIENT_SECRET",
                missing: "VANTA_CLIENT_ID",
            })
        }
        (None, None) => {}
    }

    match lookup("VANTA_ENV_FILE").filter(|v| !v.trim().is_empty()) {
        Some(raw) => read_credentials_file(&resolve_user_path(&raw)),
        None => Err(ConfigError::MissingCredentials),
    }
}

pub fn read_credentials_file(path: &Path) -> Result<Credentials, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::CredentialFileUnreadable {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    let trimmed = raw.trim_start_matches('\u{feff}').trim();
    if trimmed.starts_with('{') {
        return parse_json_credentials(trimmed, path);
    }
    parse_dotenv_credentials(trimmed, path)
}

fn parse_json_credentials(raw: &str, path: &Path) -> Result<Credentials, ConfigError> {
    let parsed: Value =
        serde_json::from_str(raw).map_err(|err| ConfigError::CredentialFileInvalidJson {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
    let field = |name: &'static str| -> Result<String, ConfigError> {
        parsed
            .get(name)
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .ok_or_else(|| ConfigError::CredentialFieldMissing {
                path: path.to_path_buf(),
                field: name,
            })
    };
    Ok(Credentials {
        client_id: field("client_id")?,
        client_secret: field("client_secret")?,
    })
}

fn unquote(raw: &str) -> &str {
    let trimmed = raw.trim();
    let quoted = trimmed.len() >= 2
        && ((trimmed.starts_with('"') && trimmed.ends_with('"'))
            || (trimmed.starts_with('\'') && trimmed.ends_with('\'')));
    if quoted {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}

fn parse_dotenv_credentials(raw: &str, path: &Path) -> Result<Credentials, ConfigError> {
    let mut client_id = None;
    let mut client_secret = None;
    let mut fallback_id = None;
    let mut fallback_secret = None;

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").map(str::trim).unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = unquote(value).to_string();
        match key {
            "VANTA_CLIENT_ID" => client_id = Some(value),
            "VANTA_CLIENT_SECRET" => client_secret = Some(value),
            "client_id" => fallback_id = Some(value),
            "client_secret" => fallback_secret = Some(value),
            _ => {}
        }
    }

    let client_id = client_id.or(fallback_id).filter(|v| !v.is_empty());
    let client_secret = client_secret.or(fallback_secret).filter(|v| !v.is_empty());
    match (client_id, client_secret) {
        (Some(client_id), Some(client_secret)) => Ok(Credentials {
            client_id,
            client_secret,
        }),
        _ => Err(ConfigError::CredentialFileIncomplete {
            path: PathBuf::from(path),
        }),
    }
}
