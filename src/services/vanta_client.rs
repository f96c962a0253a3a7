use crate::config::Config;
use crate::constants::network;
use crate::errors::ClientError;
use crate::services::logger::Logger;
use crate::services::retry::RetryPolicy;
use crate::services::token_manager::TokenManager;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Response};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

#[derive(Debug, Clone)]
pub enum MultipartPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime_type: String,
        bytes: Bytes,
    },
}

/// Multipart body kept as plain data so it can be rebuilt for every retry attempt.
#[derive(Debug, Clone, Default)]
pub struct MultipartPayload {
    parts: Vec<MultipartPart>,
}

impl MultipartPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parts.push(MultipartPart::Text {
            name: name.into(),
            value: value.into(),
        });
    }

    pub fn file(
        &mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Bytes,
    ) {
        self.parts.push(MultipartPart::File {
            name: name.into(),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        });
    }

    pub fn parts(&self) -> &[MultipartPart] {
        &self.parts
    }

    fn to_form(&self) -> Result<Form, ClientError> {
        let mut form = Form::new();
        for part in &self.parts {
            form = match part {
                MultipartPart::Text { name, value } => form.text(name.clone(), value.clone()),
                MultipartPart::File {
                    name,
                    file_name,
                    mime_type,
                    bytes,
                } => {
                    let file_part = Part::bytes(bytes.to_vec())
                        .file_name(file_name.clone())
                        .mime_str(mime_type)
                        .map_err(|err| ClientError::Transport(err.to_string()))?;
                    form.part(name.clone(), file_part)
                }
            };
        }
        Ok(form)
    }
}

#[derive(Debug, Clone)]
pub struct VantaRequest {
    pub method: Method,
    pub path: String,
    pub query: Map<String, Value>,
    pub body: Option<Value>,
    pub form: Option<MultipartPayload>,
    pub headers: Vec<(String, String)>,
}

impl VantaRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Map::new(),
            body: None,
            form: None,
            headers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VantaResponse {
    pub status: u16,
    pub ok: bool,
    pub data: Value,
    pub headers: HashMap<String, String>,
}

/// Seam between the operation engine and HTTP. Tests substitute a recording fake.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn request(&self, request: VantaRequest) -> Result<VantaResponse, ClientError>;
}

pub struct VantaClient {
    http: Client,
    base_url: Url,
    tokens: Arc<TokenManager>,
    retry: RetryPolicy,
    timeout_ms: u64,
    logger: Logger,
}

impl VantaClient {
    pub fn new(
        config: &Config,
        tokens: Arc<TokenManager>,
        logger: Logger,
    ) -> Result<Self, ClientError> {
        let http = Client::builder()
            .user_agent(network::USER_AGENT)
            .build()
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        Ok(Self {
            http,
            base_url: config.api_base_url.clone(),
            tokens,
            retry: config.api_retry.clone(),
            timeout_ms: config.request_timeout_ms,
            logger: logger.child("http"),
        })
    }

    fn build_headers(
        &self,
        token: &str,
        json_body: bool,
        extra: &[(String, String)],
    ) -> Result<HeaderMap, ClientError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(
            HeaderName::from_static(network::CLIENT_ID_HEADER),
            HeaderValue::from_static("true"),
        );
        for (name, value) in extra {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| ClientError::Transport(err.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| ClientError::Transport(err.to_string()))?;
            headers.insert(name, value);
        }
        if json_body {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        Ok(headers)
    }

    async fn send_once(
        &self,
        request: &VantaRequest,
        url: &Url,
        token: &str,
    ) -> Result<Response, ClientError> {
        let json_body = request.form.is_none() && request.body.is_some();
        let headers = self.build_headers(token, json_body, &request.headers)?;
        let mut builder = self
            .http
            .request(request.method.clone(), url.clone())
            .headers(headers)
            .timeout(Duration::from_millis(self.timeout_ms));
        if let Some(form) = &request.form {
            builder = builder.multipart(form.to_form()?);
        } else if let Some(body) = &request.body {
            let payload = serde_json::to_vec(body)
                .map_err(|err| ClientError::Transport(err.to_string()))?;
            builder = builder.body(payload);
        }
        builder
            .send()
            .await
            .map_err(|err| ClientError::from_reqwest(err, self.timeout_ms))
    }
}

#[async_trait]
impl ApiTransport for VantaClient {
    async fn request(&self, request: VantaRequest) -> Result<VantaResponse, ClientError> {
        let url = build_url(&self.base_url, &request.path, &request.query)?;
        let started = Instant::now();
        let mut token = self.tokens.get_valid_token().await?;
        let mut attempt = 0usize;
        let mut refreshed = false;

        while attempt <= self.retry.max_retries {
            let response = self.send_once(&request, &url, &token).await?;
            let status = response.status().as_u16();

            if status == 401 && !refreshed {
                self.logger.info(
                    "reauthenticate",
                    "API answered 401, refreshing token",
                    Some(&json!({ "path": request.path })),
                );
                token = self.tokens.refresh_token().await?;
                refreshed = true;
                attempt += 1;
                continue;
            }

            if self.retry.is_retryable(status) && attempt < self.retry.max_retries {
                let delay = self.retry.delay_for(attempt, Some(response.headers()));
                self.logger.warn(
                    "retry",
                    "Retryable status from API",
                    Some(&json!({
                        "method": request.method.as_str(),
                        "path": request.path,
                        "status": status,
                        "attempt": attempt + 1,
                        "delay_ms": delay.as_millis() as u64,
                    })),
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let headers = collect_headers(response.headers());
            let ok = response.status().is_success();
            let data = read_payload(response).await?;
            self.logger.debug(
                "response",
                "API request completed",
                Some(&json!({
                    "method": request.method.as_str(),
                    "path": request.path,
                    "status": status,
                    "attempts": attempt + 1,
                    "duration_ms": started.elapsed().as_millis() as u64,
                })),
            );
            return Ok(VantaResponse {
                status,
                ok,
                data,
                headers,
            });
        }

        Err(ClientError::RetryExhausted)
    }
}

/// Joins `path` under `base` (keeping the base's own path) and appends query pairs.
/// Arrays repeat the key; nulls are skipped.
pub fn build_url(base: &Url, path: &str, query: &Map<String, Value>) -> Result<Url, ClientError> {
    let mut normalized_base = base.clone();
    if !normalized_base.path().ends_with('/') {
        let with_slash = format!("{}/", normalized_base.path());
        normalized_base.set_path(&with_slash);
    }
    let relative = path.trim_start_matches('/');
    let mut url = normalized_base
        .join(relative)
        .map_err(|err| ClientError::InvalidUrl(err.to_string()))?;

    let mut pairs: Vec<(String, String)> = Vec::new();
    for (key, value) in query {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    if !item.is_null() {
                        pairs.push((key.clone(), query_value(item)));
                    }
                }
            }
            other => pairs.push((key.clone(), query_value(other))),
        }
    }
    if !pairs.is_empty() {
        let mut serializer = url.query_pairs_mut();
        for (key, value) in &pairs {
            serializer.append_pair(key, value);
        }
    }
    Ok(url)
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn collect_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

async fn read_payload(response: Response) -> Result<Value, ClientError> {
    let status = response.status().as_u16();
    if status == 204 || status == 205 {
        return Ok(Value::Null);
    }
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_lowercase().contains("application/json"))
        .unwrap_or(false);
    let text = response
        .text()
        .await
        .map_err(|err| ClientError::Transport(err.to_string()))?;
    normalize_payload(status, is_json, &text)
}

pub(crate) fn normalize_payload(status: u16, is_json: bool, text: &str) -> Result<Value, ClientError> {
    if text.is_empty() {
        return Ok(Value::Null);
    }
    if is_json {
        return serde_json::from_str(text).map_err(|err| ClientError::InvalidJson {
            status,
            reason: err.to_string(),
        });
    }
    Ok(Value::String(text.to_string()))
}
