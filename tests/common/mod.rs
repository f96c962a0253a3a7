#![allow(dead_code)]

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use vanta_mcp::config::Config;
use vanta_mcp::errors::ClientError;
use vanta_mcp::services::logger::{LogMode, Logger};
use vanta_mcp::services::vanta_client::{ApiTransport, VantaRequest, VantaResponse};

pub static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub fn tmp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{}-{}", prefix, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

pub fn write_file(dir: &std::path::Path, name: &str, contents: &[u8]) -> String {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write temp file");
    path.to_string_lossy().to_string()
}

pub fn quiet_logger() -> Logger {
    Logger::with_sink("test", LogMode::Quiet, Arc::new(|_: &str| {}))
}

/// Config over an explicit key map; nothing is read from the process environment.
pub fn test_config(base_url: &str, extra: &[(&str, &str)]) -> Config {
    let mut map: HashMap<String, String> = HashMap::from([
        ("VANTA_CLIENT_ID".to_string(), "test-client".to_string()),
        ("VANTA_CLIENT_SECRET".to_string(), "test-secret".to_string()),
        ("VANTA_API_BASE_URL".to_string(), base_url.to_string()),
        ("VANTA_MCP_RETRY_BASE_DELAY_MS".to_string(), "10".to_string()),
        ("VANTA_MCP_REQUEST_TIMEOUT_MS".to_string(), "5000".to_string()),
    ]);
    for (key, value) in extra {
        map.insert(key.to_string(), value.to_string());
    }
    Config::from_lookup(move |key| map.get(key).cloned()).expect("test config")
}

#[derive(Debug, Clone)]
pub struct FakeResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub delay: Option<Duration>,
}

impl FakeResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn raw_json(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    pub fn body_json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }
}

#[derive(Default)]
struct FakeState {
    routes: HashMap<(String, String), VecDeque<FakeResponse>>,
    oauth: VecDeque<FakeResponse>,
    issued_tokens: u64,
    oauth_delay: Option<Duration>,
    requests: Vec<RecordedRequest>,
}

const TOKEN_PATH: &str = "/oauth/token";

/// In-process Vanta stand-in. OAuth requests get rotating tokens (`token-1`,
/// `token-2`, ...) unless a scripted OAuth response is queued. API routes answer from
/// per-route queues; an empty queue yields 500 `missing_fake_response`.
pub struct FakeVanta {
    addr: std::net::SocketAddr,
    state: Arc<StdMutex<FakeState>>,
    handle: JoinHandle<()>,
}

impl FakeVanta {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake server");
        let addr = listener.local_addr().expect("local addr");
        let state = Arc::new(StdMutex::new(FakeState::default()));
        let accept_state = state.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let state = accept_state.clone();
                tokio::spawn(async move {
                    let _ = serve_connection(stream, state).await;
                });
            }
        });
        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn origin(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn base_url(&self) -> String {
        format!("{}/v1", self.origin())
    }

    pub fn enqueue(&self, method: &str, path: &str, response: FakeResponse) {
        let mut state = self.state.lock().unwrap();
        state
            .routes
            .entry((method.to_uppercase(), path.to_string()))
            .or_default()
            .push_back(response);
    }

    pub fn enqueue_oauth(&self, response: FakeResponse) {
        self.state.lock().unwrap().oauth.push_back(response);
    }

    pub fn set_oauth_delay(&self, delay: Duration) {
        self.state.lock().unwrap().oauth_delay = Some(delay);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn requests_to(&self, method: &str, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method.to_uppercase() && r.path == path)
            .collect()
    }

    pub fn calls(&self, method: &str, path: &str) -> usize {
        self.requests_to(method, path).len()
    }

    pub fn oauth_calls(&self) -> usize {
        self.calls("POST", TOKEN_PATH)
    }
}

impl Drop for FakeVanta {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn decode_chunked(mut raw: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    loop {
        let line_end = raw.windows(2).position(|w| w == b"\r\n")?;
        let size_line = std::str::from_utf8(&raw[..line_end]).ok()?;
        let size = usize::from_str_radix(size_line.split(';').next()?.trim(), 16).ok()?;
        raw = &raw[line_end + 2..];
        if size == 0 {
            return Some(out);
        }
        if raw.len() < size + 2 {
            return None;
        }
        out.extend_from_slice(&raw[..size]);
        raw = &raw[size + 2..];
    }
}

async fn read_request(stream: &mut TcpStream) -> std::io::Result<Option<RecordedRequest>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let header_end = loop {
        if let Some(end) = find_header_end(&buf) {
            break end;
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();
    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
        .collect();

    let mut body = buf[header_end + 4..].to_vec();
    let chunked = headers
        .get("transfer-encoding")
        .map(|v| v.to_lowercase().contains("chunked"))
        .unwrap_or(false);
    if chunked {
        loop {
            if body.ends_with(b"0\r\n\r\n") {
                if let Some(decoded) = decode_chunked(&body) {
                    body = decoded;
                    break;
                }
            }
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                body = decode_chunked(&body).unwrap_or_default();
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        }
    } else {
        let length = headers
            .get("content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);
        while body.len() < length {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        }
    }

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path.to_string(), query.to_string()),
        None => (target, String::new()),
    };
    Ok(Some(RecordedRequest {
        method,
        path,
        query,
        headers,
        body,
    }))
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    state: Arc<StdMutex<FakeState>>,
) -> std::io::Result<()> {
    let Some(request) = read_request(&mut stream).await? else {
        return Ok(());
    };

    let is_oauth = request.method == "POST" && request.path == TOKEN_PATH;
    let (response, delay) = {
        let mut state = state.lock().unwrap();
        state.requests.push(request.clone());
        if is_oauth {
            let scripted = state.oauth.pop_front();
            let response = scripted.unwrap_or_else(|| {
                state.issued_tokens += 1;
                FakeResponse::json(
                    200,
                    json!({
                        "access_token": format!("token-{}", state.issued_tokens),
                        "expires_in": 3600,
                        "token_type": "Bearer",
                    }),
                )
            });
            (response, state.oauth_delay)
        } else {
            let key = (request.method.clone(), request.path.clone());
            let response = state
                .routes
                .get_mut(&key)
                .and_then(|queue| queue.pop_front())
                .unwrap_or_else(|| {
                    FakeResponse::json(
                        500,
                        json!({ "error": "missing_fake_response", "path": request.path }),
                    )
                });
            (response, None)
        }
    };

    if let Some(delay) = response.delay.or(delay) {
        tokio::time::sleep(delay).await;
    }

    let mut head = format!(
        "HTTP/1.1 {} {}\r\ncontent-length: {}\r\nconnection: close\r\n",
        response.status,
        reason_phrase(response.status),
        response.body.len()
    );
    for (name, value) in &response.headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("\r\n");
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(response.body.as_bytes()).await?;
    stream.flush().await?;
    stream.shutdown().await?;
    Ok(())
}

/// `ApiTransport` double that records every request and answers from a script.
#[derive(Default)]
pub struct RecordingTransport {
    calls: StdMutex<Vec<VantaRequest>>,
    script: StdMutex<VecDeque<Result<VantaResponse, ClientError>>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, response: Result<VantaResponse, ClientError>) {
        self.script.lock().unwrap().push_back(response);
    }

    pub fn respond_json(&self, status: u16, data: Value) {
        self.respond(Ok(VantaResponse {
            status,
            ok: (200..300).contains(&status),
            data,
            headers: HashMap::new(),
        }));
    }

    pub fn calls(&self) -> Vec<VantaRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ApiTransport for RecordingTransport {
    async fn request(&self, request: VantaRequest) -> Result<VantaResponse, ClientError> {
        self.calls.lock().unwrap().push(request);
        self.script.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(VantaResponse {
                status: 200,
                ok: true,
                data: json!({ "echoed": true }),
                headers: HashMap::new(),
            })
        })
    }
}
