use crate::app::App;
use crate::config::Config;
use crate::errors::{ErrorCode, McpError, StartupError};
use crate::mcp::catalog::list_tools;
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::mpsc;

const PROTOCOL_VERSION: &str = "2025-06-18";
const SERVER_NAME: &str = "vanta-mcp";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone)]
pub struct McpServer {
    app: Arc<App>,
}

impl McpServer {
    pub fn new(app: Arc<App>) -> Self {
        Self { app }
    }

    fn handle_initialize(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": { "name": SERVER_NAME, "version": SERVER_VERSION },
        })
    }

    fn handle_tools_list(&self) -> Value {
        let executor = &self.app.tool_executor;
        let tools = list_tools(&self.app.catalog, |name| executor.is_enabled(name));
        json!({ "tools": tools })
    }

    async fn handle_tools_call(&self, params: &Value) -> Result<Value, McpError> {
        let name = params
            .get("name")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .unwrap_or("");
        if name.is_empty() {
            return Err(McpError::new(ErrorCode::InvalidParams, "Missing tool name"));
        }
        let args = params.get("arguments").cloned().unwrap_or(Value::Null);
        if !(args.is_null() || args.is_object()) {
            return Err(McpError::new(
                ErrorCode::InvalidParams,
                "arguments: expected an object",
            ));
        }
        let envelope = self.app.tool_executor.execute(name, args).await;
        Ok(envelope.to_tool_result())
    }

    /// Handles one raw line. `None` means nothing goes back (notifications, blanks).
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        let parsed: Value = match serde_json::from_str(trimmed) {
            Ok(value) => value,
            Err(_) => {
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    ErrorCode::ParseError.as_i32(),
                    "Parse error".to_string(),
                ))
            }
        };

        let request: JsonRpcRequest = match serde_json::from_value(parsed) {
            Ok(req) => req,
            Err(_) => {
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    ErrorCode::InvalidRequest.as_i32(),
                    "Invalid request".to_string(),
                ))
            }
        };

        let id = request.id.clone();
        match request.method.as_str() {
            method if method.starts_with("notifications/") => {
                id.map(|id| JsonRpcResponse::success(id, json!({})))
            }
            "initialize" => id.map(|id| JsonRpcResponse::success(id, self.handle_initialize())),
            "ping" => id.map(|id| JsonRpcResponse::success(id, json!({}))),
            "tools/list" => id.map(|id| JsonRpcResponse::success(id, self.handle_tools_list())),
            "tools/call" => {
                let id = id?;
                Some(match self.handle_tools_call(&request.params).await {
                    Ok(result) => JsonRpcResponse::success(id, result),
                    Err(err) => JsonRpcResponse::from_error(id, err),
                })
            }
            _ => id.map(|id| {
                JsonRpcResponse::failure(
                    id,
                    ErrorCode::MethodNotFound.as_i32(),
                    "Method not found".to_string(),
                )
            }),
        }
    }

    /// Newline-delimited JSON-RPC until the reader closes.
    ///
    /// Each request runs on its own task so a slow tool call does not hold up the
    /// lines behind it; responses go out in completion order through one writer.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<(), StartupError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        let mut tx = Some(tx);
        let mut lines = reader.lines();
        let mut writer = writer;
        loop {
            tokio::select! {
                line = lines.next_line(), if tx.is_some() => match line? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => {
                        if let Some(sender) = tx.clone() {
                            let server = self.clone();
                            tokio::spawn(async move {
                                if let Some(response) = server.handle_line(&line).await {
                                    let _ = sender.send(response);
                                }
                            });
                        }
                    }
                    // Close our sender; the writer drains until the last task finishes.
                    None => tx = None,
                },
                response = rx.recv() => match response {
                    Some(response) => {
                        let payload = serde_json::to_string(&response).unwrap_or_default();
                        writer.write_all(payload.as_bytes()).await?;
                        writer.write_all(b"\n").await?;
                        writer.flush().await?;
                    }
                    None => break,
                },
            }
        }
        Ok(())
    }

    pub async fn run_stdio(&self) -> Result<(), StartupError> {
        let reader = BufReader::new(tokio::io::stdin());
        let writer = BufWriter::new(tokio::io::stdout());
        self.serve(reader, writer).await
    }
}

/// Process entry: wire the app, authenticate, then serve stdio.
pub async fn run_stdio(config: Config) -> Result<(), StartupError> {
    let app = App::initialize(config)?;
    if let Err(err) = app.prime().await {
        app.logger
            .fatal("startup_failed", &err.to_string(), None);
        return Err(err);
    }
    let server = McpServer::new(Arc::new(app));
    server.run_stdio().await
}
