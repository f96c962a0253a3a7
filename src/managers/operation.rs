use crate::errors::{ToolError, ToolErrorCode};
use crate::mcp::envelope::ToolEnvelope;
use crate::operations::{ApiSource, BodyKind, OperationCatalog, OperationDescriptor};
use crate::services::logger::Logger;
use crate::services::tool_executor::ToolHandler;
use crate::services::vanta_client::{ApiTransport, MultipartPayload, VantaRequest};
use crate::uploads::{read_upload_bytes, validate_upload_file_input};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;

const CONFIRM_ARG: &str = "confirm";
const REQUEST_FAILED_HINT: &str = "Verify credentials, scopes, and payload.";

/// Process-wide write gates, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetySettings {
    pub safe_mode: bool,
    pub write_enabled: bool,
}

impl Default for SafetySettings {
    fn default() -> Self {
        Self {
            safe_mode: true,
            write_enabled: true,
        }
    }
}

/// The invocation engine. Every generated tool call passes through
/// [`OperationManager::invoke_operation`]; nothing it does escapes as an `Err`.
pub struct OperationManager {
    logger: Logger,
    catalog: Arc<OperationCatalog>,
    transport: Arc<dyn ApiTransport>,
    safety: SafetySettings,
}

impl OperationManager {
    pub fn new(
        logger: Logger,
        catalog: Arc<OperationCatalog>,
        transport: Arc<dyn ApiTransport>,
        safety: SafetySettings,
    ) -> Self {
        Self {
            logger: logger.child("engine"),
            catalog,
            transport,
            safety,
        }
    }

    pub async fn invoke_by_operation_id(
        &self,
        operation_id: &str,
        source: Option<ApiSource>,
        args: &Value,
    ) -> ToolEnvelope {
        let Some(tool_name) = self.catalog.tool_name_for(operation_id, source) else {
            let scope = source
                .map(|s| format!(" in the {} API", s))
                .unwrap_or_default();
            return ToolEnvelope::error(
                ToolError::new(
                    ToolErrorCode::MissingGeneratedOperation,
                    format!("No generated operation for operationId {}{}.", operation_id, scope),
                )
                .with_details(json!({
                    "operationId": operation_id,
                    "source": source.map(|s| s.as_str()),
                })),
            );
        };
        let tool_name = tool_name.to_string();
        self.invoke_operation(&tool_name, args).await
    }

    pub async fn invoke_operation(&self, tool_name: &str, args: &Value) -> ToolEnvelope {
        let empty = Map::new();
        let args_map = args.as_object().unwrap_or(&empty);

        let Some(operation) = self.catalog.get(tool_name) else {
            return ToolEnvelope::error(ToolError::unknown_tool(format!(
                "Unknown generated operation tool: {}",
                tool_name
            )));
        };

        if let Err(blocked) = self.check_gates(operation, args_map) {
            self.logger.info(
                "blocked",
                "Mutation blocked before dispatch",
                Some(&json!({ "tool": tool_name, "code": blocked.code.as_str() })),
            );
            return ToolEnvelope::error(blocked);
        }

        let request = match self.build_request(operation, args_map, args).await {
            Ok(request) => request,
            Err(err) => return ToolEnvelope::error(err),
        };

        self.dispatch(operation, request).await
    }

    fn check_gates(
        &self,
        operation: &OperationDescriptor,
        args: &Map<String, Value>,
    ) -> Result<(), ToolError> {
        if !operation.is_mutation {
            return Ok(());
        }
        if !self.safety.write_enabled {
            return Err(ToolError::write_disabled(
                "Mutating operations are disabled by VANTA_MCP_ENABLE_WRITE=false.",
            ));
        }
        let confirmed = args.get(CONFIRM_ARG).and_then(|v| v.as_bool()) == Some(true);
        if self.safety.safe_mode && !confirmed {
            let mut intent = args.clone();
            intent.remove(CONFIRM_ARG);
            return Err(ToolError::confirmation_required(format!(
                "Tool {} is mutating and requires confirm=true in safe mode.",
                operation.tool_name
            ))
            .with_hint("Set confirm=true to execute this operation.")
            .with_details(json!({
                "toolName": operation.tool_name,
                "method": operation.method.as_str(),
                "path": operation.path,
                "intent": Value::Object(intent),
            })));
        }
        Ok(())
    }

    async fn build_request(
        &self,
        operation: &OperationDescriptor,
        args_map: &Map<String, Value>,
        args: &Value,
    ) -> Result<VantaRequest, ToolError> {
        let path = expand_path(&operation.path, args_map).map_err(|err| {
            ToolError::request_failed(err).with_hint(REQUEST_FAILED_HINT)
        })?;
        let mut request = VantaRequest::new(operation.method.to_reqwest(), path);
        request.query = extract_query(operation, args_map);

        let Some(body) = &operation.request_body else {
            return Ok(request);
        };
        match body.kind {
            BodyKind::Multipart => {
                let mut form = MultipartPayload::new();
                if let Some(file_field) = body.file_field_name.as_deref() {
                    let file = validate_upload_file_input(&operation.tool_name, args).await?;
                    let bytes = read_upload_bytes(&file).await?;
                    form.file(file_field, file.file_name(), file.mime_type(), bytes);
                }
                for field in &body.fields {
                    if Some(field.name.as_str()) == body.file_field_name.as_deref() {
                        continue;
                    }
                    if let Some(value) = multipart_text(args_map.get(&field.name)) {
                        form.text(field.name.clone(), value);
                    }
                }
                request.form = Some(form);
            }
            BodyKind::Json | BodyKind::Raw => {
                request.body = args_map.get("body").cloned();
            }
        }
        Ok(request)
    }

    async fn dispatch(&self, operation: &OperationDescriptor, request: VantaRequest) -> ToolEnvelope {
        let started = Instant::now();
        let summary = format!("{} {}", operation.method.as_str(), operation.path);
        match self.transport.request(request).await {
            Ok(response) if response.ok => {
                self.logger.debug(
                    "success",
                    &summary,
                    Some(&json!({
                        "tool": operation.tool_name,
                        "status": response.status,
                        "duration_ms": started.elapsed().as_millis() as u64,
                    })),
                );
                let envelope = ToolEnvelope::success(response.data, summary);
                if operation.is_mutation && !self.safety.safe_mode {
                    return envelope.with_note("Safe mode is off; mutation executed without a confirmation gate.");
                }
                envelope
            }
            Ok(response) => {
                self.logger.warn(
                    "api_error",
                    &summary,
                    Some(&json!({ "tool": operation.tool_name, "status": response.status })),
                );
                let mut error = ToolError::api_error(format!(
                    "Vanta API request failed with status {}.",
                    response.status
                ));
                if !response.data.is_null() {
                    error = error.with_details(response.data);
                }
                ToolEnvelope::error(error)
            }
            Err(err) => {
                self.logger.error(
                    "request_failed",
                    &summary,
                    Some(&json!({ "tool": operation.tool_name, "error": err.to_string() })),
                );
                ToolEnvelope::error(
                    ToolError::request_failed(err.to_string()).with_hint(REQUEST_FAILED_HINT),
                )
            }
        }
    }
}

#[async_trait]
impl ToolHandler for OperationManager {
    async fn handle(&self, tool_name: &str, args: Value) -> ToolEnvelope {
        self.invoke_operation(tool_name, &args).await
    }
}

/// Percent-encodes one path segment. Reversible for any UTF-8 input.
pub fn encode_path_segment(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

fn path_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Substitutes every `{name}` placeholder with the encoded argument.
pub fn expand_path(template: &str, args: &Map<String, Value>) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start + 1..].find('}') else {
            break;
        };
        let key = &rest[start + 1..start + 1 + len];
        let value = args
            .get(key)
            .and_then(path_value)
            .ok_or_else(|| format!("Missing required path parameter: {}", key))?;
        out.push_str(&rest[..start]);
        out.push_str(&encode_path_segment(&value));
        rest = &rest[start + len + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn extract_query(operation: &OperationDescriptor, args: &Map<String, Value>) -> Map<String, Value> {
    operation
        .query_parameters()
        .filter_map(|param| {
            args.get(&param.name)
                .filter(|value| !value.is_null())
                .map(|value| (param.name.clone(), value.clone()))
        })
        .collect()
}

fn multipart_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
