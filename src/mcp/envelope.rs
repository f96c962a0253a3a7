use crate::errors::{ToolError, ToolErrorCode};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{json, Value};

const HINT_CONFIRMATION: &str =
    "Run read->plan first, then execute with confirm=true once the intent is verified.";
const HINT_WRITE_DISABLED: &str =
    "Writes are disabled. Enable VANTA_MCP_ENABLE_WRITE=true or switch to planning-only workflow mode.";
const HINT_REQUEST_FAILED: &str = "Check credentials/network, then retry.";
const HINT_RATE_LIMITED: &str =
    "Rate limited. Retry with backoff and prioritize read/plan calls.";
const HINT_API_ERROR: &str = "Inspect error.details and adjust the request before retrying.";
const HINT_VALIDATION: &str = "Fix required arguments using tool schema, then retry.";
const HINT_UNKNOWN_TOOL: &str = "Discover valid tools via tools/list, then retry with an exact name.";

/// Sole result contract of the engine: success with data, or a structured error.
#[derive(Debug, Clone)]
pub enum ToolEnvelope {
    Success {
        data: Value,
        message: Option<String>,
        notes: Vec<String>,
    },
    Error {
        error: ToolError,
        notes: Vec<String>,
    },
}

impl ToolEnvelope {
    pub fn success(data: Value, message: impl Into<String>) -> Self {
        ToolEnvelope::Success {
            data,
            message: Some(message.into()),
            notes: Vec::new(),
        }
    }

    /// Wraps an error, deriving `agentHint` when the error has none.
    pub fn error(mut error: ToolError) -> Self {
        if error.agent_hint.is_none() {
            error.agent_hint =
                derive_agent_hint(error.code, &error.message, error.details.as_ref())
                    .map(str::to_string);
        }
        ToolEnvelope::Error {
            error,
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        match &mut self {
            ToolEnvelope::Success { notes, .. } | ToolEnvelope::Error { notes, .. } => {
                notes.push(note.into())
            }
        }
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolEnvelope::Success { .. })
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            ToolEnvelope::Success { data, .. } => Some(data),
            ToolEnvelope::Error { .. } => None,
        }
    }

    pub fn error_ref(&self) -> Option<&ToolError> {
        match self {
            ToolEnvelope::Success { .. } => None,
            ToolEnvelope::Error { error, .. } => Some(error),
        }
    }

    pub fn error_code(&self) -> Option<ToolErrorCode> {
        self.error_ref().map(|err| err.code)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({ "success": self.is_success() }))
    }

    /// MCP `tools/call` result: the pretty-printed envelope as one text block.
    pub fn to_tool_result(&self) -> Value {
        let text = serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string());
        json!({
            "content": [ { "type": "text", "text": text } ],
            "isError": !self.is_success(),
        })
    }
}

impl From<ToolError> for ToolEnvelope {
    fn from(error: ToolError) -> Self {
        ToolEnvelope::error(error)
    }
}

impl Serialize for ToolEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match self {
            ToolEnvelope::Success {
                data,
                message,
                notes,
            } => {
                map.serialize_entry("success", &true)?;
                map.serialize_entry("data", data)?;
                if let Some(message) = message {
                    map.serialize_entry("message", message)?;
                }
                if !notes.is_empty() {
                    map.serialize_entry("notes", notes)?;
                }
            }
            ToolEnvelope::Error { error, notes } => {
                map.serialize_entry("success", &false)?;
                map.serialize_entry("error", error)?;
                if !notes.is_empty() {
                    map.serialize_entry("notes", notes)?;
                }
            }
        }
        map.end()
    }
}

/// Upstream error code from a body like `{"error": "rate_limit_exceeded"}`, or the
/// same thing as a JSON string.
fn api_error_code(details: Option<&Value>) -> Option<String> {
    let details = details?;
    let object = match details {
        Value::String(raw) => serde_json::from_str::<Value>(raw).ok()?,
        other => other.clone(),
    };
    object
        .get("error")
        .and_then(|v| v.as_str())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_lowercase())
}

/// Deterministic remediation text for an agent caller. Advisory only.
pub fn derive_agent_hint(
    code: ToolErrorCode,
    message: &str,
    details: Option<&Value>,
) -> Option<&'static str> {
    match code {
        ToolErrorCode::ConfirmationRequired => Some(HINT_CONFIRMATION),
        ToolErrorCode::WriteDisabled => Some(HINT_WRITE_DISABLED),
        ToolErrorCode::RequestFailed => Some(HINT_REQUEST_FAILED),
        ToolErrorCode::ApiError => {
            let rate_limited = api_error_code(details).as_deref() == Some("rate_limit_exceeded")
                || message.to_lowercase().contains("429");
            if rate_limited {
                Some(HINT_RATE_LIMITED)
            } else {
                Some(HINT_API_ERROR)
            }
        }
        ToolErrorCode::ValidationError => Some(HINT_VALIDATION),
        ToolErrorCode::UnknownTool | ToolErrorCode::MissingGeneratedOperation => {
            Some(HINT_UNKNOWN_TOOL)
        }
        _ => None,
    }
}
