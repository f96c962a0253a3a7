use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorCode {
    UnknownTool,
    WriteDisabled,
    ConfirmationRequired,
    ValidationError,
    FilePathRequired,
    FileNotFound,
    FileNotReadable,
    FileNotRegular,
    UnsupportedFileType,
    ApiError,
    RequestFailed,
    MissingGeneratedOperation,
}

impl ToolErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolErrorCode::UnknownTool => "unknown_tool",
            ToolErrorCode::WriteDisabled => "write_disabled",
            ToolErrorCode::ConfirmationRequired => "confirmation_required",
            ToolErrorCode::ValidationError => "validation_error",
            ToolErrorCode::FilePathRequired => "file_path_required",
            ToolErrorCode::FileNotFound => "file_not_found",
            ToolErrorCode::FileNotReadable => "file_not_readable",
            ToolErrorCode::FileNotRegular => "file_not_regular",
            ToolErrorCode::UnsupportedFileType => "unsupported_file_type",
            ToolErrorCode::ApiError => "api_error",
            ToolErrorCode::RequestFailed => "request_failed",
            ToolErrorCode::MissingGeneratedOperation => "missing_generated_operation",
        }
    }
}

impl fmt::Display for ToolErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error payload of a failed [`crate::mcp::envelope::ToolEnvelope`].
#[derive(Debug, Clone, Serialize)]
pub struct ToolError {
    pub code: ToolErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(rename = "agentHint", skip_serializing_if = "Option::is_none")]
    pub agent_hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ToolError {
    pub fn new(code: ToolErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            hint: None,
            agent_hint: None,
            details: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_agent_hint(mut self, hint: impl Into<String>) -> Self {
        self.agent_hint = Some(hint.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn unknown_tool(message: impl Into<String>) -> Self {
        Self::new(ToolErrorCode::UnknownTool, message)
    }

    pub fn write_disabled(message: impl Into<String>) -> Self {
        Self::new(ToolErrorCode::WriteDisabled, message)
    }

    pub fn confirmation_required(message: impl Into<String>) -> Self {
        Self::new(ToolErrorCode::ConfirmationRequired, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ToolErrorCode::ValidationError, message)
    }

    pub fn api_error(message: impl Into<String>) -> Self {
        Self::new(ToolErrorCode::ApiError, message)
    }

    pub fn request_failed(message: impl Into<String>) -> Self {
        Self::new(ToolErrorCode::RequestFailed, message)
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl Error for ToolError {}
