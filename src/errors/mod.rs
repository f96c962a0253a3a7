mod client_error;
mod config_error;
mod mcp_error;
mod startup_error;
mod tool_error;

pub use client_error::ClientError;
pub use config_error::ConfigError;
pub use mcp_error::{ErrorCode, McpError};
pub use startup_error::StartupError;
pub use tool_error::{ToolError, ToolErrorCode};
