use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::constants::limits::SUGGESTION_LIMIT;
use crate::errors::{ConfigError, ToolError};
use crate::mcp::envelope::ToolEnvelope;
use crate::operations::schema::ArgumentValidator;
use crate::operations::OperationCatalog;
use crate::services::logger::Logger;
use crate::utils::suggest::did_you_mean;

use serde_json::{json, Value};

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, tool_name: &str, args: Value) -> ToolEnvelope;
}

/// Front door for `tools/call`: enabled-tool filter, argument schema, then the handler.
pub struct ToolExecutor {
    logger: Logger,
    catalog: Arc<OperationCatalog>,
    enabled: Option<HashSet<String>>,
    validator: ArgumentValidator,
    handler: Arc<dyn ToolHandler>,
}

impl ToolExecutor {
    /// `enabled` is a lowercase allow-list; empty means every catalog tool.
    pub fn new(
        logger: Logger,
        catalog: Arc<OperationCatalog>,
        enabled: &HashSet<String>,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<Self, ConfigError> {
        let validator = ArgumentValidator::for_catalog(&catalog)?;
        Ok(Self {
            logger: logger.child("executor"),
            catalog,
            enabled: if enabled.is_empty() {
                None
            } else {
                Some(enabled.clone())
            },
            validator,
            handler,
        })
    }

    pub fn is_enabled(&self, tool_name: &str) -> bool {
        match &self.enabled {
            None => true,
            Some(allowed) => allowed.contains(&tool_name.to_lowercase()),
        }
    }

    /// Catalog tools that pass the enabled filter, in catalog order.
    pub fn enabled_tool_names(&self) -> Vec<&str> {
        self.catalog
            .names()
            .filter(|name| self.is_enabled(name))
            .collect()
    }

    fn unknown_tool(&self, tool_name: &str) -> ToolError {
        let suggestions = did_you_mean(tool_name, self.enabled_tool_names(), SUGGESTION_LIMIT);
        let mut error = ToolError::unknown_tool(format!("Unknown tool: {}", tool_name));
        if !suggestions.is_empty() {
            error = error.with_hint(format!("Did you mean: {}?", suggestions.join(", ")));
        }
        error.with_details(json!({
            "toolName": tool_name,
            "suggestions": suggestions,
        }))
    }

    pub async fn execute(&self, tool_name: &str, args: Value) -> ToolEnvelope {
        let started = Instant::now();
        let args = if args.is_null() { json!({}) } else { args };

        if self.catalog.get(tool_name).is_none() || !self.is_enabled(tool_name) {
            self.logger.warn(
                "unknown_tool",
                "Call to an unknown or disabled tool",
                Some(&json!({ "tool": tool_name })),
            );
            return ToolEnvelope::error(self.unknown_tool(tool_name));
        }

        if let Err(err) = self.validator.validate(tool_name, &args) {
            self.logger.info(
                "invalid_args",
                &err.message,
                Some(&json!({ "tool": tool_name })),
            );
            return ToolEnvelope::error(err);
        }

        self.logger
            .debug("tool_call", "Invoking tool", Some(&json!({ "tool": tool_name })));
        let envelope = self.handler.handle(tool_name, args).await;
        self.logger.info(
            "tool_result",
            "Tool call finished",
            Some(&json!({
                "tool": tool_name,
                "success": envelope.is_success(),
                "code": envelope.error_code().map(|code| code.as_str()),
                "duration_ms": started.elapsed().as_millis() as u64,
            })),
        );
        envelope
    }
}
