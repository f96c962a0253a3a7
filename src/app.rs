use crate::config::Config;
use crate::errors::StartupError;
use crate::managers::operation::{OperationManager, SafetySettings};
use crate::operations::OperationCatalog;
use crate::services::logger::Logger;
use crate::services::token_manager::TokenManager;
use crate::services::tool_executor::{ToolExecutor, ToolHandler};
use crate::services::vanta_client::{ApiTransport, VantaClient};
use serde_json::json;
use std::sync::Arc;

/// Wired service graph. Built once per process.
pub struct App {
    pub logger: Logger,
    pub config: Config,
    pub catalog: Arc<OperationCatalog>,
    pub tokens: Option<Arc<TokenManager>>,
    pub operations: Arc<OperationManager>,
    pub tool_executor: Arc<ToolExecutor>,
}

impl App {
    pub fn initialize(config: Config) -> Result<Self, StartupError> {
        Self::initialize_with_logger(config, Logger::new("vanta-mcp"))
    }

    pub fn initialize_with_logger(config: Config, logger: Logger) -> Result<Self, StartupError> {
        let tokens = Arc::new(TokenManager::new(&config, logger.clone())?);
        let client: Arc<dyn ApiTransport> =
            Arc::new(VantaClient::new(&config, tokens.clone(), logger.clone())?);
        Self::assemble(config, logger, client, Some(tokens))
    }

    /// Same graph over a caller-supplied transport. No token manager is built.
    pub fn with_transport(
        config: Config,
        logger: Logger,
        transport: Arc<dyn ApiTransport>,
    ) -> Result<Self, StartupError> {
        Self::assemble(config, logger, transport, None)
    }

    fn assemble(
        config: Config,
        logger: Logger,
        transport: Arc<dyn ApiTransport>,
        tokens: Option<Arc<TokenManager>>,
    ) -> Result<Self, StartupError> {
        let catalog = Arc::new(OperationCatalog::builtin()?.clone());
        let safety = SafetySettings {
            safe_mode: config.safe_mode,
            write_enabled: config.write_enabled,
        };
        let operations = Arc::new(OperationManager::new(
            logger.clone(),
            catalog.clone(),
            transport,
            safety,
        ));
        let handler: Arc<dyn ToolHandler> = operations.clone();
        let tool_executor = Arc::new(ToolExecutor::new(
            logger.clone(),
            catalog.clone(),
            &config.enabled_tools,
            handler,
        )?);
        Ok(Self {
            logger,
            config,
            catalog,
            tokens,
            operations,
            tool_executor,
        })
    }

    /// Acquires the first token so bad credentials fail before serving.
    pub async fn prime(&self) -> Result<(), StartupError> {
        if let Some(tokens) = &self.tokens {
            tokens.initialize().await?;
        }
        let enabled = self.tool_executor.enabled_tool_names().len();
        self.logger.info(
            "startup",
            "Vanta MCP server ready",
            Some(&json!({
                "api_base_url": self.config.api_base_url.as_str(),
                "safe_mode": self.config.safe_mode,
                "write_enabled": self.config.write_enabled,
                "tools_registered": enabled,
                "tools_total": self.catalog.len(),
                "mutations_total": self.catalog.mutation_count(),
            })),
        );
        if !self.config.write_enabled {
            self.logger.warn(
                "write_disabled",
                "Mutating operations are disabled; write tools will be rejected",
                None,
            );
        }
        Ok(())
    }
}
