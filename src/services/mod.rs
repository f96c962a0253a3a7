pub mod logger;
pub mod retry;
pub mod token_manager;
pub mod tool_executor;
pub mod vanta_client;
