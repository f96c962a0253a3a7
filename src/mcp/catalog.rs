use crate::operations::schema::build_input_schema;
use crate::operations::{OperationCatalog, OperationDescriptor};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const WRITE_PREFIX: &str = "[WRITE] ";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolDef {
    pub fn from_operation(operation: &OperationDescriptor) -> Self {
        let mut description = operation.description.trim().to_string();
        if description.is_empty() {
            description = operation
                .summary
                .clone()
                .unwrap_or_else(|| format!("{} {}", operation.method, operation.path));
        }
        if operation.is_mutation {
            description = format!("{}{}", WRITE_PREFIX, description);
        }
        Self {
            name: operation.tool_name.clone(),
            description,
            input_schema: build_input_schema(operation),
        }
    }
}

/// `tools/list` payload for the tools accepted by `is_enabled`.
pub fn list_tools<F>(catalog: &OperationCatalog, is_enabled: F) -> Vec<ToolDef>
where
    F: Fn(&str) -> bool,
{
    catalog
        .iter()
        .filter(|op| is_enabled(&op.tool_name))
        .map(ToolDef::from_operation)
        .collect()
}
