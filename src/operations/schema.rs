use super::{BodyKind, OperationCatalog, OperationDescriptor, PrimitiveKind};
use crate::constants::uploads::{FILE_PATH_ARG, MIME_TYPE_ARG};
use crate::errors::{ConfigError, ToolError};
use jsonschema::JSONSchema;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

const MAX_REPORTED_VIOLATIONS: usize = 10;

fn schema_for_kind(kind: PrimitiveKind, item_kind: Option<PrimitiveKind>) -> Value {
    match kind {
        PrimitiveKind::String => json!({ "type": "string" }),
        PrimitiveKind::Number => json!({ "type": "number" }),
        PrimitiveKind::Integer => json!({ "type": "integer" }),
        PrimitiveKind::Boolean => json!({ "type": "boolean" }),
        PrimitiveKind::Array => match item_kind {
            None | Some(PrimitiveKind::Unknown) => json!({ "type": "array" }),
            Some(item) => json!({ "type": "array", "items": schema_for_kind(item, None) }),
        },
        PrimitiveKind::Object => json!({ "type": "object" }),
        PrimitiveKind::Unknown => json!({}),
    }
}

fn describe(mut schema: Value, description: Option<&str>) -> Value {
    if let (Some(text), Value::Object(map)) = (description, &mut schema) {
        map.insert("description".to_string(), Value::String(text.to_string()));
    }
    schema
}

/// JSON Schema advertised in `tools/list` and enforced before invocation.
///
/// Unknown argument keys are allowed; the engine ignores them.
pub fn build_input_schema(operation: &OperationDescriptor) -> Value {
    let mut properties = Map::new();
    let mut required: Vec<String> = Vec::new();

    for parameter in &operation.parameters {
        let mut schema = schema_for_kind(parameter.kind, parameter.item_kind);
        if let (Some(values), Value::Object(map)) = (&parameter.enum_values, &mut schema) {
            if parameter.kind == PrimitiveKind::String && !values.is_empty() {
                map.insert("enum".to_string(), json!(values));
            }
        }
        properties.insert(
            parameter.name.clone(),
            describe(schema, parameter.description.as_deref()),
        );
        if parameter.required {
            required.push(parameter.name.clone());
        }
    }

    if let Some(body) = &operation.request_body {
        match body.kind {
            BodyKind::Multipart => {
                if body.file_field_name.is_some() {
                    properties.insert(
                        FILE_PATH_ARG.to_string(),
                        json!({
                            "type": "string",
                            "description": "Local file path for multipart upload.",
                        }),
                    );
                    properties.insert(
                        MIME_TYPE_ARG.to_string(),
                        json!({
                            "type": "string",
                            "description": "Optional MIME type for multipart upload.",
                        }),
                    );
                    required.push(FILE_PATH_ARG.to_string());
                }
                for field in &body.fields {
                    if Some(field.name.as_str()) == body.file_field_name.as_deref() {
                        continue;
                    }
                    properties.insert(
                        field.name.clone(),
                        describe(schema_for_kind(field.kind, None), field.description.as_deref()),
                    );
                    if field.required {
                        required.push(field.name.clone());
                    }
                }
            }
            BodyKind::Json | BodyKind::Raw => {
                properties.insert(
                    "body".to_string(),
                    json!({
                        "type": "object",
                        "description": format!("Request body for {}.", body.content_type),
                    }),
                );
                if body.required {
                    required.push("body".to_string());
                }
            }
        }
    }

    if operation.is_mutation {
        properties.insert(
            "confirm".to_string(),
            json!({
                "type": "boolean",
                "description": "Must be true to execute mutation when safe mode is enabled.",
            }),
        );
    }

    let mut schema = json!({
        "type": "object",
        "properties": Value::Object(properties),
    });
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    schema
}

/// Compiled argument validators, one per catalog tool.
pub struct ArgumentValidator {
    validators: HashMap<String, JSONSchema>,
}

impl ArgumentValidator {
    /// Fails when any tool's schema does not compile; a tool never runs unvalidated.
    pub fn for_catalog(catalog: &OperationCatalog) -> Result<Self, ConfigError> {
        let mut validators = HashMap::new();
        for operation in catalog.iter() {
            let compiled = JSONSchema::compile(&build_input_schema(operation)).map_err(|err| {
                ConfigError::InvalidCatalog(format!(
                    "{}: input schema does not compile: {}",
                    operation.tool_name, err
                ))
            })?;
            validators.insert(operation.tool_name.clone(), compiled);
        }
        Ok(Self { validators })
    }

    pub fn covers(&self, tool_name: &str) -> bool {
        self.validators.contains_key(tool_name)
    }

    /// `Ok` for unknown tools: existence is the engine's check.
    pub fn validate(&self, tool_name: &str, args: &Value) -> Result<(), ToolError> {
        let Some(schema) = self.validators.get(tool_name) else {
            return Ok(());
        };
        let violations: Vec<String> = match schema.validate(args) {
            Ok(()) => return Ok(()),
            Err(errors) => errors
                .take(MAX_REPORTED_VIOLATIONS)
                .map(|err| {
                    let path = err.instance_path.to_string();
                    let path = if path.is_empty() {
                        "(root)".to_string()
                    } else {
                        path
                    };
                    format!("{}: {}", path, err)
                })
                .collect(),
        };
        Err(ToolError::validation(format!(
            "Invalid arguments for {}: {}",
            tool_name,
            violations.join("; ")
        ))
        .with_hint("Check the tool input schema and retry with corrected arguments.")
        .with_details(json!({
            "toolName": tool_name,
            "violations": violations,
        })))
    }
}

impl std::fmt::Debug for ArgumentValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArgumentValidator")
            .field("tools", &self.validators.len())
            .finish()
    }
}
