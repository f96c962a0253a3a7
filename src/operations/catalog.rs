use super::{ApiSource, BodyKind, OperationDescriptor};
use crate::errors::ConfigError;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

static BUILTIN: Lazy<Result<OperationCatalog, String>> = Lazy::new(|| {
    let raw = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/operations.json"));
    let descriptors: Vec<OperationDescriptor> =
        serde_json::from_str(raw).map_err(|err| format!("operations.json: {}", err))?;
    OperationCatalog::from_descriptors(descriptors).map_err(|err| err.to_string())
});

/// Name-indexed operation table.
#[derive(Debug, Clone)]
pub struct OperationCatalog {
    operations: Vec<OperationDescriptor>,
    by_name: HashMap<String, usize>,
}

impl OperationCatalog {
    /// The table compiled into the binary.
    pub fn builtin() -> Result<&'static OperationCatalog, ConfigError> {
        BUILTIN
            .as_ref()
            .map_err(|reason| ConfigError::InvalidCatalog(reason.clone()))
    }

    pub fn from_descriptors(operations: Vec<OperationDescriptor>) -> Result<Self, ConfigError> {
        let mut by_name = HashMap::new();
        for (index, operation) in operations.iter().enumerate() {
            check_descriptor(operation)?;
            if by_name.insert(operation.tool_name.clone(), index).is_some() {
                return Err(ConfigError::InvalidCatalog(format!(
                    "duplicate tool name '{}'",
                    operation.tool_name
                )));
            }
        }
        Ok(Self {
            operations,
            by_name,
        })
    }

    pub fn get(&self, tool_name: &str) -> Option<&OperationDescriptor> {
        self.by_name
            .get(tool_name)
            .and_then(|index| self.operations.get(*index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.operations.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.operations.iter().map(|op| op.tool_name.as_str())
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn mutation_count(&self) -> usize {
        self.operations.iter().filter(|op| op.is_mutation).count()
    }

    /// First tool generated from `operation_id`, optionally restricted to one source.
    pub fn tool_name_for(&self, operation_id: &str, source: Option<ApiSource>) -> Option<&str> {
        self.operations
            .iter()
            .find(|op| {
                op.operation_id == operation_id && source.map_or(true, |s| op.source == s)
            })
            .map(|op| op.tool_name.as_str())
    }
}

fn check_descriptor(operation: &OperationDescriptor) -> Result<(), ConfigError> {
    let invalid = |reason: String| {
        ConfigError::InvalidCatalog(format!("{}: {}", operation.tool_name, reason))
    };

    if operation.tool_name.trim().is_empty() {
        return Err(ConfigError::InvalidCatalog(format!(
            "operation {} has an empty tool name",
            operation.operation_id
        )));
    }

    let declared: HashSet<&str> = operation
        .path_parameters()
        .map(|p| p.name.as_str())
        .collect();
    for placeholder in operation.path_placeholders() {
        if !declared.contains(placeholder) {
            return Err(invalid(format!(
                "path placeholder '{{{}}}' has no matching path parameter",
                placeholder
            )));
        }
    }

    if let Some(body) = &operation.request_body {
        if let Some(file_field) = body.file_field_name.as_deref() {
            if body.kind != BodyKind::Multipart {
                return Err(invalid(format!(
                    "file field '{}' declared on a non-multipart body",
                    file_field
                )));
            }
            if !body.fields.iter().any(|field| field.name == file_field) {
                return Err(invalid(format!(
                    "file field '{}' is not among the body fields",
                    file_field
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(value: serde_json::Value) -> OperationDescriptor {
        serde_json::from_value(value).unwrap()
    }

    fn list_controls() -> serde_json::Value {
        json!({
            "toolName": "list_controls",
            "source": "manage",
            "method": "get",
            "path": "/controls",
            "operationId": "ListControls",
            "description": "List controls.",
            "isMutation": false,
            "parameters": []
        })
    }

    #[test]
    fn builtin_catalog_loads_and_indexes_every_tool() {
        let catalog = OperationCatalog::builtin().expect("builtin catalog");
        assert!(!catalog.is_empty());
        for name in catalog.names() {
            assert_eq!(catalog.get(name).map(|op| op.tool_name.as_str()), Some(name));
        }
        assert!(catalog.get("create_custom_control").unwrap().is_mutation);
        assert_eq!(
            catalog
                .get("upload_file_for_document")
                .and_then(|op| op.file_field()),
            Some("file")
        );
    }

    #[test]
    fn tool_name_lookup_by_operation_id_respects_source() {
        let catalog = OperationCatalog::builtin().unwrap();
        assert_eq!(
            catalog.tool_name_for("ListControls", None),
            Some("list_controls")
        );
        assert_eq!(
            catalog.tool_name_for("ListControls", Some(ApiSource::Audit)),
            None
        );
        assert_eq!(catalog.tool_name_for("NoSuchOperation", None), None);
    }

    #[test]
    fn duplicate_tool_names_are_rejected() {
        let err = OperationCatalog::from_descriptors(vec![
            descriptor(list_controls()),
            descriptor(list_controls()),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("duplicate tool name"));
    }

    #[test]
    fn undeclared_path_placeholder_is_rejected() {
        let mut raw = list_controls();
        raw["path"] = json!("/controls/{controlId}");
        let err = OperationCatalog::from_descriptors(vec![descriptor(raw)]).unwrap_err();
        assert!(err.to_string().contains("controlId"));
    }

    #[test]
    fn file_field_outside_body_fields_is_rejected() {
        let mut raw = list_controls();
        raw["requestBody"] = json!({
            "required": true,
            "contentType": "multipart/form-data",
            "kind": "multipart",
            "fields": [{ "name": "description", "kind": "string" }],
            "fileFieldName": "file"
        });
        let err = OperationCatalog::from_descriptors(vec![descriptor(raw)]).unwrap_err();
        assert!(err.to_string().contains("file field 'file'"));
    }
}
