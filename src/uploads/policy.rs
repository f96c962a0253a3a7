use crate::constants::uploads::{DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_ALLOWED_MIME_TYPES};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Extension and MIME allow-lists for one upload tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub allowed_extensions: Vec<String>,
    pub allowed_mime_types: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            allowed_mime_types: DEFAULT_ALLOWED_MIME_TYPES
                .iter()
                .map(|mime| mime.to_string())
                .collect(),
        }
    }
}

impl UploadPolicy {
    pub fn allows_extension(&self, extension: &str) -> bool {
        self.allowed_extensions.iter().any(|ext| ext == extension)
    }

    pub fn allows_mime(&self, mime: &str) -> bool {
        self.allowed_mime_types
            .iter()
            .any(|pattern| mime_matches(mime, pattern))
    }
}

static POLICIES: Lazy<HashMap<&'static str, UploadPolicy>> = Lazy::new(|| {
    [
        "create_file_questionnaire",
        "upload_file_for_document",
        "create_trust_center_resource",
        "upload_document_to_vendor",
        "upload_document_for_security_review",
    ]
    .into_iter()
    .map(|tool| (tool, UploadPolicy::default()))
    .collect()
});

pub fn policy_for_tool(tool_name: &str) -> UploadPolicy {
    POLICIES.get(tool_name).cloned().unwrap_or_default()
}

/// `image/*` matches by major type; anything else must be equal.
pub fn mime_matches(value: &str, pattern: &str) -> bool {
    let pattern = pattern.to_lowercase();
    match pattern.strip_suffix('*') {
        Some(prefix) if prefix.ends_with('/') => value.starts_with(prefix),
        _ => value == pattern,
    }
}
