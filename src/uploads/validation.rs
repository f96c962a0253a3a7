use super::policy::policy_for_tool;
use crate::constants::uploads::{FILE_PATH_ARG, MIME_TYPE_ARG};
use crate::errors::{ToolError, ToolErrorCode};
use crate::utils::user_paths::{file_extension_lower, resolve_user_path};
use serde_json::{json, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A local file that passed every upload check. Only [`validate_upload_file_input`]
/// can produce one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUploadFile {
    absolute_path: PathBuf,
    file_name: String,
    extension: String,
    mime_type: String,
}

impl ValidatedUploadFile {
    pub fn absolute_path(&self) -> &Path {
        &self.absolute_path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

pub fn infer_mime_type(extension: &str) -> Option<&'static str> {
    let mime = match extension {
        ".pdf" => "application/pdf",
        ".docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ".xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ".csv" => "text/csv",
        ".txt" => "text/plain",
        ".png" => "image/png",
        ".jpg" | ".jpeg" => "image/jpeg",
        ".webp" => "image/webp",
        ".zip" => "application/zip",
        ".ps" => "application/postscript",
        _ => return None,
    };
    Some(mime)
}

fn normalize_mime(value: Option<&Value>) -> Option<String> {
    value
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
}

fn display_extension(extension: &str) -> &str {
    if extension.is_empty() {
        "(none)"
    } else {
        extension
    }
}

fn upload_error(
    code: ToolErrorCode,
    message: String,
    hint: &str,
    details: Value,
) -> ToolError {
    ToolError::new(code, message)
        .with_hint(hint)
        .with_details(details)
}

/// Runs the upload checks in order and stops at the first failure.
///
/// Order: path present, exists, stat, regular file, readable, extension allowed,
/// MIME resolvable and allowed, explicit MIME agrees with the extension.
pub async fn validate_upload_file_input(
    tool_name: &str,
    args: &Value,
) -> Result<ValidatedUploadFile, ToolError> {
    let raw_path = args
        .get(FILE_PATH_ARG)
        .and_then(|v| v.as_str())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty());
    let Some(raw_path) = raw_path else {
        return Err(upload_error(
            ToolErrorCode::FilePathRequired,
            "filePath is required for multipart upload tools.".to_string(),
            "Pass a local readable file path in filePath.",
            json!({ "toolName": tool_name }),
        ));
    };

    let resolved = resolve_user_path(raw_path);
    let display_path = resolved.display().to_string();

    let metadata = match tokio::fs::metadata(&resolved).await {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(upload_error(
                ToolErrorCode::FileNotFound,
                format!("File does not exist: {}", display_path),
                "Verify the path and ensure the file exists on the local machine.",
                json!({ "toolName": tool_name, "filePath": display_path }),
            ));
        }
        Err(err) => {
            return Err(upload_error(
                ToolErrorCode::FileNotReadable,
                format!("Unable to stat file at {}.", display_path),
                "Ensure the path points to a readable file and retry.",
                json!({
                    "toolName": tool_name,
                    "filePath": display_path,
                    "reason": err.to_string(),
                }),
            ));
        }
    };

    if !metadata.is_file() {
        return Err(upload_error(
            ToolErrorCode::FileNotRegular,
            format!("Path is not a regular file: {}", display_path),
            "Pass a file path, not a directory or special filesystem path.",
            json!({ "toolName": tool_name, "filePath": display_path }),
        ));
    }

    if let Err(err) = tokio::fs::File::open(&resolved).await {
        return Err(upload_error(
            ToolErrorCode::FileNotReadable,
            format!("File is not readable: {}", display_path),
            "Adjust file permissions so the MCP process can read this file.",
            json!({
                "toolName": tool_name,
                "filePath": display_path,
                "reason": err.to_string(),
            }),
        ));
    }

    let file_name = resolved
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = file_extension_lower(&resolved);
    let policy = policy_for_tool(tool_name);
    let provided_mime = normalize_mime(args.get(MIME_TYPE_ARG));
    let inferred_mime = infer_mime_type(&extension);

    if !policy.allows_extension(&extension) {
        return Err(upload_error(
            ToolErrorCode::UnsupportedFileType,
            format!(
                "Unsupported file extension '{}' for {}.",
                display_extension(&extension),
                tool_name
            ),
            "Use a supported file type or convert the document before uploading.",
            json!({
                "toolName": tool_name,
                "filePath": display_path,
                "extension": extension,
                "allowedExtensions": policy.allowed_extensions,
            }),
        ));
    }

    let effective_mime = provided_mime
        .clone()
        .or_else(|| inferred_mime.map(|m| m.to_string()));
    let Some(effective_mime) = effective_mime else {
        return Err(upload_error(
            ToolErrorCode::UnsupportedFileType,
            format!(
                "Unable to infer MIME type for extension '{}'.",
                display_extension(&extension)
            ),
            "Set mimeType to a supported value for this endpoint or use a different file type.",
            json!({
                "toolName": tool_name,
                "filePath": display_path,
                "extension": extension,
                "mimeType": Value::Null,
                "allowedMimeTypes": policy.allowed_mime_types,
            }),
        ));
    };

    if !policy.allows_mime(&effective_mime) {
        return Err(upload_error(
            ToolErrorCode::UnsupportedFileType,
            format!(
                "Unsupported MIME type '{}' for {}.",
                effective_mime, tool_name
            ),
            "Set mimeType to a supported value for this endpoint or use a different file type.",
            json!({
                "toolName": tool_name,
                "filePath": display_path,
                "extension": extension,
                "mimeType": effective_mime,
                "allowedMimeTypes": policy.allowed_mime_types,
            }),
        ));
    }

    if let (Some(provided), Some(inferred)) = (provided_mime.as_deref(), inferred_mime) {
        if provided != inferred {
            return Err(upload_error(
                ToolErrorCode::UnsupportedFileType,
                format!(
                    "Provided mimeType '{}' does not match extension '{}'.",
                    provided, extension
                ),
                "Use a mimeType matching the file extension, or omit mimeType to use inferred value.",
                json!({
                    "toolName": tool_name,
                    "filePath": display_path,
                    "extension": extension,
                    "inferredMimeType": inferred,
                    "providedMimeType": provided,
                }),
            ));
        }
    }

    Ok(ValidatedUploadFile {
        absolute_path: resolved,
        file_name,
        extension,
        mime_type: effective_mime,
    })
}
