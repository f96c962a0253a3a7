use super::validation::ValidatedUploadFile;
use crate::errors::{ToolError, ToolErrorCode};
use bytes::Bytes;
use serde_json::json;

/// Reads a validated file for the multipart body. A read failure after validation
/// (file removed or permissions changed) is still reported as `file_not_readable`.
pub async fn read_upload_bytes(file: &ValidatedUploadFile) -> Result<Bytes, ToolError> {
    tokio::fs::read(file.absolute_path())
        .await
        .map(Bytes::from)
        .map_err(|err| {
            ToolError::new(
                ToolErrorCode::FileNotReadable,
                format!(
                    "File is not readable: {}",
                    file.absolute_path().display()
                ),
            )
            .with_hint("Adjust file permissions so the MCP process can read this file.")
            .with_details(json!({
                "filePath": file.absolute_path().display().to_string(),
                "reason": err.to_string(),
            }))
        })
}
