//! Local file preflight for multipart upload operations.

mod multipart;
mod policy;
mod validation;

pub use multipart::read_upload_bytes;
pub use policy::{mime_matches, policy_for_tool, UploadPolicy};
pub use validation::{infer_mime_type, validate_upload_file_input, ValidatedUploadFile};
