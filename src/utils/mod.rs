pub mod flags;
pub mod redact;
pub mod suggest;
pub mod user_paths;
