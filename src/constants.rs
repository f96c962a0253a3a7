pub mod network {
    pub const DEFAULT_API_BASE_URL: &str = "https://api.vanta.com/v1";
    pub const TIMEOUT_API_REQUEST_MS: u64 = 30_000;
    pub const CLIENT_ID_HEADER: &str = "x-vanta-is-mcp";
    pub const USER_AGENT: &str = "vanta-mcp/2.0";
}

pub mod oauth {
    pub const TOKEN_PATH: &str = "/oauth/token";
    pub const DEFAULT_SCOPE: &str = "vanta-api.all:read vanta-api.all:write";
    pub const GRANT_TYPE: &str = "client_credentials";
    pub const EXPIRY_BUFFER_MS: u64 = 60_000;
    /// Upper bound on a cached token's lifetime, whatever `expires_in` claims.
    pub const MAX_TOKEN_LIFETIME_SECS: u64 = 86_400;
    pub const RETRY_STATUS_CODES: &[u16] = &[429, 500, 502, 503, 504];
}

pub mod retry {
    pub const MAX_RETRIES: usize = 2;
    pub const BASE_DELAY_MS: u64 = 500;
    pub const STATUS_CODES: &[u16] = &[408, 409, 429, 500, 502, 503, 504];
}

pub mod uploads {
    pub const FILE_PATH_ARG: &str = "filePath";
    pub const MIME_TYPE_ARG: &str = "mimeType";
    pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[
        ".pdf", ".docx", ".xlsx", ".csv", ".txt", ".png", ".jpg", ".jpeg", ".webp", ".zip", ".ps",
    ];
    pub const DEFAULT_ALLOWED_MIME_TYPES: &[&str] = &[
        "application/pdf",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "text/csv",
        "text/plain",
        "image/*",
        "application/zip",
        "application/x-zip-compressed",
        "application/postscript",
    ];
}

pub mod limits {
    pub const LOG_BODY_PREVIEW_BYTES: usize = 2_048;
    pub const REDACTION_MAX_DEPTH: usize = 6;
    pub const SUGGESTION_LIMIT: usize = 5;
}
