/// Maximum number of rows returned by a conversation fetch.
pub const CONVERSATION_FETCH_LIMIT: u32 = 500;

/// Caller-imposed deadline on a single store round-trip from the
/// delivery router. A send attempt whose persistence exceeds this is
/// acknowledged as failed.
pub const STORE_CALL_TIMEOUT_SECS: u64 = 10;

/// Maximum accepted attachment upload size in bytes (50 MiB).
pub const MAX_UPLOAD_SIZE: usize = 50 * 1024 * 1024;

/// Default HTTP/WebSocket listen port of the gateway.
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Multipart field name carrying the attachment bytes on upload.
pub const UPLOAD_FIELD_NAME: &str = "file";
