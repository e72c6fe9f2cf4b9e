//! Structured logging schema and field name constants.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query by the same field names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown, status transitions) |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated from the HTTP request.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "inference", "jobs"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "lifecycle", "extractor", "anthropic", "pool", "worker"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "claim", "extract", "structure", "summarize", "commit"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Document UUID being operated on.
pub const DOCUMENT_ID: &str = "document_id";

/// Owning user UUID.
pub const USER_ID: &str = "user_id";

/// Client UUID.
pub const CLIENT_ID: &str = "client_id";

/// Analysis version written by a run.
pub const VERSION: &str = "version";

/// Declared file type ("pdf", "docx", "image").
pub const FILE_TYPE: &str = "file_type";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Byte length of an uploaded or downloaded blob.
pub const BYTE_LEN: &str = "byte_len";

/// Character length of extracted text.
pub const TEXT_LEN: &str = "text_len";

/// Byte length of a prompt.
pub const PROMPT_LEN: &str = "prompt_len";

/// Byte length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

/// Number of QA blocks parsed from a structuring response.
pub const BLOCK_COUNT: &str = "block_count";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error category from `Error::category`.
pub const ERROR_CATEGORY: &str = "error_category";

/// Model name used for a generation call.
pub const MODEL: &str = "model";
