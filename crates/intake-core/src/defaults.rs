//! Centralized default constants for the intake portal.
//!
//! All crates reference these constants instead of defining their own
//! magic numbers. Organized by domain area.

// =============================================================================
// ANALYSIS CALLS
// =============================================================================

/// Sampling temperature for the structuring call. Kept low so the JSON shape is stable.
pub const STRUCTURE_TEMPERATURE: f32 = 0.2;

/// Output token ceiling for the structuring call.
pub const STRUCTURE_MAX_TOKENS: u32 = 4096;

/// Sampling temperature for the executive summary call.
pub const SUMMARY_TEMPERATURE: f32 = 0.5;

/// Output token ceiling for the executive summary call.
pub const SUMMARY_MAX_TOKENS: u32 = 1024;

// =============================================================================
// LIFECYCLE WORKER
// =============================================================================

/// Wall-clock budget for one lifecycle run, in seconds.
pub const ANALYSIS_TIMEOUT_SECS: u64 = 60;

/// Maximum lifecycle runs executing at once.
pub const ANALYSIS_MAX_CONCURRENT: usize = 4;

/// Pending submissions the worker queue will hold before rejecting.
pub const ANALYSIS_QUEUE_CAPACITY: usize = 256;

/// Worker event broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Interval between stale-run reconciliation sweeps, in seconds.
pub const STALE_SWEEP_INTERVAL_SECS: u64 = 120;

/// A document `analysing` for longer than this is considered orphaned.
///
/// Twice the run budget, so a run that is merely slow is never swept.
pub const STALE_ANALYSIS_AGE_SECS: u64 = ANALYSIS_TIMEOUT_SECS * 2;

// =============================================================================
// INTAKE
// =============================================================================

/// Maximum accepted upload size (25 MiB).
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Maximum client display name length.
pub const CLIENT_NAME_MAX_LEN: usize = 200;

// =============================================================================
// NOTIFICATIONS & LINKS
// =============================================================================

/// Public base URL used when building report links.
pub const APP_URL: &str = "http://localhost:3000";

/// Sender address for outbound email.
pub const FROM_EMAIL: &str = "noreply@intake.local";

/// Product name shown in email headers.
pub const PRODUCT_NAME: &str = "Client Intake Portal";

/// Summary body used in share emails when no analysis exists yet.
pub const PENDING_SUMMARY: &str = "Analysis is still pending.";

/// Client name used in emails when the client row cannot be resolved.
pub const UNKNOWN_CLIENT: &str = "your client";
