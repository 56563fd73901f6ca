//! Shared numeric constants and storage key names.

/// Idle time after which a registration session is abandoned.
pub const SESSION_TIMEOUT_MS: u64 = 10 * 60 * 1000;

/// How often hosts should run the inactivity check.
pub const ACTIVITY_CHECK_INTERVAL_MS: u64 = 30_000;

/// Minimum time a loading indicator stays visible between steps.
pub const MIN_LOADING_MS: u64 = 350;

/// Upper bound on a single captured identity image.
pub const MAX_CAPTURE_BYTES: usize = 5 * 1024 * 1024;

/// Storage key holding the active session identifier.
pub const KEY_SESSION_ID: &str = "registrationSessionId";

/// Storage key holding the 0-based step index.
pub const KEY_CURRENT_STEP: &str = "registrationCurrentStep";

/// Storage key holding the last-activity timestamp in Unix milliseconds.
pub const KEY_LAST_ACTIVITY: &str = "registrationLastActivity";
