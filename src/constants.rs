//! Application-wide constants for tuning and configuration
//!
//! Centralizes magic numbers to make them discoverable and configurable.

/// Notes returned per folder listing page. The remote enforces this; a
/// shorter page is the last one.
pub const NOTE_PAGE_SIZE: usize = 25;

/// Entries returned per gallery listing page.
pub const BULK_PAGE_SIZE: usize = 120;

/// Per-request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Retries per request before it counts as a transport failure.
pub const REQUEST_MAX_RETRIES: u32 = 2;

/// Initial backoff delay between request retries in milliseconds.
pub const RETRY_INITIAL_DELAY_MS: u64 = 500;

/// Maximum retry delay in seconds.
pub const MAX_RETRY_DELAY_SECS: u64 = 30;

/// Lower bound on the poll interval. Anything shorter hammers the remote.
pub const MIN_POLL_INTERVAL_SECS: u64 = 300;

/// Column width used when flattening HTML bodies to text.
pub const TEXT_WRAP_WIDTH: usize = 80;

/// Characters of a note title shown in a desktop notification preview.
pub const NOTIFICATION_PREVIEW_CHARS: usize = 80;
