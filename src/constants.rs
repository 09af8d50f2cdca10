//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! Every value can be overridden from the environment (or a `.env` file).

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "HL VOX TimeLEFT";

/// Default timer value (HH:MM:SS)
pub const DEFAULT_POMODORO_TIME: &str = "00:30:00";

/// Seconds before the end at which the countdown fires
pub const COUNTDOWN_THRESHOLD: u64 = 5;

// ============================================
// Clickstream defaults
// ============================================

/// Default analytics project
pub const DEFAULT_PROJECT_ID: &str = "experiment-476518";

/// Default analytics dataset
pub const DEFAULT_DATASET_ID: &str = "hl_timeleft";

/// Default analytics table
pub const DEFAULT_TABLE_ID: &str = "clickstream";

/// BigQuery REST base URL
pub const DEFAULT_ENDPOINT: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// Number of events to batch before inserting
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// How long the worker waits on an empty queue before re-checking shutdown (ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Upper bound on how long shutdown waits for the worker (seconds)
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// HTTP request timeout for the sink (seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Retried events are capped at this multiple of the batch size
pub const OVERFLOW_FACTOR: usize = 3;

// ============================================
// Helper functions to read from env with fallback
// ============================================

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Check if clickstream tracking is enabled
pub fn is_clickstream_enabled() -> bool {
    std::env::var("CLICKSTREAM_ENABLED")
        .map(|s| s.to_lowercase() != "false" && s != "0")
        .unwrap_or(true)
}

/// Get analytics project ID from environment or use default
pub fn get_project_id() -> String {
    env_string("CLICKSTREAM_PROJECT_ID", DEFAULT_PROJECT_ID)
}

/// Get analytics dataset ID from environment or use default
pub fn get_dataset_id() -> String {
    env_string("CLICKSTREAM_DATASET_ID", DEFAULT_DATASET_ID)
}

/// Get analytics table ID from environment or use default
pub fn get_table_id() -> String {
    env_string("CLICKSTREAM_TABLE_ID", DEFAULT_TABLE_ID)
}

/// Get sink endpoint from environment or use default
pub fn get_endpoint() -> String {
    env_string("CLICKSTREAM_ENDPOINT", DEFAULT_ENDPOINT)
}

/// Get the sink access token, if one is configured
pub fn get_access_token() -> Option<String> {
    std::env::var("CLICKSTREAM_ACCESS_TOKEN")
        .or_else(|_| std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN"))
        .ok()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Get batch size from environment or use default
pub fn get_batch_size() -> usize {
    env_parse("CLICKSTREAM_BATCH_SIZE", DEFAULT_BATCH_SIZE)
}

/// Get intake queue capacity; `None` means unbounded
pub fn get_queue_capacity() -> Option<usize> {
    match env_parse("CLICKSTREAM_QUEUE_CAPACITY", 0usize) {
        0 => None,
        n => Some(n),
    }
}

/// Get worker poll interval from environment or use default
pub fn get_poll_interval_ms() -> u64 {
    env_parse("CLICKSTREAM_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)
}

/// Get shutdown timeout from environment or use default
pub fn get_shutdown_timeout_secs() -> u64 {
    env_parse("CLICKSTREAM_SHUTDOWN_TIMEOUT_SECS", DEFAULT_SHUTDOWN_TIMEOUT_SECS)
}

/// Get sink HTTP timeout from environment or use default
pub fn get_http_timeout_secs() -> u64 {
    env_parse("CLICKSTREAM_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)
}
