//! Global constants for netverify
//!
//! Centralized location for application-wide defaults and bounds

/// Application name, used for the config directory and log events
pub const APP_NAME: &str = "netverify";

/// Config file name under the user config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Worker pool size used when the configured value is zero or negative
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Upper bound accepted from configuration files; larger CLI and library
/// values are capped to it
pub const MAX_CONCURRENCY_LIMIT: usize = 1024;

/// Default freshness window for cached command results, in seconds
pub const DEFAULT_CACHE_TTL_SECS: f64 = 60.0;

/// Longest accepted cache TTL, in seconds
pub const CACHE_TTL_MAX_SECS: f64 = 86_400.0;

/// Default number of resident cache entries per device
pub const DEFAULT_CACHE_MAX_SIZE: usize = 128;

/// Statistics keys, shared by the runner and reporters
pub const STAT_TOTAL: &str = "total";
pub const STAT_SUCCESS: &str = "success";
pub const STAT_FAILURE: &str = "failure";
pub const STAT_ERROR: &str = "error";
pub const STAT_SKIPPED: &str = "skipped";

/// Structured log event identifiers
pub const EVENT_RUN_STARTED: &str = "run_started";
pub const EVENT_RUN_FINISHED: &str = "run_finished";
pub const EVENT_RUN_CANCELLED: &str = "run_cancelled";
pub const EVENT_JOB_FAILED: &str = "job_failed";
