//! Logging setup and structured run events
//!
//! Library code logs through the `log` facade. The binary installs a
//! `tracing-subscriber` formatter on stderr, which also picks up `log`
//! records. `RUST_LOG` overrides the configured level.

use anyhow::{anyhow, Result};
use log::{error, info, warn};
use serde_json::json;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::constants::{APP_NAME, EVENT_JOB_FAILED, EVENT_RUN_CANCELLED, EVENT_RUN_FINISHED, EVENT_RUN_STARTED};
use crate::models::{RunStatistics, TestResult};

/// Level names accepted in configuration and on the command line
pub const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

pub fn is_valid_level(level: &str) -> bool {
    LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str())
}

/// Install the stderr log subscriber. Fails if one is already installed.
pub fn init_logging(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level.to_ascii_lowercase())
            .map_err(|e| anyhow!("Invalid log level '{}': {}", level, e))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to set logger: {}", e))
}

/// Levels used for run events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventLevel {
    Error,
    Warn,
    Info,
}

/// Emits run lifecycle events as `message | {json}` log lines
#[derive(Debug, Clone, Default)]
pub struct RunLogger;

impl RunLogger {
    pub fn new() -> Self {
        Self
    }

    pub fn log_run_started(&self, run_id: Uuid, jobs: usize, workers: usize, max_concurrency: usize) {
        let data = json!({
            "event": EVENT_RUN_STARTED,
            "app": APP_NAME,
            "run_id": run_id.to_string(),
            "jobs": jobs,
            "workers": workers,
            "max_concurrency": max_concurrency,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        self.log_structured(EventLevel::Info, &format!("Run started with {} jobs", jobs), &data);
    }

    pub fn log_job_failed(&self, run_id: Uuid, result: &TestResult) {
        let data = json!({
            "event": EVENT_JOB_FAILED,
            "run_id": run_id.to_string(),
            "test": result.test_name,
            "device": result.device_name,
            "status": result.status,
            "message": result.message,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        self.log_structured(
            EventLevel::Error,
            &format!("{} on {} could not be evaluated", result.test_name, result.device_name),
            &data,
        );
    }

    pub fn log_run_cancelled(&self, run_id: Uuid, completed: usize, total: usize) {
        let data = json!({
            "event": EVENT_RUN_CANCELLED,
            "run_id": run_id.to_string(),
            "completed": completed,
            "total": total,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        self.log_structured(EventLevel::Warn, "Run cancelled", &data);
    }

    pub fn log_run_finished(&self, run_id: Uuid, statistics: &RunStatistics, elapsed: Duration) {
        let data = json!({
            "event": EVENT_RUN_FINISHED,
            "run_id": run_id.to_string(),
            "statistics": statistics.to_map(),
            "duration_ms": elapsed.as_millis() as u64,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        self.log_structured(
            EventLevel::Info,
            &format!("Run finished: {} results", statistics.total),
            &data,
        );
    }

    fn log_structured(&self, level: EventLevel, message: &str, data: &serde_json::Value) {
        let full_message = format!("{} | {}", message, data);

        match level {
            EventLevel::Error => error!("{}", full_message),
            EventLevel::Warn => warn!("{}", full_message),
            EventLevel::Info => info!("{}", full_message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_names() {
        assert!(is_valid_level("info"));
        assert!(is_valid_level("DEBUG"));
        assert!(is_valid_level("off"));
        assert!(!is_valid_level("verbose"));
    }

    #[test]
    fn test_events_do_not_panic_without_subscriber() {
        let logger = RunLogger::new();
        let run_id = Uuid::new_v4();
        let result = TestResult::new("VerifyUptime", "leaf1").error("device leaf1 is not established");

        logger.log_run_started(run_id, 4, 2, 10);
        logger.log_job_failed(run_id, &result);
        logger.log_run_cancelled(run_id, 1, 4);
        logger.log_run_finished(run_id, &RunStatistics::from_results([&result]), Duration::from_millis(5));
    }
}
