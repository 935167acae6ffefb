//! Data models module
//!
//! Defines core data structures:
//! - TestDefinition: Declarative check entry loaded from a catalog
//! - TestStatus / TestResult: Outcome of one (test, device) job
//! - Command / CommandResult: Device command and its recorded output
//! - RunStatistics: Aggregated counts over a result history
//! - RunReport: Complete output structure for reporters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use crate::constants::{STAT_ERROR, STAT_FAILURE, STAT_SKIPPED, STAT_SUCCESS, STAT_TOTAL};

/// Declarative check inputs, in catalog order
pub type Inputs = serde_json::Map<String, serde_json::Value>;

/// A check as declared in the test catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDefinition {
    /// Check name, e.g. `VerifyUptime`
    pub name: String,
    /// Module the check is registered under, e.g. `system`
    pub module: String,
    /// Raw inputs handed to the check constructor
    #[serde(default)]
    pub inputs: Inputs,
    #[serde(default)]
    pub categories: BTreeSet<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl TestDefinition {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            inputs: Inputs::new(),
            categories: BTreeSet::new(),
            tags: BTreeSet::new(),
        }
    }

    pub fn with_inputs(mut self, inputs: Inputs) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// `module/name`, the registry key in display form
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.module, self.name)
    }
}

/// Outcome of a single job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// Placeholder while a result is being built; never returned to callers
    #[default]
    Unset,
    /// The asserted condition held
    Success,
    /// The condition was evaluated and did not hold
    Failure,
    /// The condition could not be evaluated
    Error,
    /// The job was pre-empted before it executed
    Skipped,
}

impl TestStatus {
    pub fn is_terminal(self) -> bool {
        self != TestStatus::Unset
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Unset => "unset",
            TestStatus::Success => STAT_SUCCESS,
            TestStatus::Failure => STAT_FAILURE,
            TestStatus::Error => STAT_ERROR,
            TestStatus::Skipped => STAT_SKIPPED,
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one (test, device) job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub test_name: String,
    pub device_name: String,
    pub status: TestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Wall time spent executing the job
    #[serde(rename = "duration_ms", with = "duration_millis")]
    pub duration: Duration,
    /// When the job started executing (or was skipped)
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub categories: Vec<String>,
    /// Check-specific structured payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl TestResult {
    /// Skeleton result with status `Unset`
    pub fn new(test_name: impl Into<String>, device_name: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            device_name: device_name.into(),
            status: TestStatus::Unset,
            message: None,
            duration: Duration::ZERO,
            timestamp: Utc::now(),
            categories: Vec::new(),
            details: None,
        }
    }

    pub fn success(mut self) -> Self {
        self.status = TestStatus::Success;
        self
    }

    pub fn failure(mut self, message: impl Into<String>) -> Self {
        self.status = TestStatus::Failure;
        self.message = Some(message.into());
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.status = TestStatus::Error;
        self.message = Some(message.into());
        self
    }

    pub fn skipped(mut self, message: impl Into<String>) -> Self {
        self.status = TestStatus::Skipped;
        self.message = Some(message.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }
}

/// Wire format expected from a device command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandFormat {
    #[default]
    Json,
    Text,
}

/// A device command issued by a check
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Command {
    /// CLI command, e.g. `show version`
    pub template: String,
    #[serde(default)]
    pub format: CommandFormat,
    /// Whether the device may answer from its command cache
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
}

fn default_use_cache() -> bool {
    true
}

impl Command {
    pub fn json(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            format: CommandFormat::Json,
            use_cache: true,
        }
    }

    pub fn text(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            format: CommandFormat::Text,
            use_cache: true,
        }
    }

    /// Always hit the device, bypassing the command cache
    pub fn uncached(mut self) -> Self {
        self.use_cache = false;
        self
    }
}

/// Output of a command; text outputs are stored as JSON strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub command: String,
    pub format: CommandFormat,
    pub output: serde_json::Value,
}

impl CommandResult {
    pub fn json(&self) -> Option<&serde_json::Value> {
        match self.format {
            CommandFormat::Json => Some(&self.output),
            CommandFormat::Text => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.output.as_str()
    }
}

/// Counts over a result history. `total` always equals the sum of the
/// four terminal counters; skipped jobs are included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub total: usize,
    pub success: usize,
    pub failure: usize,
    pub error: usize,
    pub skipped: usize,
}

impl RunStatistics {
    pub fn from_results<'a, I>(results: I) -> Self
    where
        I: IntoIterator<Item = &'a TestResult>,
    {
        let mut stats = Self::default();
        for result in results {
            stats.record(result.status);
        }
        stats
    }

    pub fn record(&mut self, status: TestStatus) {
        let counter = match status {
            TestStatus::Success => &mut self.success,
            TestStatus::Failure => &mut self.failure,
            TestStatus::Error => &mut self.error,
            TestStatus::Skipped => &mut self.skipped,
            TestStatus::Unset => return,
        };
        *counter += 1;
        self.total += 1;
    }

    /// Lookup by statistics key (`total`, `success`, ...)
    pub fn get(&self, key: &str) -> Option<usize> {
        match key {
            STAT_TOTAL => Some(self.total),
            STAT_SUCCESS => Some(self.success),
            STAT_FAILURE => Some(self.failure),
            STAT_ERROR => Some(self.error),
            STAT_SKIPPED => Some(self.skipped),
            _ => None,
        }
    }

    pub fn to_map(&self) -> BTreeMap<String, usize> {
        [
            (STAT_TOTAL, self.total),
            (STAT_SUCCESS, self.success),
            (STAT_FAILURE, self.failure),
            (STAT_ERROR, self.error),
            (STAT_SKIPPED, self.skipped),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
    }

    /// True when any check failed or could not be evaluated
    pub fn has_failures(&self) -> bool {
        self.failure + self.error > 0
    }
}

/// Summary block of a run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(flatten)]
    pub statistics: RunStatistics,
    /// Duration of the whole run in milliseconds
    pub duration_ms: u64,
    /// Whether the run was cancelled by user signal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupted: Option<bool>,
}

/// Complete output structure for JSON serialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub results: Vec<TestResult>,
    pub summary: RunSummary,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
