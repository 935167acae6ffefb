//! Configuration checks

use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::run_text;
use crate::device::Device;
use crate::models::{Command, Inputs, TestResult};
use crate::registry::{decode_inputs, CheckError, Test};

pub const MODULE: &str = "configuration";

const SHOW_RUNNING_CONFIG: &str = "show running-config";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunningConfigLinesInputs {
    /// Patterns that must each match at least one line of the running config
    pub regex_patterns: Vec<String>,
}

/// Verifies the running configuration contains the given lines
#[derive(Debug)]
pub struct VerifyRunningConfigLines {
    patterns: Vec<Regex>,
}

impl VerifyRunningConfigLines {
    pub const NAME: &'static str = "VerifyRunningConfigLines";

    pub fn from_inputs(raw: &Inputs) -> Result<Box<dyn Test>, CheckError> {
        let inputs: RunningConfigLinesInputs = decode_inputs(raw)?;
        let patterns = inputs
            .regex_patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .multi_line(true)
                    .build()
                    .map_err(|e| CheckError::Validation(format!("invalid pattern '{}': {}", pattern, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Box::new(Self { patterns }))
    }
}

impl Test for VerifyRunningConfigLines {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Verifies the running configuration matches a list of patterns"
    }

    fn categories(&self) -> Vec<String> {
        vec![MODULE.to_string()]
    }

    fn commands(&self) -> Vec<Command> {
        vec![Command::text(SHOW_RUNNING_CONFIG)]
    }

    fn validate_input(&self, _raw: &Inputs) -> Result<(), CheckError> {
        if self.patterns.is_empty() {
            return Err(CheckError::Validation("regex_patterns must not be empty".to_string()));
        }
        Ok(())
    }

    fn execute(&self, ctx: &CancellationToken, device: &dyn Device) -> Result<TestResult, CheckError> {
        let config = run_text(ctx, device, &Command::text(SHOW_RUNNING_CONFIG))?;

        let missing: Vec<&str> = self
            .patterns
            .iter()
            .filter(|pattern| !pattern.is_match(&config))
            .map(Regex::as_str)
            .collect();

        let result = TestResult::new(Self::NAME, device.name()).with_categories(self.categories());

        if missing.is_empty() {
            Ok(result.success())
        } else {
            let message = format!("Following patterns were not found: {}", missing.join(", "));
            Ok(result.failure(message).with_details(json!({ "missing": missing })))
        }
    }
}
