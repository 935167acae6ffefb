//! System checks: uptime and last reload cause

use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::run_json;
use crate::device::Device;
use crate::models::{Command, Inputs, TestResult};
use crate::registry::{decode_inputs, CheckError, Test};

pub const MODULE: &str = "system";

const SHOW_UPTIME: &str = "show uptime";
const SHOW_RELOAD_CAUSE: &str = "show reload cause";

const DEFAULT_ALLOWED_CAUSES: &[&str] = &[
    "Reload requested by the user.",
    "Reload requested after FPGA upgrade",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UptimeInputs {
    /// Minimum uptime in seconds
    pub minimum: u64,
}

/// Verifies the device has been up for at least `minimum` seconds
#[derive(Debug)]
pub struct VerifyUptime {
    inputs: UptimeInputs,
}

impl VerifyUptime {
    pub const NAME: &'static str = "VerifyUptime";

    pub fn from_inputs(raw: &Inputs) -> Result<Box<dyn Test>, CheckError> {
        Ok(Box::new(Self {
            inputs: decode_inputs(raw)?,
        }))
    }
}

impl Test for VerifyUptime {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Verifies the device uptime is above a minimum"
    }

    fn categories(&self) -> Vec<String> {
        vec![MODULE.to_string()]
    }

    fn commands(&self) -> Vec<Command> {
        vec![Command::json(SHOW_UPTIME)]
    }

    fn validate_input(&self, _raw: &Inputs) -> Result<(), CheckError> {
        if self.inputs.minimum == 0 {
            return Err(CheckError::Validation("minimum must be greater than zero".to_string()));
        }
        Ok(())
    }

    fn execute(&self, ctx: &CancellationToken, device: &dyn Device) -> Result<TestResult, CheckError> {
        let output = run_json(ctx, device, &Command::json(SHOW_UPTIME))?;
        let uptime = output
            .get("upTime")
            .and_then(Value::as_f64)
            .ok_or_else(|| CheckError::Output("missing numeric field 'upTime'".to_string()))?;

        let result = TestResult::new(Self::NAME, device.name())
            .with_categories(self.categories())
            .with_details(json!({ "uptime": uptime, "minimum": self.inputs.minimum }));

        if uptime >= self.inputs.minimum as f64 {
            Ok(result.success())
        } else {
            Ok(result.failure(format!(
                "Device uptime is {} seconds, below the minimum of {}",
                uptime, self.inputs.minimum
            )))
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReloadCauseInputs {
    /// Accepted reload causes; defaults to user-requested and FPGA upgrade
    #[serde(default)]
    pub allowed_causes: Option<Vec<String>>,
}

/// Verifies the last reload of the device was expected
#[derive(Debug)]
pub struct VerifyReloadCause {
    allowed_causes: Vec<String>,
}

impl VerifyReloadCause {
    pub const NAME: &'static str = "VerifyReloadCause";

    pub fn from_inputs(raw: &Inputs) -> Result<Box<dyn Test>, CheckError> {
        let inputs: ReloadCauseInputs = decode_inputs(raw)?;
        let allowed_causes = inputs
            .allowed_causes
            .unwrap_or_else(|| DEFAULT_ALLOWED_CAUSES.iter().map(|s| s.to_string()).collect());
        Ok(Box::new(Self { allowed_causes }))
    }
}

impl Test for VerifyReloadCause {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Verifies the last reload cause of the device"
    }

    fn categories(&self) -> Vec<String> {
        vec![MODULE.to_string()]
    }

    fn commands(&self) -> Vec<Command> {
        vec![Command::json(SHOW_RELOAD_CAUSE)]
    }

    fn validate_input(&self, _raw: &Inputs) -> Result<(), CheckError> {
        if self.allowed_causes.is_empty() {
            return Err(CheckError::Validation("allowed_causes must not be empty".to_string()));
        }
        Ok(())
    }

    fn execute(&self, ctx: &CancellationToken, device: &dyn Device) -> Result<TestResult, CheckError> {
        let output = run_json(ctx, device, &Command::json(SHOW_RELOAD_CAUSE))?;
        let causes = output
            .get("resetCauses")
            .and_then(Value::as_array)
            .ok_or_else(|| CheckError::Output("missing array field 'resetCauses'".to_string()))?;

        let result = TestResult::new(Self::NAME, device.name()).with_categories(self.categories());

        let Some(first) = causes.first() else {
            return Ok(result.failure("No reload causes available"));
        };
        let description = first
            .get("description")
            .and_then(Value::as_str)
            .ok_or_else(|| CheckError::Output("reload cause has no 'description'".to_string()))?;

        if self.allowed_causes.iter().any(|cause| cause == description) {
            Ok(result.success())
        } else {
            Ok(result.failure(format!("Reload cause is: '{}'", description)))
        }
    }
}
