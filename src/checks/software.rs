//! Software checks

use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::run_json;
use crate::device::Device;
use crate::models::{Command, Inputs, TestResult};
use crate::registry::{decode_inputs, CheckError, Test};

pub const MODULE: &str = "software";

const SHOW_VERSION: &str = "show version";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EOSVersionInputs {
    /// Accepted software versions
    pub versions: Vec<String>,
}

/// Verifies the device runs one of the allowed software versions
#[derive(Debug)]
pub struct VerifyEOSVersion {
    inputs: EOSVersionInputs,
}

impl VerifyEOSVersion {
    pub const NAME: &'static str = "VerifyEOSVersion";

    pub fn from_inputs(raw: &Inputs) -> Result<Box<dyn Test>, CheckError> {
        Ok(Box::new(Self {
            inputs: decode_inputs(raw)?,
        }))
    }
}

impl Test for VerifyEOSVersion {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Verifies the device software version"
    }

    fn categories(&self) -> Vec<String> {
        vec![MODULE.to_string()]
    }

    fn commands(&self) -> Vec<Command> {
        vec![Command::json(SHOW_VERSION)]
    }

    fn validate_input(&self, _raw: &Inputs) -> Result<(), CheckError> {
        if self.inputs.versions.is_empty() {
            return Err(CheckError::Validation("versions must not be empty".to_string()));
        }
        Ok(())
    }

    fn execute(&self, ctx: &CancellationToken, device: &dyn Device) -> Result<TestResult, CheckError> {
        let output = run_json(ctx, device, &Command::json(SHOW_VERSION))?;
        let version = output
            .get("version")
            .and_then(Value::as_str)
            .ok_or_else(|| CheckError::Output("missing string field 'version'".to_string()))?;

        let result = TestResult::new(Self::NAME, device.name())
            .with_categories(self.categories())
            .with_details(json!({ "version": version }));

        if self.inputs.versions.iter().any(|allowed| allowed == version) {
            Ok(result.success())
        } else {
            Ok(result.failure(format!(
                "device is running version \"{}\" not in expected versions: {:?}",
                version, self.inputs.versions
            )))
        }
    }
}
