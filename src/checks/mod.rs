//! Bundled checks
//!
//! A small set of device checks registered under their module names:
//! - `system`: VerifyUptime, VerifyReloadCause
//! - `software`: VerifyEOSVersion
//! - `configuration`: VerifyRunningConfigLines
//!
//! Each check decodes its raw inputs into a typed struct at construction.

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::device::Device;
use crate::models::Command;
use crate::registry::{CheckError, RegistryError, TestRegistry};

pub mod configuration;
pub mod software;
pub mod system;

pub use configuration::VerifyRunningConfigLines;
pub use software::VerifyEOSVersion;
pub use system::{VerifyReloadCause, VerifyUptime};

/// Register every bundled check
pub fn register_builtin(registry: &TestRegistry) -> Result<(), RegistryError> {
    registry.register(system::MODULE, VerifyUptime::NAME, VerifyUptime::from_inputs)?;
    registry.register(system::MODULE, VerifyReloadCause::NAME, VerifyReloadCause::from_inputs)?;
    registry.register(software::MODULE, VerifyEOSVersion::NAME, VerifyEOSVersion::from_inputs)?;
    registry.register(
        configuration::MODULE,
        VerifyRunningConfigLines::NAME,
        VerifyRunningConfigLines::from_inputs,
    )?;
    Ok(())
}

/// Execute a JSON command and return its output
pub(crate) fn run_json(ctx: &CancellationToken, device: &dyn Device, command: &Command) -> Result<Value, CheckError> {
    let result = device.execute(ctx, command)?;
    result
        .json()
        .cloned()
        .ok_or_else(|| CheckError::Output(format!("'{}' did not return JSON", command.template)))
}

/// Execute a text command and return its output
pub(crate) fn run_text(ctx: &CancellationToken, device: &dyn Device, command: &Command) -> Result<String, CheckError> {
    let result = device.execute(ctx, command)?;
    result
        .text()
        .map(str::to_string)
        .ok_or_else(|| CheckError::Output(format!("'{}' did not return text", command.template)))
}
