//! Device abstraction module
//!
//! Handles:
//! - The `Device` capability consumed by the runner and by checks
//! - Transport-level errors surfaced by device command execution
//! - Replay devices answering from recorded command outputs
//! - Inventory loading

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::models::{Command, CommandResult};

pub mod inventory;
pub mod replay;

pub use inventory::{DeviceSpec, Inventory, InventoryError};
pub use replay::ReplayDevice;

/// Errors raised while talking to a device
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("device {0} is not established")]
    NotEstablished(String),
    #[error("command '{command}' failed on {device}: {reason}")]
    CommandFailed {
        device: String,
        command: String,
        reason: String,
    },
    #[error("command cancelled before execution")]
    Cancelled,
}

/// A network device that checks can issue commands against.
///
/// `execute` is blocking; the runner calls it from the blocking pool.
pub trait Device: Send + Sync {
    fn name(&self) -> &str;

    /// Whether a usable connection to the device exists
    fn is_established(&self) -> bool;

    fn execute(&self, ctx: &CancellationToken, command: &Command) -> Result<CommandResult, DeviceError>;
}

/// Shared device handle as passed to the runner
pub type DeviceHandle = Arc<dyn Device>;
