//! Device inventory loading
//!
//! An inventory lists devices with their recorded command outputs:
//!
//! ```toml
//! [[devices]]
//! name = "leaf1"
//! latency_ms = 20
//!
//! [devices.outputs]
//! "show version" = { version = "4.31.1F" }
//! "show running-config" = "hostname leaf1"
//! ```

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::{DeviceHandle, ReplayDevice};
use crate::cache::CommandCache;
use crate::document::{load_document, DocumentError};

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("invalid inventory: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("duplicate device name in inventory: {0}")]
    DuplicateDevice(String),
    #[error("inventory device name must not be empty")]
    EmptyName,
}

/// One inventory entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceSpec {
    pub name: String,
    #[serde(default = "default_established")]
    pub established: bool,
    #[serde(default)]
    pub latency_ms: u64,
    /// Command template -> recorded output
    #[serde(default)]
    pub outputs: BTreeMap<String, serde_json::Value>,
}

fn default_established() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Inventory {
    #[serde(default)]
    pub devices: Vec<DeviceSpec>,
}

impl Inventory {
    pub fn load_from_file(path: &Path) -> Result<Self, InventoryError> {
        let inventory: Inventory = load_document(path)?;
        inventory.validate()?;
        Ok(inventory)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, InventoryError> {
        let inventory: Inventory = toml::from_str(content)?;
        inventory.validate()?;
        Ok(inventory)
    }

    pub fn validate(&self) -> Result<(), InventoryError> {
        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.name.trim().is_empty() {
                return Err(InventoryError::EmptyName);
            }
            if !seen.insert(device.name.as_str()) {
                return Err(InventoryError::DuplicateDevice(device.name.clone()));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Build replay devices. Every device shares `cache`, whose keys carry
    /// the device name; `None` disables caching.
    pub fn build_devices(&self, cache: Option<Arc<CommandCache>>) -> Vec<DeviceHandle> {
        self.devices
            .iter()
            .map(|spec| {
                let mut device = ReplayDevice::new(&spec.name)
                    .with_established(spec.established)
                    .with_latency(Duration::from_millis(spec.latency_ms));
                for (template, output) in &spec.outputs {
                    device = device.with_output(template, output.clone());
                }
                if let Some(cache) = &cache {
                    device = device.with_cache(Arc::clone(cache));
                }
                Arc::new(device) as DeviceHandle
            })
            .collect()
    }
}
