//! Check registry module
//!
//! Handles:
//! - The `Test` capability implemented by every check
//! - Error taxonomy for check construction, validation and execution
//! - A `(module, name)` keyed factory table used to build checks from
//!   declarative catalog entries
//! - Typed decoding of raw check inputs

use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;

use crate::device::{Device, DeviceError};
use crate::models::{Command, Inputs, TestResult, TestStatus};

/// A verification check that runs against one device
pub trait Test: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn categories(&self) -> Vec<String>;

    /// Commands the check issues, in order
    fn commands(&self) -> Vec<Command>;

    /// Extra validation of the raw inputs beyond what decoding enforces
    fn validate_input(&self, _raw: &Inputs) -> Result<(), CheckError> {
        Ok(())
    }

    /// Run the check. Assertion failures are reported through the returned
    /// result's status; `Err` means the check could not be evaluated.
    fn execute(&self, ctx: &CancellationToken, device: &dyn Device) -> Result<TestResult, CheckError>;
}

/// Why a check could not produce an evaluated result
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error("construction failed: {0}")]
    Construction(String),
    #[error("invalid inputs: {0}")]
    Validation(String),
    #[error(transparent)]
    Transport(#[from] DeviceError),
    #[error("unexpected command output: {0}")]
    Output(String),
    #[error("execution cancelled")]
    Cancelled,
}

impl CheckError {
    /// Terminal status a job ends in when its check fails with this error
    pub fn status(&self) -> TestStatus {
        match self {
            CheckError::Cancelled | CheckError::Transport(DeviceError::Cancelled) => TestStatus::Skipped,
            _ => TestStatus::Error,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("check {module}/{name} is already registered")]
    AlreadyRegistered { module: String, name: String },
    #[error("check {module}/{name} is not registered")]
    NotFound { module: String, name: String },
    #[error("failed to construct check {module}/{name}: {source}")]
    ConstructionFailed {
        module: String,
        name: String,
        #[source]
        source: CheckError,
    },
}

/// Factory building a check from its raw inputs
pub type Constructor = Arc<dyn Fn(&Inputs) -> Result<Box<dyn Test>, CheckError> + Send + Sync>;

type RegistryKey = (String, String);

/// Factory table shared between the caller and the runner.
///
/// Registration happens at startup, lookups during runs; both are safe to
/// call concurrently.
#[derive(Default)]
pub struct TestRegistry {
    constructors: RwLock<HashMap<RegistryKey, Constructor>>,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the bundled checks
    pub fn with_builtin_checks() -> Result<Self, RegistryError> {
        let registry = Self::new();
        crate::checks::register_builtin(&registry)?;
        Ok(registry)
    }

    pub fn register<F>(&self, module: &str, name: &str, constructor: F) -> Result<(), RegistryError>
    where
        F: Fn(&Inputs) -> Result<Box<dyn Test>, CheckError> + Send + Sync + 'static,
    {
        let mut constructors = self.constructors.write().unwrap_or_else(PoisonError::into_inner);
        let key = (module.to_string(), name.to_string());

        if constructors.contains_key(&key) {
            return Err(RegistryError::AlreadyRegistered {
                module: key.0,
                name: key.1,
            });
        }

        log::trace!("Registered check {}/{}", module, name);
        constructors.insert(key, Arc::new(constructor));
        Ok(())
    }

    /// Build a fresh check instance from its declarative inputs
    pub fn get_test_with_inputs(
        &self,
        module: &str,
        name: &str,
        inputs: &Inputs,
    ) -> Result<Box<dyn Test>, RegistryError> {
        // Clone the factory out so the constructor runs without the lock held
        let constructor = self
            .constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(module.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                module: module.to_string(),
                name: name.to_string(),
            })?;

        constructor(inputs).map_err(|source| RegistryError::ConstructionFailed {
            module: module.to_string(),
            name: name.to_string(),
            source,
        })
    }

    pub fn contains(&self, module: &str, name: &str) -> bool {
        self.constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&(module.to_string(), name.to_string()))
    }

    /// Registered `(module, name)` pairs, sorted
    pub fn list(&self) -> Vec<(String, String)> {
        let mut keys: Vec<_> = self
            .constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.constructors.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for TestRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestRegistry").field("checks", &self.list()).finish()
    }
}

/// Decode raw inputs into a check's typed input struct
pub fn decode_inputs<T: DeserializeOwned>(inputs: &Inputs) -> Result<T, CheckError> {
    serde_json::from_value(serde_json::Value::Object(inputs.clone()))
        .map_err(|e| CheckError::Validation(e.to_string()))
}
