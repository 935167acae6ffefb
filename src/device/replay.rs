//! Replay device
//!
//! Answers commands from recorded outputs instead of a live transport.
//! Recorded outputs are looked up by command template; cacheable commands
//! go through the attached `CommandCache` first.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{Device, DeviceError};
use crate::cache::{CacheKey, CommandCache};
use crate::models::{Command, CommandFormat, CommandResult};

#[derive(Debug)]
pub struct ReplayDevice {
    name: String,
    established: bool,
    latency: Duration,
    outputs: HashMap<String, Value>,
    cache: Option<Arc<CommandCache>>,
    /// Number of lookups that reached the recorded outputs
    fetches: AtomicUsize,
}

impl ReplayDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            established: true,
            latency: Duration::ZERO,
            outputs: HashMap::new(),
            cache: None,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_output(mut self, template: impl Into<String>, output: Value) -> Self {
        self.outputs.insert(template.into(), output);
        self
    }

    /// Simulated round-trip time, spent blocking on every uncached command
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_established(mut self, established: bool) -> Self {
        self.established = established;
        self
    }

    pub fn with_cache(mut self, cache: Arc<CommandCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache(&self) -> Option<&Arc<CommandCache>> {
        self.cache.as_ref()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    fn fetch(&self, command: &Command) -> Result<CommandResult, DeviceError> {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        self.fetches.fetch_add(1, Ordering::Relaxed);

        let failed = |reason: &str| DeviceError::CommandFailed {
            device: self.name.clone(),
            command: command.template.clone(),
            reason: reason.to_string(),
        };

        let recorded = self
            .outputs
            .get(&command.template)
            .ok_or_else(|| failed("no recorded output"))?;

        let output = match (command.format, recorded) {
            // JSON recorded as a raw string, as captured from the device
            (CommandFormat::Json, Value::String(raw)) => {
                serde_json::from_str(raw).map_err(|_| failed("recorded output is not valid JSON"))?
            }
            (CommandFormat::Json, value) => value.clone(),
            (CommandFormat::Text, Value::String(text)) => Value::String(text.clone()),
            (CommandFormat::Text, _) => return Err(failed("recorded output is not text")),
        };

        Ok(CommandResult {
            command: command.template.clone(),
            format: command.format,
            output,
        })
    }
}

impl Device for ReplayDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_established(&self) -> bool {
        self.established
    }

    fn execute(&self, ctx: &CancellationToken, command: &Command) -> Result<CommandResult, DeviceError> {
        if ctx.is_cancelled() {
            return Err(DeviceError::Cancelled);
        }
        if !self.established {
            return Err(DeviceError::NotEstablished(self.name.clone()));
        }

        let cache = self.cache.as_ref().filter(|_| command.use_cache);
        let key = CacheKey::new(&self.name, &command.template);

        if let Some(hit) = cache.and_then(|cache| cache.get(&key)) {
            log::trace!("Cache hit for {}", key);
            return Ok(hit);
        }

        let result = self.fetch(command)?;
        if let Some(cache) = cache {
            cache.set(key, result.clone());
        }
        Ok(result)
    }
}
