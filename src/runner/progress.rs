//! Runner decorator reporting progress while a run is in flight

use std::sync::{Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

use super::{RunError, Runner};
use crate::device::DeviceHandle;
use crate::models::{TestDefinition, TestResult};
use crate::output::progress::{ProgressSnapshot, RunProgress};

/// Wraps a `Runner` with a progress display.
///
/// Disabled, it delegates straight to the wrapped runner and records no
/// progress. Results are identical either way.
pub struct ProgressRunner {
    runner: Runner,
    enabled: bool,
    render: bool,
    last: Mutex<Option<ProgressSnapshot>>,
}

impl ProgressRunner {
    pub fn new(runner: Runner, enabled: bool) -> Self {
        Self {
            runner,
            enabled,
            render: true,
            last: Mutex::new(None),
        }
    }

    /// Whether to draw the progress line on stderr; counts are kept regardless
    pub fn with_render(mut self, render: bool) -> Self {
        self.render = render;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn runner(&self) -> &Runner {
        &self.runner
    }

    pub fn into_inner(self) -> Runner {
        self.runner
    }

    pub async fn run(
        &self,
        ctx: &CancellationToken,
        tests: &[TestDefinition],
        devices: &[DeviceHandle],
    ) -> Result<Vec<TestResult>, RunError> {
        if !self.enabled {
            return self.runner.run(ctx, tests, devices).await;
        }

        let mut progress = RunProgress::new(devices.iter().map(|d| d.name().to_string()), tests.len())
            .quiet(!self.render);
        progress.start();

        let outcome = self
            .runner
            .run_observed(ctx, tests, devices, |result| progress.record(result))
            .await;

        progress.complete();
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(progress.snapshot());

        outcome
    }

    /// Progress of the most recent run, if progress was enabled for it
    pub fn last_progress(&self) -> Option<ProgressSnapshot> {
        self.last.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ReplayDevice;
    use crate::registry::TestRegistry;
    use crate::runner::RunnerConfig;
    use serde_json::json;
    use std::sync::Arc;

    fn setup(enabled: bool) -> (ProgressRunner, Vec<TestDefinition>, Vec<DeviceHandle>) {
        let registry = Arc::new(TestRegistry::with_builtin_checks().unwrap());
        let runner = Runner::new(registry, RunnerConfig::default().with_max_concurrency(2));
        let inputs = json!({"minimum": 60}).as_object().cloned().unwrap();
        let tests = vec![
            TestDefinition::new("system", "VerifyUptime").with_inputs(inputs),
            TestDefinition::new("system", "VerifyReloadCause"),
        ];
        let devices: Vec<DeviceHandle> = ["leaf1", "leaf2", "leaf3"]
            .iter()
            .map(|name| {
                Arc::new(ReplayDevice::new(*name).with_output("show uptime", json!({"upTime": 120.0})))
                    as DeviceHandle
            })
            .collect();

        (ProgressRunner::new(runner, enabled).with_render(false), tests, devices)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_progress_tracks_every_result() {
        let (runner, tests, devices) = setup(true);

        let results = runner.run(&CancellationToken::new(), &tests, &devices).await.unwrap();
        let progress = runner.last_progress().unwrap();

        assert_eq!(results.len(), 6);
        assert_eq!(progress.completed, 6);
        assert_eq!(progress.total, 6);
        // VerifyReloadCause has no recorded output on any device
        assert_eq!(progress.problems, 3);
        assert!(progress.devices.values().all(|d| d.completed == 2 && d.total == 2));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_disabled_progress_delegates() {
        let (runner, tests, devices) = setup(false);

        let results = runner.run(&CancellationToken::new(), &tests, &devices).await.unwrap();

        assert_eq!(results.len(), 6);
        assert!(runner.last_progress().is_none());
        assert_eq!(runner.runner().get_statistics().total, 6);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_run_reports_partial_progress() {
        let (runner, tests, devices) = setup(true);
        let token = CancellationToken::new();
        token.cancel();

        let results = runner.run(&token, &tests, &devices).await.unwrap();
        let progress = runner.last_progress().unwrap();

        assert_eq!(progress.completed, results.len());
        assert!(!progress.is_complete());
    }
}
