//! Test runner module
//!
//! Executes the `tests × devices` job matrix:
//! - All jobs are queued on a closed, fully buffered channel before any
//!   worker starts
//! - `min(max_concurrency, jobs)` workers pull jobs; each races the run's
//!   cancellation token against a semaphore permit
//! - Checks run on the blocking pool while the worker holds its permit
//! - A single collector drains results until every worker has exited
//!
//! Errors inside a job never abort the run; they become part of the job's
//! `TestResult`. Result order is unspecified.

use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::constants::{DEFAULT_MAX_CONCURRENCY, MAX_CONCURRENCY_LIMIT};
use crate::device::{Device, DeviceError, DeviceHandle};
use crate::logging::RunLogger;
use crate::models::{RunStatistics, TestDefinition, TestResult, TestStatus};
use crate::registry::TestRegistry;

pub mod progress;

pub use progress::ProgressRunner;

const SKIPPED_BEFORE_START: &str = "run cancelled before the job started";

/// Errors that fail a whole run. Per-job failures are never reported here.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("duplicate device name in run: {0}")]
    DuplicateDevice(String),
    #[error("job queue rejected a job")]
    QueueRejected,
    #[error("worker task failed: {0}")]
    WorkerFailed(String),
}

/// Scheduler settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Upper bound on simultaneously executing jobs; 0 selects the default,
    /// values above `MAX_CONCURRENCY_LIMIT` are capped
    pub max_concurrency: usize,
    /// After cancellation, keep draining the queue and report every
    /// remaining job as skipped instead of stopping the worker
    pub drain_on_cancel: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            drain_on_cancel: false,
        }
    }
}

impl RunnerConfig {
    pub fn with_max_concurrency(mut self, requested: i64) -> Self {
        self.max_concurrency = normalize_concurrency(requested);
        self
    }

    pub fn with_drain_on_cancel(mut self, drain: bool) -> Self {
        self.drain_on_cancel = drain;
        self
    }
}

/// Map a requested pool size to an effective one; `<= 0` selects the default
/// and anything above `MAX_CONCURRENCY_LIMIT` is capped to it
pub fn normalize_concurrency(requested: i64) -> usize {
    if requested <= 0 {
        DEFAULT_MAX_CONCURRENCY
    } else {
        usize::try_from(requested)
            .unwrap_or(MAX_CONCURRENCY_LIMIT)
            .min(MAX_CONCURRENCY_LIMIT)
    }
}

struct Job {
    test: Arc<TestDefinition>,
    device: DeviceHandle,
}

impl Job {
    fn skipped(&self, reason: &str) -> TestResult {
        TestResult::new(&self.test.name, self.device.name())
            .skipped(reason)
            .with_categories(self.test.categories.iter().cloned())
    }
}

/// Runs check matrices and keeps the history of their results
pub struct Runner {
    registry: Arc<TestRegistry>,
    config: RunnerConfig,
    history: Mutex<Vec<TestResult>>,
    logger: RunLogger,
}

impl Runner {
    pub fn new(registry: Arc<TestRegistry>, config: RunnerConfig) -> Self {
        Self {
            registry,
            config,
            history: Mutex::new(Vec::new()),
            logger: RunLogger::new(),
        }
    }

    pub fn registry(&self) -> &Arc<TestRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Effective pool size
    pub fn max_concurrency(&self) -> usize {
        if self.config.max_concurrency == 0 {
            DEFAULT_MAX_CONCURRENCY
        } else {
            self.config.max_concurrency.min(MAX_CONCURRENCY_LIMIT)
        }
    }

    /// Run every test against every device.
    ///
    /// Without cancellation exactly `tests.len() * devices.len()` results are
    /// returned. Once `ctx` is cancelled, each worker reports the job it holds
    /// as skipped and stops, so fewer results may come back unless
    /// `drain_on_cancel` is set.
    pub async fn run(
        &self,
        ctx: &CancellationToken,
        tests: &[TestDefinition],
        devices: &[DeviceHandle],
    ) -> Result<Vec<TestResult>, RunError> {
        self.run_observed(ctx, tests, devices, |_| {}).await
    }

    /// `run`, calling `observer` once per result as the collector receives it
    pub(crate) async fn run_observed<F>(
        &self,
        ctx: &CancellationToken,
        tests: &[TestDefinition],
        devices: &[DeviceHandle],
        mut observer: F,
    ) -> Result<Vec<TestResult>, RunError>
    where
        F: FnMut(&TestResult),
    {
        check_unique_devices(devices)?;

        let total = tests.len() * devices.len();
        if total == 0 {
            log::debug!("Nothing to run ({} tests, {} devices)", tests.len(), devices.len());
            return Ok(Vec::new());
        }

        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let max_concurrency = self.max_concurrency();
        let workers = max_concurrency.min(total);
        self.logger.log_run_started(run_id, total, workers, max_concurrency);

        let (job_tx, job_rx) = mpsc::channel::<Job>(total);
        for test in tests.iter().cloned().map(Arc::new) {
            for device in devices {
                let job = Job {
                    test: Arc::clone(&test),
                    device: Arc::clone(device),
                };
                job_tx.try_send(job).map_err(|_| RunError::QueueRejected)?;
            }
        }
        // Closed before any worker starts draining
        drop(job_tx);

        let queue = Arc::new(tokio::sync::Mutex::new(job_rx));
        let semaphore = Arc::new(Semaphore::new(max_concurrency));
        let (result_tx, mut result_rx) = mpsc::channel::<TestResult>(total);

        let handles: Vec<_> = (0..workers)
            .map(|id| {
                let worker = Worker {
                    id,
                    queue: Arc::clone(&queue),
                    semaphore: Arc::clone(&semaphore),
                    results: result_tx.clone(),
                    registry: Arc::clone(&self.registry),
                    cancel: ctx.clone(),
                    drain_on_cancel: self.config.drain_on_cancel,
                };
                tokio::spawn(worker.run())
            })
            .collect();
        drop(result_tx);

        let mut results = Vec::with_capacity(total);
        while let Some(result) = result_rx.recv().await {
            if result.status == TestStatus::Error {
                self.logger.log_job_failed(run_id, &result);
            }
            observer(&result);
            results.push(result);
        }

        for handle in handles {
            handle
                .await
                .map_err(|e| RunError::WorkerFailed(e.to_string()))?;
        }

        self.lock_history().extend(results.iter().cloned());

        if ctx.is_cancelled() {
            self.logger.log_run_cancelled(run_id, results.len(), total);
        }
        let statistics = RunStatistics::from_results(&results);
        self.logger.log_run_finished(run_id, &statistics, started.elapsed());

        Ok(results)
    }

    /// Every result recorded since the last `clear_results`
    pub fn get_results(&self) -> Vec<TestResult> {
        self.lock_history().clone()
    }

    pub fn clear_results(&self) {
        self.lock_history().clear();
    }

    pub fn filter_results(&self, status: TestStatus) -> Vec<TestResult> {
        self.lock_history()
            .iter()
            .filter(|result| result.status == status)
            .cloned()
            .collect()
    }

    /// Counts over the result history; skipped jobs count toward `total`
    pub fn get_statistics(&self) -> RunStatistics {
        RunStatistics::from_results(self.lock_history().iter())
    }

    fn lock_history(&self) -> MutexGuard<'_, Vec<TestResult>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Worker {
    id: usize,
    queue: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    semaphore: Arc<Semaphore>,
    results: mpsc::Sender<TestResult>,
    registry: Arc<TestRegistry>,
    cancel: CancellationToken,
    drain_on_cancel: bool,
}

impl Worker {
    async fn run(self) {
        while let Some(job) = self.next_job().await {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    log::debug!("Worker {} observed cancellation", self.id);
                    let _ = self.results.send(job.skipped(SKIPPED_BEFORE_START)).await;
                    if self.drain_on_cancel {
                        self.drain().await;
                    }
                    return;
                }

                permit = Arc::clone(&self.semaphore).acquire_owned() => {
                    let Ok(permit) = permit else {
                        let _ = self.results.send(job.skipped("scheduler shut down")).await;
                        return;
                    };
                    let result = execute_job(job, Arc::clone(&self.registry), self.cancel.clone()).await;
                    drop(permit);

                    if self.results.send(result).await.is_err() {
                        return;
                    }
                }
            }
        }
    }

    async fn next_job(&self) -> Option<Job> {
        self.queue.lock().await.recv().await
    }

    /// Report every job still queued as skipped
    async fn drain(&self) {
        while let Some(job) = self.next_job().await {
            if self.results.send(job.skipped(SKIPPED_BEFORE_START)).await.is_err() {
                return;
            }
        }
    }
}

async fn execute_job(job: Job, registry: Arc<TestRegistry>, cancel: CancellationToken) -> TestResult {
    let fallback = TestResult::new(&job.test.name, job.device.name())
        .with_categories(job.test.categories.iter().cloned());

    let outcome = tokio::task::spawn_blocking(move || {
        run_test(&registry, &job.test, job.device.as_ref(), &cancel)
    })
    .await;

    match outcome {
        Ok(result) => result,
        Err(e) => fallback.error(format!("check aborted: {}", e)),
    }
}

/// Execute one check against one device, synchronously.
///
/// Always returns a result with a terminal status. Duration and timestamp
/// are stamped here; categories fall back to the definition's when the
/// check left them empty.
pub fn run_test(
    registry: &TestRegistry,
    definition: &TestDefinition,
    device: &dyn Device,
    ctx: &CancellationToken,
) -> TestResult {
    let timestamp = Utc::now();
    let started = Instant::now();

    let mut result = evaluate(registry, definition, device, ctx);

    result.duration = started.elapsed();
    result.timestamp = timestamp;
    if result.categories.is_empty() {
        result.categories = definition.categories.iter().cloned().collect();
    }
    result
}

fn evaluate(
    registry: &TestRegistry,
    definition: &TestDefinition,
    device: &dyn Device,
    ctx: &CancellationToken,
) -> TestResult {
    let skeleton = TestResult::new(&definition.name, device.name());

    if !device.is_established() {
        return skeleton.error(DeviceError::NotEstablished(device.name().to_string()).to_string());
    }

    let test = match registry.get_test_with_inputs(&definition.module, &definition.name, &definition.inputs) {
        Ok(test) => test,
        Err(e) => return skeleton.error(e.to_string()),
    };

    if let Err(e) = test.validate_input(&definition.inputs) {
        return skeleton.error(e.to_string());
    }

    match test.execute(ctx, device) {
        Ok(mut result) if result.status.is_terminal() => {
            result.test_name = definition.name.clone();
            result.device_name = device.name().to_string();
            result
        }
        Ok(_) => skeleton.error(format!(
            "check {} did not set a result status",
            definition.qualified_name()
        )),
        Err(e) => match e.status() {
            TestStatus::Skipped => skeleton.skipped(e.to_string()),
            _ => skeleton.error(e.to_string()),
        },
    }
}

fn check_unique_devices(devices: &[DeviceHandle]) -> Result<(), RunError> {
    let mut seen = HashSet::with_capacity(devices.len());
    for device in devices {
        if !seen.insert(device.name()) {
            return Err(RunError::DuplicateDevice(device.name().to_string()));
        }
    }
    Ok(())
}
