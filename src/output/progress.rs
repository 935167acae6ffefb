//! Progress indicator for check runs
//!
//! Tracks completed jobs overall and per device, and renders a single
//! status line on stderr while a run is in flight.

use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};

use crate::models::{TestResult, TestStatus};

/// Completed and expected jobs for one device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeviceProgress {
    pub completed: usize,
    pub total: usize,
}

/// Point-in-time copy of a run's progress
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub total: usize,
    /// Results that were not successful so far
    pub problems: usize,
    pub devices: BTreeMap<String, DeviceProgress>,
}

impl ProgressSnapshot {
    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }
}

/// Progress indicator for a running check matrix
pub struct RunProgress {
    devices: BTreeMap<String, DeviceProgress>,
    current_device: Option<String>,
    quiet_mode: bool,
    running: bool,
    total: usize,
    completed: usize,
    problems: usize,
}

impl RunProgress {
    /// Expect `tests_per_device` results from each named device
    pub fn new<I, S>(devices: I, tests_per_device: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let devices: BTreeMap<String, DeviceProgress> = devices
            .into_iter()
            .map(|name| {
                (
                    name.into(),
                    DeviceProgress {
                        completed: 0,
                        total: tests_per_device,
                    },
                )
            })
            .collect();
        let total = devices.len() * tests_per_device;

        Self {
            devices,
            current_device: None,
            quiet_mode: false,
            running: false,
            total,
            completed: 0,
            problems: 0,
        }
    }

    /// Track counts without rendering anything
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet_mode = quiet;
        self
    }

    pub fn start(&mut self) {
        self.running = true;
        self.update_progress();
    }

    /// Count one result
    pub fn record(&mut self, result: &TestResult) {
        self.completed += 1;
        if result.status != TestStatus::Success {
            self.problems += 1;
        }

        let device_done = match self.devices.get_mut(&result.device_name) {
            Some(device) => {
                device.completed += 1;
                device.completed == device.total
            }
            None => false,
        };
        self.current_device = Some(result.device_name.clone());

        // Redraw every 10 results, when a device finishes, and on the last result
        if self.completed % 10 == 0 || device_done || self.completed == self.total {
            self.update_progress();
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            completed: self.completed,
            total: self.total,
            problems: self.problems,
            devices: self.devices.clone(),
        }
    }

    pub fn update_progress(&self) {
        if self.quiet_mode || !self.running {
            return;
        }

        let device_info = match self.current_device.as_ref().and_then(|name| {
            self.devices.get(name).map(|progress| (name, progress))
        }) {
            Some((name, progress)) => format!(" [{} {}/{}]", name, progress.completed, progress.total),
            None => String::new(),
        };

        eprint!(
            "\rChecked {}/{} jobs ({}%, problems: {}){}",
            self.completed,
            self.total,
            self.percent(),
            self.problems,
            device_info
        );
        io::stderr().flush().unwrap_or(());
    }

    /// Print the completion line
    pub fn complete(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;

        if self.quiet_mode {
            return;
        }

        let finished = self.devices.values().filter(|d| d.completed == d.total).count();
        eprint!("\r");
        if self.completed == self.total {
            eprintln!(
                "✓ Checked {}/{} jobs on {} devices - completed",
                self.completed,
                self.total,
                self.devices.len()
            );
        } else {
            eprintln!(
                "✗ Checked {}/{} jobs ({} of {} devices finished) - stopped",
                self.completed,
                self.total,
                finished,
                self.devices.len()
            );
        }
        io::stderr().flush().unwrap_or(());
    }

    fn percent(&self) -> usize {
        if self.total == 0 {
            100
        } else {
            self.completed * 100 / self.total
        }
    }
}

impl Drop for RunProgress {
    fn drop(&mut self) {
        self.complete();
    }
}
