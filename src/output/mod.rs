//! Output formatting module
//!
//! Handles:
//! - Building the run report from collected results
//! - Human-readable output, grouped by device
//! - JSON output (`{results, summary}`)
//! - Summary statistics rendering

use anyhow::Result;
use std::fmt::Write as _;
use std::time::Duration;

use crate::models::{RunReport, RunStatistics, RunSummary, TestResult, TestStatus};

pub mod progress;

/// Assemble a report; results are ordered by device, then test name
pub fn build_report(mut results: Vec<TestResult>, elapsed: Duration, interrupted: bool) -> RunReport {
    results.sort_by(|a, b| {
        a.device_name
            .cmp(&b.device_name)
            .then_with(|| a.test_name.cmp(&b.test_name))
    });

    RunReport {
        summary: RunSummary {
            statistics: RunStatistics::from_results(&results),
            duration_ms: elapsed.as_millis() as u64,
            interrupted: interrupted.then_some(true),
        },
        results,
    }
}

/// Format output in human-readable format
pub fn format_human(report: &RunReport) -> Result<()> {
    print!("{}", render_human(report)?);
    Ok(())
}

/// Format output as JSON
pub fn format_json(report: &RunReport) -> Result<()> {
    println!("{}", render_json(report)?);
    Ok(())
}

pub fn render_json(report: &RunReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn render_human(report: &RunReport) -> Result<String> {
    let mut out = String::new();

    if report.results.is_empty() {
        writeln!(out, "No checks were run.")?;
    } else {
        let mut current_device: Option<&str> = None;
        for result in &report.results {
            if current_device != Some(result.device_name.as_str()) {
                if current_device.is_some() {
                    writeln!(out)?;
                }
                writeln!(out, "{}:", result.device_name)?;
                current_device = Some(result.device_name.as_str());
            }

            write!(out, "  [{}] {}", status_label(result.status), result.test_name)?;
            if let Some(message) = &result.message {
                write!(out, ": {}", message)?;
            }
            writeln!(out, " ({}ms)", result.duration.as_millis())?;
        }
        writeln!(out)?;
    }

    let summary = &report.summary;
    let stats = &summary.statistics;
    writeln!(out, "Run Summary:")?;
    writeln!(out, "  Total: {}", stats.total)?;
    writeln!(out, "  Success: {}", stats.success)?;
    writeln!(out, "  Failure: {}", stats.failure)?;
    writeln!(out, "  Error: {}", stats.error)?;
    if stats.skipped > 0 {
        writeln!(out, "  Skipped: {}", stats.skipped)?;
    }

    let duration_sec = summary.duration_ms as f64 / 1000.0;
    if duration_sec < 1.0 {
        writeln!(out, "  Duration: {}ms", summary.duration_ms)?;
    } else {
        writeln!(out, "  Duration: {:.2}s", duration_sec)?;
    }

    if let Some(true) = summary.interrupted {
        writeln!(out, "  Status: Interrupted by user")?;
    }

    Ok(out)
}

fn status_label(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Success => "PASS",
        TestStatus::Failure => "FAIL",
        TestStatus::Error => "ERROR",
        TestStatus::Skipped => "SKIP",
        TestStatus::Unset => "UNSET",
    }
}
