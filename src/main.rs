#![forbid(unsafe_code)]

mod cli;

use anyhow::{Context, Result};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use cli::{CliCommand, RunArgs};
use netverify::catalog::Catalog;
use netverify::config::Configuration;
use netverify::device::Inventory;
use netverify::logging::init_logging;
use netverify::output;
use netverify::registry::TestRegistry;
use netverify::runner::{normalize_concurrency, ProgressRunner, Runner};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    match cli::parse_args()? {
        CliCommand::ListChecks { json_output } => list_checks(json_output),
        CliCommand::Run(args) => run_checks(args).await,
    }
}

fn list_checks(json_output: bool) -> Result<ExitCode> {
    let registry = TestRegistry::with_builtin_checks()?;
    let checks: Vec<String> = registry
        .list()
        .into_iter()
        .map(|(module, name)| format!("{}/{}", module, name))
        .collect();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&checks)?);
    } else {
        for check in checks {
            println!("{}", check);
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_checks(args: RunArgs) -> Result<ExitCode> {
    let config = Configuration::load_or_default(args.config.as_deref()).context("Failed to load configuration")?;

    let level = args.log_level.as_deref().unwrap_or(&config.output.log_level);
    init_logging(level)?;

    let registry = Arc::new(TestRegistry::with_builtin_checks()?);

    let catalog = Catalog::load_from_file(&args.catalog)
        .with_context(|| format!("Failed to load catalog from {}", args.catalog.display()))?;
    let tests = catalog.select(&args.tags, &args.tests)?;
    if !args.quiet_mode {
        for unknown in catalog.unknown_checks(&registry) {
            log::warn!("Catalog references unregistered check {}", unknown);
        }
    }

    let inventory = Inventory::load_from_file(&args.inventory)
        .with_context(|| format!("Failed to load inventory from {}", args.inventory.display()))?;
    let devices = inventory.build_devices(config.make_cache(inventory.len()));

    let mut runner_config = config.runner_config();
    if let Some(requested) = args.max_concurrency {
        runner_config.max_concurrency = normalize_concurrency(requested);
    }

    let show_progress = config.output.progress && !args.no_progress && !args.quiet_mode;
    let runner = ProgressRunner::new(Runner::new(registry, runner_config), show_progress);

    let token = CancellationToken::new();
    tokio::spawn(cancel_on_signal(token.clone()));

    let start_time = Instant::now();
    let results = runner.run(&token, &tests, &devices).await?;
    let report = output::build_report(results, start_time.elapsed(), token.is_cancelled());

    if args.json_output {
        output::format_json(&report)?;
    } else {
        output::format_human(&report)?;
    }

    if report.summary.statistics.has_failures() && !args.ignore_status {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Cancel `token` on Ctrl-C, or SIGTERM on unix
async fn cancel_on_signal(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                log::warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    log::warn!("Received interrupt signal, cancelling run");
    token.cancel();
}
