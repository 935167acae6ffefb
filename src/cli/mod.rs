//! CLI argument parsing and validation module
//!
//! Handles command-line interface using clap, including:
//! - Catalog, inventory and config file selection
//! - Test filtering by tag and name
//! - Output format selection (human/JSON)
//! - Progress and quiet modes
//! - Listing the registered checks

use anyhow::{anyhow, bail, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

use netverify::logging::is_valid_level;

const VERSION: &str = concat!(env!("NETVERIFY_VERSION"), " (", env!("GIT_HASH"), ")");

/// What the binary was asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    ListChecks { json_output: bool },
    Run(RunArgs),
}

/// Options for a check run
#[derive(Debug, Clone, PartialEq)]
pub struct RunArgs {
    pub catalog: PathBuf,
    pub inventory: PathBuf,
    pub config: Option<PathBuf>,
    /// Overrides the configured pool size; `<= 0` selects the default
    pub max_concurrency: Option<i64>,
    pub tags: Vec<String>,
    pub tests: Vec<String>,
    pub json_output: bool,
    pub quiet_mode: bool,
    pub no_progress: bool,
    pub log_level: Option<String>,
    pub ignore_status: bool,
}

pub fn build_command() -> Command {
    Command::new("netverify")
        .version(VERSION)
        .about("Run verification checks against network devices")
        .long_about(
            "Runs every selected check from a test catalog against every device of an inventory, \
             with bounded concurrency, and reports one result per (check, device) pair.",
        )
        .arg(
            Arg::new("catalog")
                .long("catalog")
                .value_name("FILE")
                .help("Test catalog (TOML, or JSON with a .json extension)")
                .value_parser(value_parser!(PathBuf))
                .required_unless_present("list-checks"),
        )
        .arg(
            Arg::new("inventory")
                .long("inventory")
                .value_name("FILE")
                .help("Device inventory (TOML, or JSON with a .json extension)")
                .value_parser(value_parser!(PathBuf))
                .required_unless_present("list-checks"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("Configuration file [default: <config dir>/netverify/config.toml]")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("max-concurrency")
                .short('c')
                .long("max-concurrency")
                .value_name("N")
                .help("Maximum number of checks running at once (0 or less uses the default of 10, capped at 1024)")
                .value_parser(value_parser!(i64))
                .allow_negative_numbers(true),
        )
        .arg(
            Arg::new("tags")
                .long("tags")
                .value_name("PATTERN")
                .help("Only run tests with a tag matching PATTERN (exact or glob)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("test")
                .long("test")
                .value_name("PATTERN")
                .help("Only run tests whose name or module/name matches PATTERN (exact or glob)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("json")
                .short('j')
                .long("json")
                .help("Output in JSON format")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Suppress progress and warnings")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-progress")
                .long("no-progress")
                .help("Do not draw the progress line")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level: off, error, warn, info, debug, trace (RUST_LOG takes precedence)"),
        )
        .arg(
            Arg::new("ignore-status")
                .long("ignore-status")
                .help("Exit with 0 even when checks fail")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("list-checks")
                .long("list-checks")
                .help("List registered checks and exit")
                .action(ArgAction::SetTrue),
        )
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliCommand> {
    from_matches(&build_command().get_matches())
}

pub fn from_matches(matches: &ArgMatches) -> Result<CliCommand> {
    let json_output = matches.get_flag("json");

    if matches.get_flag("list-checks") {
        return Ok(CliCommand::ListChecks { json_output });
    }

    let path = |name: &str| {
        matches
            .get_one::<PathBuf>(name)
            .cloned()
            .ok_or_else(|| anyhow!("--{} is required", name))
    };
    let strings = |name: &str| -> Vec<String> {
        matches
            .get_many::<String>(name)
            .map(|values| values.cloned().collect())
            .unwrap_or_default()
    };

    let log_level = matches.get_one::<String>("log-level").cloned();
    if let Some(level) = &log_level {
        if !is_valid_level(level) {
            bail!("Invalid log level: {}", level);
        }
    }

    Ok(CliCommand::Run(RunArgs {
        catalog: path("catalog")?,
        inventory: path("inventory")?,
        config: matches.get_one::<PathBuf>("config").cloned(),
        max_concurrency: matches.get_one::<i64>("max-concurrency").copied(),
        tags: strings("tags"),
        tests: strings("test"),
        json_output,
        quiet_mode: matches.get_flag("quiet"),
        no_progress: matches.get_flag("no-progress"),
        log_level,
        ignore_status: matches.get_flag("ignore-status"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliCommand> {
        let matches = build_command().try_get_matches_from(std::iter::once("netverify").chain(args.iter().copied()))?;
        from_matches(&matches)
    }

    #[test]
    fn test_command_is_well_formed() {
        build_command().debug_assert();
    }

    #[test]
    fn test_run_arguments() {
        let command = parse(&[
            "--catalog", "tests.toml",
            "--inventory", "devices.toml",
            "-c", "4",
            "--tags", "leaf",
            "--tags", "sp*",
            "--test", "VerifyUptime",
            "--json",
            "--ignore-status",
        ])
        .unwrap();

        let CliCommand::Run(args) = command else {
            panic!("expected a run command");
        };
        assert_eq!(args.catalog, PathBuf::from("tests.toml"));
        assert_eq!(args.inventory, PathBuf::from("devices.toml"));
        assert_eq!(args.max_concurrency, Some(4));
        assert_eq!(args.tags, vec!["leaf", "sp*"]);
        assert_eq!(args.tests, vec!["VerifyUptime"]);
        assert!(args.json_output);
        assert!(args.ignore_status);
        assert!(!args.quiet_mode);
        assert!(args.config.is_none());
    }

    #[test]
    fn test_negative_concurrency_accepted() {
        let command = parse(&["--catalog", "a.toml", "--inventory", "b.toml", "-c", "-1"]).unwrap();
        let CliCommand::Run(args) = command else {
            panic!("expected a run command");
        };
        assert_eq!(args.max_concurrency, Some(-1));
    }

    #[test]
    fn test_catalog_and_inventory_required() {
        assert!(parse(&["--inventory", "b.toml"]).is_err());
        assert!(parse(&["--catalog", "a.toml"]).is_err());
    }

    #[test]
    fn test_list_checks_needs_no_files() {
        assert_eq!(
            parse(&["--list-checks", "-j"]).unwrap(),
            CliCommand::ListChecks { json_output: true }
        );
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        assert!(parse(&["--catalog", "a.toml", "--inventory", "b.toml", "--log-level", "loud"]).is_err());
    }
}
