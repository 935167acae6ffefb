mod helpers;

use helpers::netverify;
use predicates::prelude::*;

#[test]
fn test_help_includes_required_options() {
    netverify()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--catalog"))
        .stdout(predicate::str::contains("--inventory"))
        .stdout(predicate::str::contains("--max-concurrency"))
        .stdout(predicate::str::contains("--tags"))
        .stdout(predicate::str::contains("--json"))
        .stdout(predicate::str::contains("--quiet"))
        .stdout(predicate::str::contains("--list-checks"))
        .stdout(predicate::str::contains("--version"));
}

#[test]
fn test_version_includes_git_hash() {
    netverify()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("netverify "))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")))
        .stdout(predicate::str::contains("("));
}

#[test]
fn test_missing_catalog_is_usage_error() {
    netverify()
        .args(["--inventory", "devices.toml"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("--catalog"));
}

#[test]
fn test_list_checks() {
    netverify()
        .arg("--list-checks")
        .assert()
        .success()
        .stdout(predicate::str::contains("configuration/VerifyRunningConfigLines"))
        .stdout(predicate::str::contains("software/VerifyEOSVersion"))
        .stdout(predicate::str::contains("system/VerifyReloadCause"))
        .stdout(predicate::str::contains("system/VerifyUptime"));
}

#[test]
fn test_list_checks_json() {
    let output = netverify()
        .args(["--list-checks", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let checks = helpers::stdout_json(&output);
    assert_eq!(checks.as_array().unwrap().len(), 4);
    assert_eq!(checks[0], "configuration/VerifyRunningConfigLines");
}
