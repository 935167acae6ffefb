mod helpers;

use helpers::{stdout_json, Fixture, CATALOG, DEGRADED_INVENTORY, HEALTHY_INVENTORY};

#[test]
fn test_json_output_shape() {
    let fixture = Fixture::new(CATALOG, HEALTHY_INVENTORY);

    let output = fixture.command().arg("--json").assert().success().get_output().stdout.clone();
    let json = stdout_json(&output);

    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 6);
    for result in results {
        assert_eq!(result["status"], "success");
        assert!(result["duration_ms"].is_u64());
        assert!(result["timestamp"].is_string());
        assert!(result.get("message").is_none());
    }

    let summary = &json["summary"];
    assert_eq!(summary["total"], 6);
    assert_eq!(summary["success"], 6);
    assert_eq!(summary["failure"], 0);
    assert_eq!(summary["error"], 0);
    assert_eq!(summary["skipped"], 0);
    assert!(summary.get("interrupted").is_none());
}

#[test]
fn test_json_results_sorted_by_device_then_test() {
    let fixture = Fixture::new(CATALOG, HEALTHY_INVENTORY);

    let output = fixture.command().arg("-j").assert().success().get_output().stdout.clone();
    let json = stdout_json(&output);

    let order: Vec<(String, String)> = json["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| {
            (
                r["device_name"].as_str().unwrap().to_string(),
                r["test_name"].as_str().unwrap().to_string(),
            )
        })
        .collect();

    let mut sorted = order.clone();
    sorted.sort();
    assert_eq!(order, sorted);
}

#[test]
fn test_json_reports_failures_and_categories() {
    let fixture = Fixture::new(CATALOG, DEGRADED_INVENTORY);

    let output = fixture.command().arg("--json").assert().code(1).get_output().stdout.clone();
    let json = stdout_json(&output);

    let uptime = json["results"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["device_name"] == "leaf1" && r["test_name"] == "VerifyUptime")
        .unwrap();

    assert_eq!(uptime["status"], "failure");
    assert_eq!(uptime["categories"][0], "system");
    assert_eq!(uptime["details"]["minimum"], 3600);

    assert_eq!(json["summary"]["failure"], 1);
    assert_eq!(json["summary"]["error"], 3);
}

#[test]
fn test_json_catalog_and_inventory_files() {
    let fixture = Fixture::new(CATALOG, HEALTHY_INVENTORY);
    let catalog = fixture.write(
        "catalog.json",
        r#"{"tests": [{"module": "system", "name": "VerifyReloadCause"}]}"#,
    );
    let inventory = fixture.write(
        "inventory.json",
        r#"{"devices": [{"name": "leaf1", "outputs": {"show reload cause": "{\"resetCauses\": []}"}}]}"#,
    );

    let output = helpers::netverify()
        .arg("--catalog")
        .arg(&catalog)
        .arg("--inventory")
        .arg(&inventory)
        .arg("--config")
        .arg(fixture.path("config.toml"))
        .arg("--json")
        .assert()
        .code(1)
        .get_output()
        .stdout
        .clone();
    let json = stdout_json(&output);

    assert_eq!(json["results"][0]["status"], "failure");
    assert_eq!(json["results"][0]["message"], "No reload causes available");
}
