#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Catalog exercising every bundled check
pub const CATALOG: &str = r#"
[[tests]]
module = "system"
name = "VerifyUptime"
tags = ["leaf", "spine"]

[tests.inputs]
minimum = 3600

[[tests]]
module = "software"
name = "VerifyEOSVersion"
tags = ["spine"]

[tests.inputs]
versions = ["4.31.1F"]

[[tests]]
module = "configuration"
name = "VerifyRunningConfigLines"
tags = ["leaf"]

[tests.inputs]
regex_patterns = ["^ip routing$"]
"#;

/// Two devices on which every check passes
pub const HEALTHY_INVENTORY: &str = r#"
[[devices]]
name = "leaf1"

[devices.outputs]
"show uptime" = { upTime = 86400.0 }
"show version" = { version = "4.31.1F" }
"show running-config" = "hostname leaf1\nip routing\n"

[[devices]]
name = "spine1"

[devices.outputs]
"show uptime" = { upTime = 7200.0 }
"show version" = { version = "4.31.1F" }
"show running-config" = "hostname spine1\nip routing\n"
"#;

/// leaf1 was just rebooted, spine1 is unreachable
pub const DEGRADED_INVENTORY: &str = r#"
[[devices]]
name = "leaf1"

[devices.outputs]
"show uptime" = { upTime = 120.0 }
"show version" = { version = "4.31.1F" }
"show running-config" = "hostname leaf1\nip routing\n"

[[devices]]
name = "spine1"
established = false
"#;

/// Temporary directory holding catalog, inventory and config files
pub struct Fixture {
    pub temp_dir: TempDir,
}

impl Fixture {
    pub fn new(catalog: &str, inventory: &str) -> Self {
        let fixture = Fixture {
            temp_dir: tempfile::tempdir().unwrap(),
        };
        fixture.write("catalog.toml", catalog);
        fixture.write("inventory.toml", inventory);
        fixture.write("config.toml", "[output]\nprogress = false\nlog_level = \"error\"\n");
        fixture
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, content).unwrap();
        path
    }

    /// `netverify` preloaded with this fixture's files
    pub fn command(&self) -> Command {
        let mut cmd = netverify();
        cmd.arg("--catalog")
            .arg(self.path("catalog.toml"))
            .arg("--inventory")
            .arg(self.path("inventory.toml"))
            .arg("--config")
            .arg(self.path("config.toml"));
        cmd
    }
}

pub fn netverify() -> Command {
    let mut cmd = Command::cargo_bin("netverify").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

pub fn stdout_json(output: &[u8]) -> serde_json::Value {
    serde_json::from_slice(output).expect("stdout should be valid JSON")
}
