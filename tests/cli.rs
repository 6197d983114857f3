// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

struct TestEnv {
    dir: TempDir,
}

impl TestEnv {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    /// Command isolated from any ambient configuration file or environment.
    fn tablelock(&self) -> Command {
        let mut cmd = Command::cargo_bin("tablelock").unwrap();
        cmd.current_dir(self.dir.path())
            .env_remove("TABLELOCK__TABLE_NAME")
            .env_remove("TABLELOCK__LOCK_TIMEOUT_SECONDS")
            .env_remove("TABLELOCK__RETRY__ENABLED")
            .env_remove("RUST_LOG")
            .arg("--store-dir")
            .arg(self.dir.path().join("store"))
            .args(["--table", "locks"]);
        cmd
    }
}

#[test]
fn help_lists_commands() {
    Command::cargo_bin("tablelock")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("acquire"))
        .stdout(contains("release"))
        .stdout(contains("status"))
        .stdout(contains("run"))
        .stdout(contains("--store-dir"));
}

#[test]
fn acquire_status_release_round_trip() {
    let env = TestEnv::new();

    env.tablelock()
        .args(["acquire", "nightly", "--owner", "worker-1"])
        .assert()
        .success()
        .stdout(contains("Acquired"))
        .stdout(contains("worker-1"));

    let output = env
        .tablelock()
        .args(["status", "nightly", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["resource_id"], "nightly");
    assert_eq!(report["state"], "held");
    assert_eq!(report["owner_id"], "worker-1");

    env.tablelock()
        .args(["release", "nightly", "--owner", "worker-1"])
        .assert()
        .success()
        .stdout(contains("Released"));

    env.tablelock()
        .args(["status", "nightly", "--json"])
        .assert()
        .success()
        .stdout(contains("\"free\""));
}

#[test]
fn quiet_acquire_prints_generated_owner() {
    let env = TestEnv::new();

    let output = env
        .tablelock()
        .args(["acquire", "nightly", "--quiet"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let owner = String::from_utf8(output.stdout).unwrap();
    let owner = owner.trim();
    assert!(owner.contains('-'));

    env.tablelock()
        .args(["release", "nightly", "--owner", owner])
        .assert()
        .success();
}

#[test]
fn contended_acquire_exits_with_three() {
    let env = TestEnv::new();

    env.tablelock()
        .args(["acquire", "nightly", "--owner", "worker-1"])
        .assert()
        .success();

    env.tablelock()
        .args(["acquire", "nightly", "--owner", "worker-2"])
        .assert()
        .code(3)
        .stderr(contains("held by another owner"))
        .stderr(contains("worker-1"));
}

#[test]
fn release_by_non_owner_exits_with_three() {
    let env = TestEnv::new();

    env.tablelock()
        .args(["acquire", "nightly", "--owner", "worker-1"])
        .assert()
        .success();

    env.tablelock()
        .args(["release", "nightly", "--owner", "worker-2"])
        .assert()
        .code(3)
        .stderr(contains("does not hold"));
}

#[test]
fn blank_resource_is_invalid_input() {
    let env = TestEnv::new();

    env.tablelock()
        .args(["acquire", "  ", "--owner", "worker-1"])
        .assert()
        .code(2)
        .stderr(contains("Invalid argument"));
}

#[test]
fn missing_table_is_a_configuration_error() {
    let env = TestEnv::new();

    Command::cargo_bin("tablelock")
        .unwrap()
        .current_dir(env.dir.path())
        .env_remove("TABLELOCK__TABLE_NAME")
        .args(["status", "nightly"])
        .assert()
        .code(2)
        .stderr(contains("TABLELOCK__TABLE_NAME"));
}

#[test]
fn config_reflects_file_and_environment() {
    let env = TestEnv::new();
    std::fs::write(
        env.dir.path().join("tablelock.toml"),
        "table_name = \"from-file\"\nlock_timeout_seconds = 45\n",
    )
    .unwrap();

    Command::cargo_bin("tablelock")
        .unwrap()
        .current_dir(env.dir.path())
        .env("TABLELOCK__RETRY__ENABLED", "true")
        .arg("config")
        .assert()
        .success()
        .stdout(contains("table_name = \"from-file\""))
        .stdout(contains("lock_timeout_seconds = 45"))
        .stdout(contains("enabled = true"));
}

#[test]
fn invalid_configuration_is_rejected() {
    let env = TestEnv::new();

    env.tablelock()
        .args(["--timeout", "0", "status", "nightly"])
        .assert()
        .code(2)
        .stderr(contains("lock_timeout_seconds"));
}

#[cfg(unix)]
#[test]
fn run_propagates_exit_code_and_releases() {
    let env = TestEnv::new();

    env.tablelock()
        .args(["run", "nightly", "--owner", "worker-1", "--", "sh", "-c", "exit 7"])
        .assert()
        .code(7);

    env.tablelock()
        .args(["status", "nightly"])
        .assert()
        .success()
        .stdout(contains("free"));
}

#[cfg(unix)]
#[test]
fn run_refuses_while_lock_is_held() {
    let env = TestEnv::new();
    let marker = env.dir.path().join("ran");

    env.tablelock()
        .args(["acquire", "nightly", "--owner", "worker-1"])
        .assert()
        .success();

    env.tablelock()
        .args(["run", "nightly", "--", "touch"])
        .arg(&marker)
        .assert()
        .code(3);
    assert!(predicate::path::missing().eval(&marker));
}
