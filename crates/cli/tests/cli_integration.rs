// CsrBridge - FPGA Register Bridge Client
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use assert_cmd::Command;
use predicates::prelude::*;
use std::net::TcpListener;
use std::path::PathBuf;
use tempfile::tempdir;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

#[allow(deprecated)]
fn csrbridge() -> Command {
    Command::cargo_bin("csrbridge").unwrap()
}

#[test]
fn test_map_lists_entries_without_device() {
    csrbridge()
        .arg("--map")
        .arg(fixture("csr.csv"))
        .arg("map")
        .assert()
        .success()
        .stdout(predicate::str::contains("timer0_value"))
        .stdout(predicate::str::contains("0x82001828"))
        .stdout(predicate::str::contains("config_clock_frequency"));
}

#[test]
fn test_sim_dump_prints_every_register() {
    let output = csrbridge()
        .arg("--map")
        .arg(fixture("csr.csv"))
        .args(["--sim", "dump"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let csr_lines = stdout.lines().filter(|l| l.starts_with("csr ")).count();
    let mem_lines = stdout.lines().filter(|l| l.starts_with("mem ")).count();
    assert_eq!(csr_lines, 21);
    assert_eq!(mem_lines, 1);
    assert!(stdout.contains("uart_phy_tuning_word"));
}

#[test]
fn test_sim_dump_json() {
    let output = csrbridge()
        .arg("--manifest")
        .arg(fixture("bridge.yaml"))
        .args(["dump", "--json", "--latch"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let lines = json["lines"].as_array().unwrap();
    let en = lines
        .iter()
        .find(|l| l["name"] == "timer0_en")
        .expect("timer0_en missing from dump");
    assert_eq!(en["kind"], "csr");
    assert_eq!(en["value"], serde_json::json!([0]));
    assert_eq!(en["access"], "rw");
}

#[test]
fn test_sim_reset_and_chase() {
    csrbridge()
        .arg("--manifest")
        .arg(fixture("bridge.yaml"))
        .arg("reset")
        .assert()
        .success();

    csrbridge()
        .arg("--manifest")
        .arg(fixture("bridge.yaml"))
        .args(["chase", "--steps", "3", "--period", "0x1000"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Chase finished after 3 steps"));
}

#[test]
fn test_sim_gpio_and_uart_commands() {
    let map = fixture("csr.csv");

    csrbridge()
        .arg("--map")
        .arg(&map)
        .args(["--sim", "gpio", "write", "leds", "0xfe"])
        .assert()
        .success();

    // Each invocation gets a fresh device model.
    csrbridge()
        .arg("--map")
        .arg(&map)
        .args(["--sim", "gpio", "read", "gpio_in"])
        .assert()
        .success()
        .stdout("00\n");

    csrbridge()
        .arg("--map")
        .arg(&map)
        .args(["--sim", "uart", "read", "--nonblocking"])
        .assert()
        .success()
        .stdout("");

    csrbridge()
        .arg("--map")
        .arg(&map)
        .args(["--sim", "uart", "write", "hi"])
        .assert()
        .success();
}

#[test]
fn test_dump_only_reads_the_device() {
    let output = csrbridge()
        .arg("--map")
        .arg(fixture("csr.csv"))
        .args(["--sim", "--trace", "dump"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("read  0x82001820"), "{}", stderr);
    assert!(!stderr.contains("write 0x"), "{}", stderr);
}

fn traced_writes(args: &[&str]) -> Vec<String> {
    let output = csrbridge()
        .arg("--map")
        .arg(fixture("csr.csv"))
        .args(["--sim", "--trace"])
        .args(args)
        .output()
        .unwrap();
    assert!(output.status.success(), "{:?}", args);
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .filter(|l| l.contains("write 0x"))
        .map(str::to_string)
        .collect()
}

#[test]
fn test_gpio_read_leaves_device_untouched() {
    assert!(traced_writes(&["gpio", "read", "leds"]).is_empty());
}

#[test]
fn test_timer_sample_only_latches() {
    let writes = traced_writes(&["timer", "sample"]);
    assert_eq!(writes.len(), 1, "{:?}", writes);
    // timer0_update_value
    assert!(writes[0].contains("write 0x82001824"), "{:?}", writes);
}

#[test]
fn test_gpio_write_rejects_value_wider_than_register() {
    csrbridge()
        .arg("--map")
        .arg(fixture("csr.csv"))
        .args(["--sim", "gpio", "write", "leds", "0x1ff"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("does not fit in a 1-byte register"));
}

#[test]
fn test_map_shows_memory_region_flags() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("csr.csv");
    std::fs::write(&path, "memory_region,rom,0x00000000,32768,cached\n").unwrap();

    csrbridge()
        .arg("--map")
        .arg(&path)
        .arg("map")
        .assert()
        .success()
        .stdout(predicate::str::contains("32768  cached"));
}

#[test]
fn test_unknown_gpio_is_runtime_error() {
    csrbridge()
        .arg("--map")
        .arg(fixture("csr.csv"))
        .args(["--sim", "gpio", "read", "switches"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("switches"));
}

#[test]
fn test_missing_map_is_config_error() {
    let dir = tempdir().unwrap();
    csrbridge()
        .arg("--map")
        .arg(dir.path().join("missing.csv"))
        .arg("map")
        .assert()
        .code(2);

    csrbridge()
        .arg("dump")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--manifest or --map"));
}

#[test]
fn test_malformed_map_reports_line() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("csr.csv");
    std::fs::write(
        &path,
        "csr_base,ctrl,0x82000000,,\ncsr_register,ctrl_reset,82000000,1,rw\n",
    )
    .unwrap();

    csrbridge()
        .arg("--map")
        .arg(&path)
        .arg("map")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("line 2"));
}

#[test]
fn test_unreachable_bridge_is_runtime_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    csrbridge()
        .arg("--map")
        .arg(fixture("csr.csv"))
        .args(["--port", &port.to_string(), "reset"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Cannot reach bridge"));
}
