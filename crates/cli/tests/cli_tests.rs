//! CLI integration tests

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::{NamedTempFile, TempDir};

const SNAPSHOT: &str = r#"{
    "nodes": [
        {"name": "node-a", "cpu": 4, "memory": "8Gi", "max_pods": 110, "labels": {"zone": "a"}},
        {"name": "node-b", "cpu": 4, "memory": "8Gi", "max_pods": 110, "labels": {"zone": "b"}}
    ],
    "workloads": [
        {"kind": "Deployment", "name": "web", "replicas": 5,
         "template": {
             "labels": {"app": "web"},
             "containers": [{"name": "web", "resources": {"requests": {"cpu": "500m", "memory": "1Gi"}}}],
             "affinity": {"node_affinity": {"required_terms": [
                 {"match_expressions": [{"key": "zone", "operator": "In", "values": ["a"]}]}
             ]}}
         }}
    ]
}"#;

const PDB_SNAPSHOT: &str = r#"{
    "nodes": [
        {"name": "n1", "cpu": "4", "memory": "8Gi", "max_pods": 110},
        {"name": "n2", "cpu": "4", "memory": "8Gi", "max_pods": 110}
    ],
    "workloads": [
        {"kind": "Pod", "name": "test",
         "template": {"labels": {"app": "test"},
                      "containers": [{"name": "test", "resources": {"requests": {"cpu": "100m"}}}]}}
    ],
    "pdbs": [
        {"name": "test-pdb", "selector": {"match_labels": {"app": "test"}}, "min_available": 1}
    ]
}"#;

fn write_file(contents: &str, suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

/// Run the binary with an isolated home directory so no user config leaks in
fn run(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_kube-reduce"))
        .args(args)
        .env("HOME", home)
        .env("RUST_LOG", "off")
        .env("NO_COLOR", "1")
        .env_remove("KUBE_REDUCE_INPUT")
        .output()
        .expect("Failed to execute command")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn test_cli_help() {
    let home = TempDir::new().unwrap();
    let output = run(home.path(), &["--help"]);
    let stdout = stdout(&output);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Simulate cluster node reduction"));
    assert!(stdout.contains("simulate"), "Should show simulate command");
    assert!(stdout.contains("utilization"), "Should show utilization command");
    assert!(stdout.contains("check-node"), "Should show check-node command");
    assert!(stdout.contains("--input"), "Should show input option");
}

#[test]
fn test_cli_version() {
    let home = TempDir::new().unwrap();
    let output = run(home.path(), &["--version"]);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout(&output).contains("kube-reduce"), "Should show binary name");
}

#[test]
fn test_simulate_json() {
    let home = TempDir::new().unwrap();
    let snapshot = write_file(SNAPSHOT, ".json");
    let path = snapshot.path().to_str().unwrap();

    let output = run(home.path(), &["--input", path, "--format", "json", "simulate"]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let report = json(&output);
    assert_eq!(report["removable_nodes"], serde_json::json!(["node-b"]));
    assert_eq!(report["total_nodes"], 2);
    assert_eq!(report["utilization"]["node-a"]["cpu_ratio"], 0.625);
    assert_eq!(report["unschedulable"], serde_json::json!([]));
}

#[test]
fn test_simulate_table() {
    let home = TempDir::new().unwrap();
    let snapshot = write_file(SNAPSHOT, ".json");
    let path = snapshot.path().to_str().unwrap();

    let output = run(home.path(), &["--input", path, "simulate"]);
    let stdout = stdout(&output);

    assert!(output.status.success());
    assert!(stdout.contains("node-b"));
    assert!(stdout.contains("1 of 2 nodes can be removed"));
}

#[test]
fn test_utilization_json() {
    let home = TempDir::new().unwrap();
    let snapshot = write_file(SNAPSHOT, ".json");
    let path = snapshot.path().to_str().unwrap();

    let output = run(home.path(), &["-i", path, "-f", "json", "utilization"]);

    assert!(output.status.success());
    let utilization = json(&output);
    assert_eq!(utilization["node-a"]["memory_ratio"], 0.625);
    assert_eq!(utilization["node-b"]["cpu_ratio"], 0.0);
}

#[test]
fn test_check_node_respects_pdb() {
    let home = TempDir::new().unwrap();
    let snapshot = write_file(PDB_SNAPSHOT, ".json");
    let path = snapshot.path().to_str().unwrap();

    let blocked = run(home.path(), &["-i", path, "-f", "json", "check-node", "n1"]);
    assert!(blocked.status.success());
    assert_eq!(json(&blocked)["removable"], false);

    let free = run(home.path(), &["-i", path, "-f", "json", "check-node", "n2"]);
    assert_eq!(json(&free)["removable"], true);
}

#[test]
fn test_check_unknown_node_fails() {
    let home = TempDir::new().unwrap();
    let snapshot = write_file(PDB_SNAPSHOT, ".json");
    let path = snapshot.path().to_str().unwrap();

    let output = run(home.path(), &["-i", path, "check-node", "n9"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("node not found: n9"));
}

#[test]
fn test_invalid_snapshot_fails() {
    let home = TempDir::new().unwrap();
    let snapshot = write_file("{\"nodes\": [{\"name\": \"n1\"}]}", ".json");
    let path = snapshot.path().to_str().unwrap();

    let output = run(home.path(), &["-i", path, "simulate"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to parse cluster snapshot"));
}

#[test]
fn test_missing_snapshot_fails() {
    let home = TempDir::new().unwrap();
    let output = run(home.path(), &["-i", "/nonexistent/snapshot.json", "simulate"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to read snapshot"));
}

#[test]
fn test_config_file_changes_headroom() {
    let home = TempDir::new().unwrap();
    let snapshot = write_file(SNAPSHOT, ".json");
    let path = snapshot.path().to_str().unwrap();
    // 2500m of web pods no longer fit under a 50% cpu headroom
    let config = write_file("cpu_headroom = 0.5\n", ".toml");
    let config_path = config.path().to_str().unwrap();

    let output = run(
        home.path(),
        &["-i", path, "-c", config_path, "-f", "json", "simulate"],
    );

    assert!(output.status.success());
    let report = json(&output);
    assert_eq!(report["unschedulable"][0]["placed"], 4);
    assert_eq!(report["unschedulable"][0]["reason"], "not enough cpu on 1 node, node affinity unsatisfied on 1 node");
}

#[test]
fn test_invalid_headroom_from_environment() {
    let home = TempDir::new().unwrap();
    let snapshot = write_file(SNAPSHOT, ".json");
    let path = snapshot.path().to_str().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_kube-reduce"))
        .args(["-i", path, "simulate"])
        .env("HOME", home.path())
        .env("RUST_LOG", "off")
        .env("KUBE_REDUCE_POD_HEADROOM", "2.0")
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid configuration"));
}

#[test]
fn test_invalid_command() {
    let home = TempDir::new().unwrap();
    let output = run(home.path(), &["-i", "x.json", "invalid-command"]);

    assert!(!output.status.success(), "Invalid command should fail");
}
