//! Command-line tests against the built binary

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::{Value, json};

fn write_schema(dir: &Path, name: &str, schema: &Value) -> PathBuf {
    let path = dir.join(format!("{name}.json"));
    std::fs::write(&path, serde_json::to_string(schema).unwrap()).unwrap();
    path
}

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_provider-mux"))
        .args(args)
        .env_remove("PROVIDER_MUX_CONFIG")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn network_schema() -> Value {
    json!({
        "resource_schemas": { "net_vpc": { "version": 1 } },
        "data_source_schemas": { "net_zones": {} }
    })
}

fn storage_schema() -> Value {
    json!({
        "resource_schemas": { "store_bucket": {} },
        "functions": { "store_path": {} }
    })
}

#[test]
fn test_check_succeeds_for_disjoint_schemas() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_schema(dir.path(), "network", &network_schema());
    let b = write_schema(dir.path(), "storage", &storage_schema());

    let output = run(&["check", a.to_str().unwrap(), b.to_str().unwrap()]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 backend(s) combine into 4 route(s)"));
    assert!(stdout.contains("(protocol v6)"));
}

#[test]
fn test_check_fails_on_duplicate_claim() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_schema(dir.path(), "network", &network_schema());
    let b = write_schema(dir.path(), "copy", &network_schema());

    let output = run(&["check", a.to_str().unwrap(), b.to_str().unwrap()]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("\"net_vpc\" is declared by both backend 0 and backend 1"));
}

#[test]
fn test_routes_json_lists_every_route() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_schema(dir.path(), "network", &network_schema());
    let b = write_schema(dir.path(), "storage", &storage_schema());

    let output = run(&[
        "routes",
        "--format",
        "json",
        a.to_str().unwrap(),
        b.to_str().unwrap(),
    ]);

    assert!(output.status.success());
    let routes: Vec<Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(routes.len(), 4);
    assert!(routes.contains(&json!({
        "namespace": "function",
        "type_name": "store_path",
        "backend": 1,
        "backend_name": "storage",
    })));
}

#[test]
fn test_routes_uses_configured_backends() {
    let dir = tempfile::tempdir().unwrap();
    write_schema(dir.path(), "network", &network_schema());
    write_schema(dir.path(), "storage", &storage_schema());
    let config = dir.path().join("mux.yaml");
    std::fs::write(
        &config,
        "backends:\n  - name: net\n    schema: network.json\n  - name: store\n    schema: storage.json\n    enabled: false\n",
    )
    .unwrap();

    let output = run(&["routes", "--config", config.to_str().unwrap()]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 route(s) across 1 backend(s)"));
    assert!(stdout.contains("net_vpc"));
    assert!(!stdout.contains("store_bucket"));
}

#[test]
fn test_no_schemas_is_an_error() {
    let output = run(&["check"]);
    assert!(!output.status.success());
}
