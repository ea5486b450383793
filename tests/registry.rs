//! Host registry behavior seen from the command line: listing, custom
//! registries, result ordering and strict mode.

mod common;

use std::path::Path;

use common::*;
use serde_json::{json, Value};
use tempfile::TempDir;

const LAB_REGISTRY: &str = r#"
[core_types.big]
march = "Big Core"
type = "P-Core"

[core_types.little]
march = "Little Core"
type = "E-Core"

[[hosts]]
id = "lab-02"
code_name = "Second Box"
cores = [{ core = "big" }]

[[hosts]]
id = "lab-01"
code_name = "First Box"
name = "Engineering Sample"
cores = [{ core = "big", count = 2 }, { core = "little", count = 4 }]
"#;

fn write_registry(root: &Path) -> String {
    let path = root.join("lab.toml");
    write_file(&path, LAB_REGISTRY);
    path.to_str().unwrap().to_string()
}

fn write_discern_set(out: &Path, dir: &str, host: &str, core: u64) {
    let mut data = Vec::new();
    for inst in ["jump", "call", "ret"] {
        data.push((format!("{inst}_hits_per_round_btb_count_gt0"), json!(1_000)));
        data.push((format!("{inst}_hits_per_round_ibp_count_gt0"), json!(2_000)));
        data.push((format!("{inst}_hits_per_round_check_count_gt0"), json!(0)));
    }
    let data: Vec<(&str, Value)> = data.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
    write_result_set(out, dir, host_metadata(host, core), &data);
}

#[test]
fn hosts_lists_builtin_registry_in_display_order() {
    let root = TempDir::new().unwrap();
    let output = run_uarch_in(root.path(), &["hosts"]);
    assert_ok(&output, "hosts");

    let stdout = stdout_str(&output);
    let mut lines = stdout.lines();
    assert_eq!(
        lines.next(),
        Some("ee-tik-cn139  Raptor Lake Refresh (Core i7-14700K)")
    );
    assert_eq!(lines.next(), Some("    cores 0-15: Raptor Cove (RPL-R) [P-Core]"));
    assert_eq!(lines.next(), Some("    cores 16-27: Gracemont (RPL-R) [E-Core]"));

    let cn139 = stdout.find("ee-tik-cn139").unwrap();
    let cn103 = stdout.find("ee-tik-cn103").unwrap();
    let pixel = stdout.find("pixel-6").unwrap();
    assert!(cn139 < cn103 && cn103 < pixel);
}

#[test]
fn hosts_json_uses_custom_registry() {
    let root = TempDir::new().unwrap();
    let registry = write_registry(root.path());

    let output = run_uarch_in(root.path(), &["--registry", &registry, "hosts", "--json"]);
    assert_ok(&output, "hosts --json");

    let hosts: Value = serde_json::from_str(&stdout_str(&output)).unwrap();
    let hosts = hosts.as_array().unwrap();
    assert_eq!(hosts.len(), 2);
    assert_eq!(hosts[0]["id"], "lab-02");
    assert_eq!(hosts[0]["name"], Value::Null);
    assert_eq!(hosts[1]["code_name"], "First Box");
    assert_eq!(hosts[1]["cores"].as_array().unwrap().len(), 6);
    assert_eq!(hosts[1]["cores"][5]["march"], "Little Core");
    assert_eq!(hosts[1]["cores"][5]["type"], "E-Core");
}

#[test]
fn registry_from_environment() {
    let root = TempDir::new().unwrap();
    let registry = write_registry(root.path());

    let output = run_uarch_in_with_env(root.path(), &["hosts"], &[("UARCH_REGISTRY", &registry)]);
    assert_ok(&output, "hosts with UARCH_REGISTRY");
    let stdout = stdout_str(&output);
    assert!(stdout.starts_with("lab-02  Second Box\n    core 0: Big Core [P-Core]\n"));
    assert!(stdout.contains("lab-01  First Box (Engineering Sample)"));
}

#[test]
fn invalid_registry_is_reported() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("broken.toml");
    write_file(
        &path,
        "[[hosts]]\nid = \"x\"\ncode_name = \"X\"\ncores = [{ core = \"nope\" }]\n",
    );

    let output = run_uarch_in(root.path(), &["--registry", path.to_str().unwrap(), "hosts"]);
    assert_failed(&output, "hosts with broken registry");
    assert!(stderr_str(&output).contains("unknown core type `nope`"));
}

#[test]
fn dump_prints_sets_in_registry_then_core_order() {
    let root = TempDir::new().unwrap();
    let registry = write_registry(root.path());
    let out = out_dir(root.path(), "exp-leak-supervisor-discern");
    write_discern_set(&out, "a", "lab-01", 5);
    write_discern_set(&out, "b", "lab-01", 0);
    write_discern_set(&out, "c", "lab-02", 0);

    let output = run_uarch_in(
        root.path(),
        &["--registry", &registry, "dump", "leak-supervisor-discern"],
    );
    assert_ok(&output, "dump");

    let sets: Value = serde_json::from_str(&stdout_str(&output)).unwrap();
    let order: Vec<(String, u64)> = sets
        .as_array()
        .unwrap()
        .iter()
        .map(|s| {
            (
                s["metadata"]["hostname"].as_str().unwrap().to_string(),
                s["metadata"]["experiment_core"].as_u64().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        order,
        vec![
            ("lab-02".to_string(), 0),
            ("lab-01".to_string(), 0),
            ("lab-01".to_string(), 5),
        ]
    );
}

#[test]
fn dump_rejects_raw_log_experiments() {
    let root = TempDir::new().unwrap();
    let output = run_uarch_in(root.path(), &["dump", "end2end"]);
    assert_failed(&output, "dump end2end");
    assert!(stderr_str(&output).contains("no result sets to dump"));
}

#[test]
fn unknown_host_is_dropped_with_a_warning() {
    let root = TempDir::new().unwrap();
    let out = out_dir(root.path(), "exp-leak-supervisor-discern");
    write_discern_set(&out, "known", "ee-tik-cn126", 0);
    write_discern_set(&out, "stranger", "ee-tik-cn999", 0);

    let output = run_uarch_in(root.path(), &["leak-supervisor-discern"]);
    assert_ok(&output, "leak-supervisor-discern");

    let stdout = stdout_str(&output);
    assert_eq!(stdout.matches("Server: ").count(), 1);
    assert!(stdout.contains("Server: Zen 4"));
    assert!(stdout.contains("BTB (jmp, call, ret, noise): 1.0%, 1.0%, 1.0%, 0.0%"));
    assert!(stderr_str(&output).contains("ee-tik-cn999"));
}

#[test]
fn strict_mode_rejects_unknown_hosts() {
    let root = TempDir::new().unwrap();
    let out = out_dir(root.path(), "exp-leak-supervisor-discern");
    write_discern_set(&out, "known", "ee-tik-cn126", 0);
    write_discern_set(&out, "stranger", "ee-tik-cn999", 0);

    let output = run_uarch_in(root.path(), &["--strict", "leak-supervisor-discern"]);
    assert_failed(&output, "strict leak-supervisor-discern");
    let stderr = stderr_str(&output);
    assert!(stderr.contains("hosts missing from registry: ee-tik-cn999"), "stderr: {stderr}");
    assert!(stdout_str(&output).is_empty());

    let output = run_uarch_in_with_env(
        root.path(),
        &["leak-supervisor-discern"],
        &[("UARCH_STRICT", "true")],
    );
    assert_failed(&output, "UARCH_STRICT leak-supervisor-discern");
}

#[test]
fn core_out_of_range_falls_back_unless_strict() {
    let root = TempDir::new().unwrap();
    let out = out_dir(root.path(), "exp-leak-supervisor-discern");
    write_discern_set(&out, "zen", "ee-tik-cn126", 64);

    let output = run_uarch_in(root.path(), &["leak-supervisor-discern"]);
    assert_ok(&output, "leak-supervisor-discern");
    assert!(stdout_str(&output).contains("Server: Zen 4 (core 64)"));

    let output = run_uarch_in(root.path(), &["--strict", "leak-supervisor-discern"]);
    assert_failed(&output, "strict leak-supervisor-discern");
    assert!(stderr_str(&output).contains("no core 64"));
}
