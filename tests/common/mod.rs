#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;

pub fn uarch_bin() -> &'static str {
    env!("CARGO_BIN_EXE_uarch-analyze")
}

const ENV_VARS: [&str; 6] = [
    "UARCH_EXPERIMENTS_DIR",
    "UARCH_TABLES_DIR",
    "UARCH_FIGURES_DIR",
    "UARCH_REGISTRY",
    "UARCH_STRICT",
    "UARCH_LOG",
];

/// Clear inherited configuration and point every output at `root`.
pub fn isolate_env(cmd: &mut Command, root: &Path) {
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.current_dir(root);
    cmd.env("UARCH_EXPERIMENTS_DIR", root.join("experiments"));
    cmd.env("UARCH_TABLES_DIR", root.join("tables"));
    cmd.env("UARCH_FIGURES_DIR", root.join("figures"));
}

/// Run the analyzer with `root` as experiments/tables/figures parent.
pub fn run_uarch_in(root: &Path, args: &[&str]) -> Output {
    run_uarch_in_with_env(root, args, &[])
}

pub fn run_uarch_in_with_env(root: &Path, args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut cmd = Command::new(uarch_bin());
    isolate_env(&mut cmd, root);
    cmd.args(args);
    for (k, v) in env {
        cmd.env(k, v);
    }
    cmd.output().expect("run uarch-analyze")
}

pub fn assert_ok(output: &Output, context: &str) {
    assert!(
        output.status.success(),
        "{context} failed (status {:?})\nstdout:\n{}\nstderr:\n{}",
        output.status.code(),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

pub fn assert_failed(output: &Output, context: &str) {
    assert!(
        !output.status.success(),
        "{context} unexpectedly succeeded\nstdout:\n{}",
        String::from_utf8_lossy(&output.stdout)
    );
}

pub fn stdout_str(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr_str(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

// ─── Fixtures ─────────────────────────────────────────────────────────────────

/// `<root>/experiments/<experiment>/out`
pub fn out_dir(root: &Path, experiment: &str) -> PathBuf {
    let dir = root.join("experiments").join(experiment).join("out");
    std::fs::create_dir_all(&dir).expect("create out dir");
    dir
}

/// Write one result set: `<out>/<name>/{metadata.json,run.out}`.
pub fn write_result_set(out: &Path, name: &str, metadata: Value, data: &[(&str, Value)]) {
    let dir = out.join(name);
    std::fs::create_dir_all(&dir).expect("create result set dir");
    std::fs::write(dir.join("metadata.json"), metadata.to_string()).expect("write metadata");

    let mut run = String::from("some experiment chatter\n### RESULTS START ###\n");
    for (key, value) in data {
        run.push_str(&format!("{key} = {value}\n"));
    }
    run.push_str("### RESULTS END ###\n");
    std::fs::write(dir.join("run.out"), run).expect("write run.out");
}

pub fn host_metadata(hostname: &str, core: u64) -> Value {
    serde_json::json!({ "hostname": hostname, "experiment_core": core })
}

pub fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dir");
    }
    std::fs::write(path, content).expect("write fixture file");
}

pub fn read_file(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}
