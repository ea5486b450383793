//! Figure analyzers and the `all` command write SVG files where asked.

mod common;

use std::path::Path;

use common::*;
use serde_json::json;
use tempfile::TempDir;

fn write_leak_rounds(root: &Path) {
    let out = out_dir(root, "exp-leak-rounds");
    write_result_set(
        &out,
        "cn139",
        host_metadata("ee-tik-cn139", 0),
        &[
            ("jump_results_btb_attempts", json!([0, 50_000, 100_000])),
            ("dis_jump_results_btb_attempts", json!([0, 0, 1_000])),
        ],
    );
}

fn write_syscall_split(root: &Path) {
    let out = out_dir(root, "exp-syscall-split");
    write_result_set(
        &out,
        "cn122",
        host_metadata("ee-tik-cn122", 0),
        &[
            ("jump_result_btb_wait_supervisor", json!([90_000, 40_000, 0])),
            ("jump_result_btb_wait_user", json!([0, 30_000, 60_000])),
        ],
    );
}

fn assert_svg(path: &Path) -> String {
    let svg = read_file(path);
    assert!(svg.contains("<svg"), "{} is not an SVG", path.display());
    svg
}

#[test]
fn leak_rounds_writes_svg() {
    let root = TempDir::new().unwrap();
    write_leak_rounds(root.path());

    let output = run_uarch_in(root.path(), &["leak-rounds"]);
    assert_ok(&output, "leak-rounds");

    let svg = assert_svg(&root.path().join("figures").join("leak_rounds.svg"));
    assert!(svg.contains("eIBRS + BHI_DIS_S"));
    assert!(svg.contains("Raptor Cove (RPL-R)"));
}

#[test]
fn syscall_split_honors_figures_dir() {
    let root = TempDir::new().unwrap();
    write_syscall_split(root.path());
    let figures = root.path().join("paper-figures");

    let output = run_uarch_in(
        root.path(),
        &["--figures-dir", figures.to_str().unwrap(), "syscall-split"],
    );
    assert_ok(&output, "syscall-split");

    let svg = assert_svg(&figures.join("syscall_split.svg"));
    assert!(svg.contains("kernel"));
    assert!(svg.contains("user"));
}

#[test]
fn btb_delay_writes_one_panel_per_core() {
    let root = TempDir::new().unwrap();
    let out = out_dir(root.path(), "exp-btb-delay");
    for (dir, core) in [("p", 0), ("e", 16)] {
        write_result_set(
            &out,
            dir,
            host_metadata("ee-tik-cn114", core),
            &[
                ("jump_avg_mispredictions", json!([1.0, 1.5, 2.0, 2.0])),
                ("call_avg_mispredictions", json!([1.0, 1.0, 1.0, 1.0])),
            ],
        );
    }

    let output = run_uarch_in(root.path(), &["btb-delay"]);
    assert_ok(&output, "btb-delay");

    let svg = assert_svg(&root.path().join("figures").join("btb_delay.svg"));
    assert!(svg.contains("Golden Cove (ADL)"));
    assert!(svg.contains("Gracemont (ADL)"));
}

#[test]
fn all_runs_experiments_with_data_and_skips_the_rest() {
    let root = TempDir::new().unwrap();
    write_leak_rounds(root.path());
    write_syscall_split(root.path());

    let output = run_uarch_in(root.path(), &["--log-level", "info", "all"]);
    assert_ok(&output, "all");

    assert_svg(&root.path().join("figures").join("leak_rounds.svg"));
    assert_svg(&root.path().join("figures").join("syscall_split.svg"));
    assert!(!root.path().join("figures").join("btb_delay.svg").exists());
    assert!(!root.path().join("tables").exists());
    assert!(stderr_str(&output).contains("no data, skipping"));
}

#[test]
fn all_fails_on_broken_experiment() {
    let root = TempDir::new().unwrap();
    write_leak_rounds(root.path());
    let out = out_dir(root.path(), "exp-bhi-dis-s");
    write_file(&out.join("cn103").join("metadata.json"), "{ not json");
    write_file(&out.join("cn103").join("run.out"), "");

    let output = run_uarch_in(root.path(), &["all"]);
    assert_failed(&output, "all with broken metadata");
    let stderr = stderr_str(&output);
    assert!(stderr.contains("bhi-dis-s"), "stderr: {stderr}");
    assert!(stderr.contains("metadata.json"), "stderr: {stderr}");
}

#[test]
fn empty_experiments_dir_is_not_an_error() {
    let root = TempDir::new().unwrap();
    let output = run_uarch_in(root.path(), &["all"]);
    assert_ok(&output, "all without data");
    assert!(stderr_str(&output).contains("no experiment data found"));
}
