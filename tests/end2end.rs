//! End-to-end attack summaries from raw KASLR, shadow and bandwidth logs.

mod common;

use std::path::Path;

use common::*;
use tempfile::TempDir;

struct RunLogs<'a> {
    kaslr: &'a str,
    shadow: &'a str,
    benchmark: &'a str,
}

fn write_run(out: &Path, host: &str, run: &str, logs: &RunLogs<'_>) {
    let dir = out.join(host).join(run);
    write_file(&dir.join(format!("{host}-kaslr.out")), logs.kaslr);
    write_file(&dir.join(format!("{host}-shadow.out")), logs.shadow);
    write_file(&dir.join(format!("{host}-benchmark.out")), logs.benchmark);
}

const ROOT_ENTRY: &str = "root:$6$HGU6y/YF5$rf5na/CbCxzKWRjrkPYDb1oN5ZI7TSxVs8Epz79q9jUyZnIqmmIGYd4lzOVa8I4yyGQ2SSjyd0op5mujCdX4Q.:19755:0:99999:7:::";

#[test]
fn summary_per_host() {
    let root = TempDir::new().unwrap();
    let out = out_dir(root.path(), "exp-end2end");

    let shadow = format!(
        "[*] rb_offset time: 1.000s\n\
         [*] physmap_offset time: 2.000s\n\
         [*] shadow search time: 3.000s\n\
         [*] shadow leak time: 1.000s\n\
         {ROOT_ENTRY}\n"
    );
    write_run(
        &out,
        "ee-tik-cn139",
        "run-00",
        &RunLogs {
            kaslr: "[+] kaslr time: 0.100s\n",
            shadow: &shadow,
            benchmark: "secret_size: 1048576b\nsecret_leak: 2.000s\nmistakes: 0\n",
        },
    );
    write_run(
        &out,
        "ee-tik-cn139",
        "run-01",
        &RunLogs {
            kaslr: "[+] kaslr time: 0.300s\n",
            shadow: "[-] physmap not found\n",
            benchmark: "",
        },
    );

    let output = run_uarch_in(root.path(), &["end2end"]);
    assert_ok(&output, "end2end");

    let expected = "\
ee-tik-cn139:
  Total number of runs: 2
  Median KASLR time: 200ms
  KASLR success percentage: 50.0%
  Median RB Time: 1000ms
  Median PM Time: 2000ms
  RB/PM success percentage: 50.0%
  Median Time to Shadow: 4.000s
  Shadow success percentage: 50.0%
  Shadow partial success percentage: 50.0%
  Leak Rate: 512.0KiB/s
  Leak Accuracy: 100.0%

";
    assert_eq!(stdout_str(&output), expected);
}

#[test]
fn custom_secret_and_leak_size() {
    let root = TempDir::new().unwrap();
    let out = out_dir(root.path(), "exp-end2end");
    write_run(
        &out,
        "victim",
        "1",
        &RunLogs {
            kaslr: "kaslr time: 0.002s\n",
            shadow: "root:secreX\n",
            benchmark: "secret_leak: 1.000s\nmistakes: 1024\n",
        },
    );

    let output = run_uarch_in(
        root.path(),
        &[
            "end2end",
            "--expected-secret",
            "root:secret",
            "--leak-size",
            "2048",
        ],
    );
    assert_ok(&output, "end2end with options");

    let stdout = stdout_str(&output);
    assert!(stdout.starts_with("victim:\n"));
    assert!(stdout.contains("  Median KASLR time: 2ms\n"));
    assert!(stdout.contains("  Median RB Time: n/a\n"));
    assert!(stdout.contains("  Median Time to Shadow: n/a\n"));
    assert!(stdout.contains("  Shadow success percentage: 0.0%\n"));
    assert!(stdout.contains("  Shadow partial success percentage: 100.0%\n"));
    assert!(stdout.contains("  Leak Rate: 2.0KiB/s\n"));
    assert!(stdout.contains("  Leak Accuracy: 50.0%\n"));
}

#[test]
fn missing_stage_log_is_an_error() {
    let root = TempDir::new().unwrap();
    let out = out_dir(root.path(), "exp-end2end");
    write_file(
        &out.join("victim").join("1").join("victim-kaslr.out"),
        "kaslr time: 0.1s\n",
    );

    let output = run_uarch_in(root.path(), &["end2end"]);
    assert_failed(&output, "end2end without shadow log");
    assert!(stderr_str(&output).contains("victim-shadow.out"));
}
