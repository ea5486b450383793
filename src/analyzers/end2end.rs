//! End-to-end attack: KASLR break, `/etc/shadow` leak and leak bandwidth.
//!
//! Layout: `out/<host>/<run>/<host>-{kaslr,shadow,benchmark}.out`.

use std::path::Path;

use anyhow::{bail, Context, Result};
use regex::Regex;
use uarch_core::stats;

use super::visible_dirs;

/// `/etc/shadow` root entry of the victim machines.
pub const ROOT_HASH: &str = "root:$6$HGU6y/YF5$rf5na/CbCxzKWRjrkPYDb1oN5ZI7TSxVs8Epz79q9jUyZnIqmmIGYd4lzOVa8I4yyGQ2SSjyd0op5mujCdX4Q.:19755:0:99999:7:::";

/// Secret size of the bandwidth benchmark, in bytes.
pub const LEAK_SIZE: u64 = 1 << 20;

/// Leaked entries with at most this many wrong characters still count as a
/// partial success.
const PARTIAL_MAX_ERRORS: usize = 6;

#[derive(Debug, Clone)]
pub struct Options {
    pub leak_size: u64,
    pub expected_secret: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            leak_size: LEAK_SIZE,
            expected_secret: ROOT_HASH.to_string(),
        }
    }
}

// ─── Parsing ────────────────────────────────────────────────────────────────

pub struct Patterns {
    kaslr: Regex,
    reload_buffer: Regex,
    physmap: Regex,
    shadow_search: Regex,
    shadow_leak: Regex,
    secret_size: Regex,
    secret_leak: Regex,
    mistakes: Regex,
}

impl Patterns {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).with_context(|| format!("compiling pattern {pattern:?}"))
        };
        Ok(Self {
            kaslr: compile(r"^.*kaslr time: (?P<time>\d+\.\d+)s")?,
            reload_buffer: compile(r"^.*rb_offset time:\s+(?P<time>\d+\.\d+)s")?,
            physmap: compile(r"^.*physmap_offset time:\s+(?P<time>\d+\.\d+)s")?,
            shadow_search: compile(r"^.*shadow search time:\s+(?P<time>\d+\.\d+)s")?,
            shadow_leak: compile(r"^.*shadow leak time:\s+(?P<time>\d+\.\d+)s")?,
            secret_size: compile(r"^.*secret_size:\s+(?P<size>\d+)b")?,
            secret_leak: compile(r"^.*secret_leak:\s+(?P<time>\d+\.\d+)s")?,
            mistakes: compile(r"^.*mistakes:\s+(?P<count>\d+)")?,
        })
    }

    /// Time to break KASLR in ms; the last reported time wins.
    pub fn kaslr(&self, content: &str) -> Result<f64> {
        let mut time = None;
        for line in content.lines() {
            if let Some(t) = seconds_as_ms(&self.kaslr, line)? {
                time = Some(t);
            }
        }
        time.context("no `kaslr time` line")
    }

    pub fn shadow(&self, content: &str, secret: &str) -> Result<ShadowLog> {
        let prefix: String = secret.chars().take(5).collect();
        let mut log = ShadowLog::default();
        for line in content.lines() {
            if let Some(t) = seconds_as_ms(&self.reload_buffer, line)? {
                log.reload_buffer_ms = Some(t);
            } else if let Some(t) = seconds_as_ms(&self.physmap, line)? {
                log.physmap_ms = Some(t);
            } else if let Some(t) = seconds_as_ms(&self.shadow_search, line)? {
                log.search_ms = Some(t);
            } else if let Some(t) = seconds_as_ms(&self.shadow_leak, line)? {
                log.leak_ms = Some(t);
            } else if line.starts_with(secret) {
                log.leaked = true;
            } else if line.starts_with(&prefix) && mismatches(line, secret) <= PARTIAL_MAX_ERRORS {
                log.partially_leaked = true;
            }
        }
        Ok(log)
    }

    pub fn bandwidth(&self, content: &str) -> Result<BandwidthLog> {
        let mut log = BandwidthLog::default();
        for line in content.lines() {
            if let Some(size) = integer(&self.secret_size, "size", line)? {
                log.secret_size = Some(size);
            } else if let Some(t) = seconds_as_ms(&self.secret_leak, line)? {
                log.leak_ms = Some(t);
            } else if let Some(count) = integer(&self.mistakes, "count", line)? {
                log.mistakes = Some(count);
            }
        }
        Ok(log)
    }
}

/// Characters of `line` that differ from `expected` at the same position.
fn mismatches(line: &str, expected: &str) -> usize {
    let mut expected = expected.chars();
    line.chars().filter(|c| expected.next() != Some(*c)).count()
}

fn seconds_as_ms(pattern: &Regex, line: &str) -> Result<Option<f64>> {
    let Some(captures) = pattern.captures(line) else {
        return Ok(None);
    };
    let seconds: f64 = captures["time"]
        .parse()
        .with_context(|| format!("invalid time in line {line:?}"))?;
    Ok(Some((seconds * 1000.0).round_ties_even()))
}

fn integer(pattern: &Regex, group: &str, line: &str) -> Result<Option<u64>> {
    let Some(captures) = pattern.captures(line) else {
        return Ok(None);
    };
    let value = captures[group]
        .parse()
        .with_context(|| format!("invalid {group} in line {line:?}"))?;
    Ok(Some(value))
}

// ─── Runs ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShadowLog {
    pub reload_buffer_ms: Option<f64>,
    pub physmap_ms: Option<f64>,
    pub search_ms: Option<f64>,
    pub leak_ms: Option<f64>,
    pub leaked: bool,
    pub partially_leaked: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BandwidthLog {
    pub secret_size: Option<u64>,
    pub leak_ms: Option<f64>,
    pub mistakes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub kaslr_ms: f64,
    pub shadow: ShadowLog,
    pub bandwidth: BandwidthLog,
}

impl Run {
    /// KASLR counts as broken when a later stage got far enough to time a
    /// leak.
    fn kaslr_broken(&self) -> bool {
        self.shadow.leak_ms.is_some() || self.bandwidth.leak_ms.is_some()
    }

    fn time_to_shadow(&self) -> Option<f64> {
        self.shadow.reload_buffer_ms?;
        Some(self.shadow.search_ms? + self.shadow.leak_ms?)
    }
}

pub fn load_run(patterns: &Patterns, run_dir: &Path, host: &str, options: &Options) -> Result<Run> {
    let read = |stage: &str| -> Result<String> {
        let path = run_dir.join(format!("{host}-{stage}.out"));
        std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
    };

    let kaslr_ms = patterns
        .kaslr(&read("kaslr")?)
        .with_context(|| format!("{}: KASLR log", run_dir.display()))?;
    let shadow = patterns
        .shadow(&read("shadow")?, &options.expected_secret)
        .with_context(|| format!("{}: shadow log", run_dir.display()))?;
    let bandwidth = patterns
        .bandwidth(&read("benchmark")?)
        .with_context(|| format!("{}: benchmark log", run_dir.display()))?;

    if let Some(size) = bandwidth.secret_size {
        if size != options.leak_size {
            tracing::warn!(
                run = %run_dir.display(),
                size,
                expected = options.leak_size,
                "secret size differs from the configured leak size"
            );
        }
    }

    Ok(Run {
        kaslr_ms,
        shadow,
        bandwidth,
    })
}

pub fn load(data_dir: &Path, options: &Options) -> Result<Vec<(String, Vec<Run>)>> {
    let patterns = Patterns::new()?;
    let mut hosts = Vec::new();
    for (host, host_dir) in visible_dirs(data_dir)? {
        let runs = visible_dirs(&host_dir)?
            .into_iter()
            .map(|(_, run_dir)| load_run(&patterns, &run_dir, &host, options))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(host = %host, runs = runs.len(), "loaded attack runs");
        hosts.push((host, runs));
    }
    Ok(hosts)
}

// ─── Summary ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub runs: usize,
    pub kaslr_median_ms: f64,
    pub kaslr_success_rate: f64,
    pub reload_buffer_median_ms: Option<f64>,
    pub physmap_median_ms: Option<f64>,
    pub offsets_success_rate: f64,
    pub shadow_median_ms: Option<f64>,
    pub shadow_success_rate: f64,
    pub shadow_partial_success_rate: f64,
    /// KiB/s, one decimal.
    pub leak_rate: Option<f64>,
    /// Fraction of correctly leaked bytes, three decimals.
    pub leak_accuracy: Option<f64>,
}

pub fn summarize(runs: &[Run], options: &Options) -> Result<Summary> {
    if runs.is_empty() {
        bail!("no runs");
    }
    let n = runs.len() as f64;
    let rate = |hits: usize| hits as f64 / n;
    let median_of = |values: Vec<f64>| stats::median(&values).ok();

    let kaslr_times: Vec<f64> = runs.iter().map(|r| r.kaslr_ms).collect();
    let shadow_leaks = runs.iter().filter(|r| r.shadow.leak_ms.is_some()).count();
    let bandwidth_leaks = runs.iter().filter(|r| r.bandwidth.leak_ms.is_some()).count();

    let leak_size = options.leak_size as f64;
    let leak_rate = median_of(runs.iter().filter_map(|r| r.bandwidth.leak_ms).collect())
        .map(|ms| stats::round_to((leak_size / 1024.0) / (ms / 1000.0), 1));
    let leak_accuracy = median_of(
        runs.iter()
            .filter_map(|r| r.bandwidth.mistakes)
            .map(|m| m as f64)
            .collect(),
    )
    .map(|mistakes| stats::round_to((leak_size - mistakes) / leak_size, 3));

    Ok(Summary {
        runs: runs.len(),
        kaslr_median_ms: stats::median(&kaslr_times)?,
        kaslr_success_rate: rate(runs.iter().filter(|r| r.kaslr_broken()).count()),
        reload_buffer_median_ms: median_of(
            runs.iter().filter_map(|r| r.shadow.reload_buffer_ms).collect(),
        ),
        physmap_median_ms: median_of(runs.iter().filter_map(|r| r.shadow.physmap_ms).collect()),
        offsets_success_rate: rate(shadow_leaks + bandwidth_leaks) / 2.0,
        shadow_median_ms: median_of(runs.iter().filter_map(Run::time_to_shadow).collect()),
        shadow_success_rate: rate(runs.iter().filter(|r| r.shadow.leaked).count()),
        shadow_partial_success_rate: rate(
            runs.iter()
                .filter(|r| r.shadow.leaked || r.shadow.partially_leaked)
                .count(),
        ),
        leak_rate,
        leak_accuracy,
    })
}

fn or_na(value: Option<f64>, render: impl Fn(f64) -> String) -> String {
    value.map_or_else(|| "n/a".to_string(), render)
}

/// Whole milliseconds print without a fraction.
fn ms(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}ms")
    } else {
        format!("{value}ms")
    }
}

impl Summary {
    pub fn lines(&self, host: &str) -> Vec<String> {
        vec![
            format!("{host}:"),
            format!("  Total number of runs: {}", self.runs),
            format!("  Median KASLR time: {}", ms(self.kaslr_median_ms)),
            format!("  KASLR success percentage: {:.1}%", 100.0 * self.kaslr_success_rate),
            format!("  Median RB Time: {}", or_na(self.reload_buffer_median_ms, ms)),
            format!("  Median PM Time: {}", or_na(self.physmap_median_ms, ms)),
            format!("  RB/PM success percentage: {:.1}%", 100.0 * self.offsets_success_rate),
            format!(
                "  Median Time to Shadow: {}",
                or_na(self.shadow_median_ms, |v| format!("{:.3}s", v / 1000.0))
            ),
            format!("  Shadow success percentage: {:.1}%", 100.0 * self.shadow_success_rate),
            format!(
                "  Shadow partial success percentage: {:.1}%",
                100.0 * self.shadow_partial_success_rate
            ),
            format!("  Leak Rate: {}", or_na(self.leak_rate, |v| format!("{v:.1}KiB/s"))),
            format!(
                "  Leak Accuracy: {}",
                or_na(self.leak_accuracy, |v| format!("{:.1}%", 100.0 * v))
            ),
            String::new(),
        ]
    }
}

pub fn run(data_dir: &Path, options: &Options) -> Result<()> {
    let hosts = load(data_dir, options)
        .with_context(|| format!("loading attack logs from {}", data_dir.display()))?;
    for (host, runs) in hosts {
        let summary = summarize(&runs, options).with_context(|| format!("host {host}"))?;
        for line in summary.lines(&host) {
            println!("{line}");
        }
    }
    Ok(())
}
