//! Performance overhead of IPRED_DIS_S and retpolines, measured with
//! UnixBench and LMbench.
//!
//! Layout: `out/<host>/<configuration>/{unixbench,lmbench}/<run file>`. The
//! `baseline` configuration is the reference for every other one.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use regex::Regex;
use uarch_core::latex::{self, Row, Shade, Tabular};
use uarch_core::stats::{self, Direction};
use uarch_core::HostRecord;

use super::visible_dirs;
use crate::settings::{self, Settings};

pub const TABLE_FILE: &str = "mitigations.tex";

const BASELINE: &str = "baseline";
/// Configurations with a table column, in column order.
const COLUMNS: [&str; 2] = ["ipred", "retpoline"];
const MICROCODE: &str = "microcode";

const UNIXBENCH_DIR: &str = "unixbench";
const LMBENCH_DIR: &str = "lmbench";

const UNIXBENCH_PATTERN: &str = r"^.+(\d+\.\d)\s+(?P<result>\d+\.\d)\s+(\d+\.\d)";
const LMBENCH_PATTERN: &str = r"^.+: (?P<result>\d+\.\d+) .+";

/// Index-score lines after the single-copy header.
const UNIXBENCH_SCORE_LINES: std::ops::Range<usize> = 15..27;

const LMBENCH_METRICS: [&str; 19] = [
    "Simple syscall",
    "Simple read",
    "Simple write",
    "Simple stat",
    "Simple fstat",
    "Simple open/close",
    "Select on 10 fd's",
    "Signal handler installation",
    "Signal handler overhead",
    "Protection fault",
    "Pipe latency",
    "AF_UNIX sock stream latency",
    "Process fork+exit",
    "Process fork+execve",
    "Process fork+/bin/sh -c",
    "Pagefaults on /var/tmp/XXX",
    "UDP latency using localhost",
    "TCP latency using localhost",
    "TCP/IP connection cost to localhost",
];

const HEADER: &str = r"\begin{tabular}{lcc}
    \hline
    \multirow{2}{*}{\textbf{CPU}} & \multicolumn{2}{c}{\textbf{Mitigation}}                          \\
                                       & \textit{IPRED\_DIS\_S}                  & \textit{Retpoline}     \\
    \hline
";

const FOOTER: &str = r"    \hline
\end{tabular}
";

// ─── Parsing ────────────────────────────────────────────────────────────────

pub struct Parsers {
    unixbench: Regex,
    lmbench: Regex,
}

impl Parsers {
    pub fn new() -> Result<Self> {
        Ok(Self {
            unixbench: Regex::new(UNIXBENCH_PATTERN).context("compiling UnixBench pattern")?,
            lmbench: Regex::new(LMBENCH_PATTERN).context("compiling LMbench pattern")?,
        })
    }

    /// Index scores of one single-copy UnixBench run, in report order.
    pub fn unixbench_run(&self, content: &str) -> Result<Vec<f64>> {
        let mut lines = content.lines();
        if !lines.any(|l| l.contains("running 1 parallel")) {
            bail!("no single-copy section");
        }
        if !lines.any(|l| l.contains("parallel copies")) {
            bail!("no score header after the single-copy section");
        }

        let scores: Vec<&str> = lines
            .skip(UNIXBENCH_SCORE_LINES.start)
            .take(UNIXBENCH_SCORE_LINES.len())
            .collect();
        if scores.len() < UNIXBENCH_SCORE_LINES.len() {
            tracing::warn!(lines = scores.len(), "truncated UnixBench score block");
        }
        scores
            .into_iter()
            .map(|line| capture_result(&self.unixbench, line))
            .collect()
    }

    /// Latencies of one LMbench run for the lines naming a tracked metric.
    pub fn lmbench_run(&self, content: &str) -> Result<Vec<f64>> {
        content
            .lines()
            .filter(|line| LMBENCH_METRICS.iter().any(|m| line.contains(m)))
            .map(|line| capture_result(&self.lmbench, line))
            .collect()
    }
}

fn capture_result(pattern: &Regex, line: &str) -> Result<f64> {
    let result = pattern
        .captures(line)
        .and_then(|c| c.name("result"))
        .with_context(|| format!("no benchmark result in line {line:?}"))?;
    result
        .as_str()
        .parse()
        .with_context(|| format!("invalid benchmark result {:?}", result.as_str()))
}

// ─── Loading ────────────────────────────────────────────────────────────────

/// Repeated runs of both suites for one configuration of one host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuiteRuns {
    pub unixbench: Vec<Vec<f64>>,
    pub lmbench: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostBenchmarks {
    pub hostname: String,
    pub configurations: BTreeMap<String, SuiteRuns>,
}

impl HostRecord for HostBenchmarks {
    fn hostname(&self) -> Option<&str> {
        Some(&self.hostname)
    }
}

pub fn load(parsers: &Parsers, data_dir: &Path) -> Result<Vec<HostBenchmarks>> {
    let mut hosts = Vec::new();
    for (hostname, host_dir) in visible_dirs(data_dir)? {
        let mut configurations = BTreeMap::new();
        for (config, config_dir) in visible_dirs(&host_dir)? {
            let unixbench = run_files(&config_dir.join(UNIXBENCH_DIR))?
                .into_iter()
                .filter(|path| {
                    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                    !name.contains(".log") && !name.contains(".html")
                })
                .map(|path| parse_file(&path, |c| parsers.unixbench_run(c)))
                .collect::<Result<Vec<_>>>()?;
            let lmbench = run_files(&config_dir.join(LMBENCH_DIR))?
                .into_iter()
                .map(|path| parse_file(&path, |c| parsers.lmbench_run(c)))
                .collect::<Result<Vec<_>>>()?;

            tracing::debug!(
                host = %hostname,
                config = %config,
                unixbench = unixbench.len(),
                lmbench = lmbench.len(),
                "loaded benchmark runs"
            );
            configurations.insert(config, SuiteRuns { unixbench, lmbench });
        }
        hosts.push(HostBenchmarks {
            hostname,
            configurations,
        });
    }
    Ok(hosts)
}

fn run_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let entries = std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))?;
    for entry in entries {
        let path = entry
            .with_context(|| format!("reading {}", dir.display()))?
            .path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn parse_file(path: &Path, parse: impl Fn(&str) -> Result<Vec<f64>>) -> Result<Vec<f64>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse(&content).with_context(|| format!("parsing {}", path.display()))
}

// ─── Evaluation ─────────────────────────────────────────────────────────────

/// Overhead of one configuration against the baseline, in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overhead {
    pub unixbench: f64,
    pub lmbench: f64,
}

impl std::fmt::Display for Overhead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}% / {:.1}%", self.unixbench, self.lmbench)
    }
}

/// Overhead of every non-baseline configuration of one host.
pub fn evaluate(host: &HostBenchmarks) -> Result<BTreeMap<String, Overhead>> {
    let score = |config: &str, runs: &SuiteRuns| -> Result<(f64, f64)> {
        let unixbench = stats::suite_score(&runs.unixbench)
            .with_context(|| format!("{}/{config}: UnixBench score", host.hostname))?;
        let lmbench = stats::suite_score(&runs.lmbench)
            .with_context(|| format!("{}/{config}: LMbench score", host.hostname))?;
        Ok((unixbench, lmbench))
    };

    let baseline = host
        .configurations
        .get(BASELINE)
        .with_context(|| format!("host {} has no `{BASELINE}` configuration", host.hostname))?;
    let (base_unixbench, base_lmbench) = score(BASELINE, baseline)?;

    let mut overheads = BTreeMap::new();
    for (config, runs) in host.configurations.iter().filter(|(c, _)| *c != BASELINE) {
        let (unixbench, lmbench) = score(config, runs)?;
        overheads.insert(
            config.clone(),
            Overhead {
                unixbench: stats::overhead_pct(base_unixbench, unixbench, Direction::HigherIsBetter),
                lmbench: stats::overhead_pct(base_lmbench, lmbench, Direction::LowerIsBetter),
            },
        );
    }
    Ok(overheads)
}

// ─── Table ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Report {
    /// Microcode-only results, which have no table column.
    pub summary: Vec<String>,
    pub table: Tabular,
}

pub fn build(settings: &Settings, hosts: &[HostBenchmarks]) -> Result<Report> {
    let mut summary = Vec::new();
    let mut table = Tabular::new(HEADER, FOOTER);

    for (i, host) in hosts.iter().enumerate() {
        let entry = settings.registry.host(&host.hostname)?;
        let overheads = evaluate(host)?;

        let shade = if i % 2 == 0 { Shade::EveryCell } else { Shade::None };
        let mut row = Row::new(latex::escape(&entry.code_name)).shade(shade);
        for column in COLUMNS {
            row = row.cell(match overheads.get(column) {
                Some(o) => format!("{:.1}\\% / {:.1}\\%", o.unixbench, o.lmbench),
                None => "-".to_string(),
            });
        }
        table.push(row);

        if let Some(microcode) = overheads.get(MICROCODE) {
            summary.push(format!("{} Microcode: {microcode}", entry.code_name));
        }
    }

    Ok(Report { summary, table })
}

pub fn run(settings: &Settings, data_dir: &Path) -> Result<()> {
    let parsers = Parsers::new()?;
    let hosts = load(&parsers, data_dir)
        .with_context(|| format!("loading benchmarks from {}", data_dir.display()))?;
    let hosts = settings.order(hosts, data_dir)?;
    let report = build(settings, &hosts)?;

    for line in &report.summary {
        println!("{line}");
    }
    let path = settings.table_path(TABLE_FILE)?;
    settings::write_output(&path, &report.table.render())
}
