//! One module per experiment. Each turns an experiment output directory into
//! a table, a console report or a figure.

pub mod bhi_dis_s;
pub mod btb_delay;
pub mod end2end;
pub mod ibp_insertion;
pub mod leak_ibpb;
pub mod leak_rounds;
pub mod leak_supervisor;
pub mod leak_supervisor_discern;
pub mod mitigations;
pub mod syscall_split;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;

use crate::settings::Settings;

/// Metric suffix of the hit counters reported by the leak experiments.
pub const METRIC: &str = "count_gt0";

/// Branch kinds measured by the leak experiments.
pub const INSTRUCTIONS: [&str; 3] = ["jump", "call", "ret"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Experiment {
    LeakSupervisor,
    LeakSupervisorDiscern,
    LeakIbpb,
    IbpInsertion,
    BhiDisS,
    BenchmarkMitigations,
    End2end,
    LeakRounds,
    SyscallSplit,
    BtbDelay,
}

impl Experiment {
    pub const ALL: [Experiment; 10] = [
        Experiment::LeakSupervisor,
        Experiment::LeakSupervisorDiscern,
        Experiment::LeakIbpb,
        Experiment::IbpInsertion,
        Experiment::BhiDisS,
        Experiment::BenchmarkMitigations,
        Experiment::End2end,
        Experiment::LeakRounds,
        Experiment::SyscallSplit,
        Experiment::BtbDelay,
    ];

    /// Directory of the experiment below the experiments root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Experiment::LeakSupervisor => "exp-leak-supervisor",
            Experiment::LeakSupervisorDiscern => "exp-leak-supervisor-discern",
            Experiment::LeakIbpb => "exp-leak-ibpb",
            Experiment::IbpInsertion => "exp-ibp-insertion",
            Experiment::BhiDisS => "exp-bhi-dis-s",
            Experiment::BenchmarkMitigations => "exp-benchmark-mitigations",
            Experiment::End2end => "exp-end2end",
            Experiment::LeakRounds => "exp-leak-rounds",
            Experiment::SyscallSplit => "exp-syscall-split",
            Experiment::BtbDelay => "exp-btb-delay",
        }
    }

    /// Whether the output directory uses the `host/{metadata.json,run.out}`
    /// layout.
    pub fn has_results_blocks(self) -> bool {
        !matches!(
            self,
            Experiment::BenchmarkMitigations | Experiment::End2end
        )
    }

    /// Run with default options.
    pub fn run(self, settings: &Settings, data_dir: &Path) -> Result<()> {
        match self {
            Experiment::LeakSupervisor => {
                leak_supervisor::run(settings, data_dir, &leak_supervisor::Options::default())
            }
            Experiment::LeakSupervisorDiscern => leak_supervisor_discern::run(settings, data_dir),
            Experiment::LeakIbpb => leak_ibpb::run(settings, data_dir),
            Experiment::IbpInsertion => ibp_insertion::run(settings, data_dir),
            Experiment::BhiDisS => bhi_dis_s::run(settings, data_dir),
            Experiment::BenchmarkMitigations => mitigations::run(settings, data_dir),
            Experiment::End2end => end2end::run(data_dir, &end2end::Options::default()),
            Experiment::LeakRounds => leak_rounds::run(settings, data_dir),
            Experiment::SyscallSplit => syscall_split::run(settings, data_dir),
            Experiment::BtbDelay => btb_delay::run(settings, data_dir),
        }
    }
}

impl std::fmt::Display for Experiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_possible_value() {
            Some(value) => f.write_str(value.get_name()),
            None => f.write_str(self.dir_name()),
        }
    }
}

/// Percentages of the per-instruction hit counters `<prefix><inst><suffix>`.
pub fn instruction_pcts(
    set: &uarch_core::ResultSet,
    prefix: &str,
    suffix: &str,
) -> Result<[f64; 3]> {
    let mut pcts = [0.0; 3];
    for (pct, inst) in pcts.iter_mut().zip(INSTRUCTIONS) {
        *pct = uarch_core::stats::pct(set.number(&format!("{prefix}{inst}{suffix}"))?);
    }
    Ok(pcts)
}

/// Subdirectories of `dir` sorted by name, hidden ones (`.archive`) skipped.
pub(crate) fn visible_dirs(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut dirs = Vec::new();
    let entries = std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("reading {}", dir.display()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();
        if name.starts_with('.') || !path.is_dir() {
            continue;
        }
        dirs.push((name, path));
    }
    dirs.sort();
    Ok(dirs)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::BTreeMap;

    use serde_json::{Map, Value};
    use uarch_core::ResultSet;

    pub fn result_set(hostname: &str, core: u64, data: &[(&str, Value)]) -> ResultSet {
        let mut metadata = Map::new();
        metadata.insert("hostname".into(), Value::from(hostname));
        metadata.insert("experiment_core".into(), Value::from(core));
        let data: BTreeMap<String, Value> = data
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        ResultSet::new(data, metadata)
    }
}
