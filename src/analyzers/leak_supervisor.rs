//! eIBRS supervisor leak: user-injected branch targets observed in the
//! kernel, per branch kind, against the noise control of the same run.

use std::path::Path;

use anyhow::Result;
use uarch_core::latex::{self, Row, Tabular};
use uarch_core::{stats, ResultSet};

use super::{INSTRUCTIONS, METRIC};
use crate::settings::{self, Settings};

pub const TABLE_FILE: &str = "eibrs-leak.tex";

const HEADER: &str = r"\begin{tabular}{lrrrr}
    \hline
    \textbf{Microarchitecture} & \multicolumn{1}{c}{\inst{jump*}} & \multicolumn{1}{c}{\inst{call*}} & \multicolumn{1}{c}{\inst{ret}} & \multicolumn{1}{c}{\inst{noise}} \\
    \hline
";

const FOOTER: &str = r"    \hline
    \multicolumn{4}{l}{$^a$ indistinguishable from noise}
\end{tabular}
";

#[derive(Debug, Clone)]
pub struct Options {
    /// Hosts reported on the console but left out of the table.
    pub exclude_hosts: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        // the paper table only lists the Intel parts
        Self {
            exclude_hosts: vec!["ee-tik-cn128".to_string(), "ee-tik-cn140".to_string()],
        }
    }
}

pub fn run(settings: &Settings, data_dir: &Path, options: &Options) -> Result<()> {
    let sets = settings.load_ordered(data_dir)?;
    let report = build(settings, &sets, options)?;

    for line in &report.summary {
        println!("{line}");
    }
    let path = settings.table_path(TABLE_FILE)?;
    settings::write_output(&path, &report.table.render())
}

#[derive(Debug)]
pub struct Report {
    pub summary: Vec<String>,
    pub table: Tabular,
}

pub fn build(settings: &Settings, sets: &[ResultSet], options: &Options) -> Result<Report> {
    let mut summary = Vec::with_capacity(sets.len() * 2);
    let mut table = Tabular::new(HEADER, FOOTER);

    let check_keys: Vec<String> = INSTRUCTIONS.iter().map(|i| format!("{i}_check")).collect();
    let check_keys: Vec<&str> = check_keys.iter().map(String::as_str).collect();

    for (i, set) in sets.iter().enumerate() {
        let label = settings.core_label(set)?;
        let hits = INSTRUCTIONS
            .iter()
            .map(|inst| set.number(&format!("{inst}_hits_per_round_{METRIC}")))
            .collect::<Result<Vec<f64>, _>>()?;
        let noise = set.max_of(&check_keys)?;

        summary.push(format!("Server: {label}"));
        summary.push(format!(
            "   (jmp, call, ret, noise): {:.1}%, {:.1}%, {:.1}%, {:.1}%",
            stats::pct(hits[0]),
            stats::pct(hits[1]),
            stats::pct(hits[2]),
            stats::pct(noise)
        ));

        let excluded = set
            .hostname()
            .is_some_and(|h| options.exclude_hosts.iter().any(|x| x == h));
        if excluded {
            tracing::debug!(label = %label, "left out of the table");
            continue;
        }

        let mut row = Row::new(latex::escape(&label)).striped(i);
        for hits in &hits {
            row = row.cell(latex::denoised_cell(*hits, noise));
        }
        table.push(row.cell(latex::pct_cell(stats::pct(noise))));
    }

    Ok(Report { summary, table })
}
