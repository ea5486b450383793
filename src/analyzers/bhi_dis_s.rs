//! Misprediction rates with and without `BHI_DIS_S`.

use std::path::Path;

use anyhow::Result;
use uarch_core::latex::{self, Row, Tabular};
use uarch_core::ResultSet;

use crate::settings::{self, Settings};

pub const TABLE_FILE: &str = "bhi-dis-s.tex";

const HEADER: &str = r"
\newcommand{\doNohit}{\cellcolor{tabred!50}}
\newcommand{\doHit}{\cellcolor{tabgreen!20}}

\begin{tabular}{lrrrrrr}
    \hline
    \multirow{2}{*}{\textbf{Microarch.}} & \multicolumn{3}{c}{\textbf{ No Mitigation}} & \multicolumn{3}{c}{\textbf{BHI\_DIS\_S}} \\
    & \textit{jump*} & \textit{call*} & \textit{ret} & \textit{jump*} & \textit{call*} & \textit{ret} \\
    \hline
";

const FOOTER: &str = r"    \hline
\end{tabular}
";

pub fn run(settings: &Settings, data_dir: &Path) -> Result<()> {
    let sets = settings.load_ordered(data_dir)?;
    let table = build(settings, &sets)?;
    let path = settings.table_path(TABLE_FILE)?;
    settings::write_output(&path, &table.render())
}

pub fn build(settings: &Settings, sets: &[ResultSet]) -> Result<Tabular> {
    let mut table = Tabular::new(HEADER, FOOTER);
    for (i, set) in sets.iter().enumerate() {
        let label = settings.core_label(set)?;
        // no RSBA on Gracemont
        let no_rsba = label.contains("Gracemont");

        let mut row = Row::new(latex::escape(&label)).striped(i);
        for prefix in ["", "dis_"] {
            let jump = set.number(&format!("{prefix}jump_avg"))?
                - set.number(&format!("{prefix}jump_avg_call"))?;
            let call = set.number(&format!("{prefix}call_avg"))?;
            row = row
                .cell(latex::misprediction_cell(jump))
                .cell(latex::misprediction_cell(call));

            if no_rsba {
                row = row.cell(latex::NOT_APPLICABLE);
            } else {
                let mut ret = set.number(&format!("{prefix}ret_avg"))?;
                if !prefix.is_empty() {
                    ret -= 1.0;
                }
                row = row.cell(latex::misprediction_cell(ret));
            }
        }
        table.push(row);
    }
    Ok(table)
}
