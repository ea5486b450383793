//! Whether injected targets land in the BTB, the IBP, or both, once with a
//! random branch history and once with a history matching the victim.

use std::path::Path;

use anyhow::Result;
use uarch_core::{stats, ResultSet};

use super::{INSTRUCTIONS, METRIC};
use crate::settings::Settings;

const HISTORIES: [(&str, &str); 2] = [("rand", "Random History"), ("match", "Matching History")];

pub fn run(settings: &Settings, data_dir: &Path) -> Result<()> {
    let sets = settings.load_ordered(data_dir)?;
    for line in report(settings, &sets)? {
        println!("{line}");
    }
    Ok(())
}

pub fn report(settings: &Settings, sets: &[ResultSet]) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    for set in sets {
        lines.push(settings.core_label(set)?);
        for (prefix, title) in HISTORIES {
            lines.push(format!("  {title}:  "));
            lines.push("    inst.| BTB   | IBP   |".to_string());
            for inst in INSTRUCTIONS {
                let btb = set.number(&format!("{prefix}_{inst}_hits_per_round_btb_{METRIC}"))?;
                let ibp = set.number(&format!("{prefix}_{inst}_hits_per_round_ibp_{METRIC}"))?;
                lines.push(format!(
                    "    {inst:<4} | {:>4.1}% | {:>4.1}% |",
                    stats::pct(btb),
                    stats::pct(ibp)
                ));
            }
        }
    }
    Ok(lines)
}
