//! Which predictor structure carries the supervisor leak: BTB and IBP hit
//! rates side by side.

use std::path::Path;

use anyhow::Result;
use uarch_core::{stats, ResultSet};

use super::{instruction_pcts, INSTRUCTIONS, METRIC};
use crate::settings::Settings;

pub fn run(settings: &Settings, data_dir: &Path) -> Result<()> {
    let sets = settings.load_ordered(data_dir)?;
    for line in report(settings, &sets)? {
        println!("{line}");
    }
    Ok(())
}

pub fn report(settings: &Settings, sets: &[ResultSet]) -> Result<Vec<String>> {
    let check_keys: Vec<String> = INSTRUCTIONS
        .iter()
        .map(|inst| format!("{inst}_hits_per_round_check_{METRIC}"))
        .collect();
    let check_keys: Vec<&str> = check_keys.iter().map(String::as_str).collect();

    let mut lines = Vec::with_capacity(sets.len() * 3);
    for set in sets {
        lines.push(format!("Server: {}", settings.core_label(set)?));
        let noise = stats::pct(set.max_of(&check_keys)?);
        for predictor in ["btb", "ibp"] {
            let [jump, call, ret] =
                instruction_pcts(set, "", &format!("_hits_per_round_{predictor}_{METRIC}"))?;
            lines.push(format!(
                "{} (jmp, call, ret, noise): {jump:.1}%, {call:.1}%, {ret:.1}%, {noise:.1}%",
                predictor.to_ascii_uppercase()
            ));
        }
    }
    Ok(lines)
}
