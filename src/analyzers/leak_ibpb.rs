//! Leak across an IBPB barrier.

use std::path::Path;

use anyhow::Result;
use uarch_core::{stats, ResultSet};

use super::{instruction_pcts, METRIC};
use crate::settings::Settings;

pub fn run(settings: &Settings, data_dir: &Path) -> Result<()> {
    let sets = settings.load_ordered(data_dir)?;
    for line in report(settings, &sets)? {
        println!("{line}");
    }
    Ok(())
}

pub fn report(settings: &Settings, sets: &[ResultSet]) -> Result<Vec<String>> {
    let mut lines = Vec::with_capacity(sets.len() * 2);
    for set in sets {
        let [jump, call, ret] = instruction_pcts(set, "", &format!("_hits_per_round_{METRIC}"))?;
        let check = stats::pct(set.max_of(&["jump_check", "call_check", "ret_check"])?);

        lines.push(settings.core_label(set)?);
        lines.push(format!(
            "  jump: {jump:.1}%, call: {call:.1}%, ret: {ret:.1}%, check: {check:.1}%"
        ));
    }
    Ok(lines)
}
