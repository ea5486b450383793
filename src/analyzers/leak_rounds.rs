//! Injection success rate by repetition, with and without `BHI_DIS_S`.

use std::path::Path;

use anyhow::Result;
use uarch_core::ResultSet;

use crate::plot::{self, Figure, Panel, Series, YAxis};
use crate::settings::{self, Settings};

pub const FIGURE_FILE: &str = "leak_rounds.svg";

const KEY: &str = "jump_results_btb_attempts";
const MAX_POINTS: usize = 16;

pub fn run(settings: &Settings, data_dir: &Path) -> Result<()> {
    let sets = settings.load_ordered(data_dir)?;
    let svg = figure(settings, &sets)?.render()?;
    let path = settings.figure_path(FIGURE_FILE)?;
    settings::write_output(&path, &svg)
}

/// Successful attempts out of 100000 as percentages, at repetitions `1..`.
fn success_curve(set: &ResultSet, key: &str) -> Result<Vec<(f64, f64)>> {
    Ok(set
        .numbers(key)?
        .into_iter()
        .take(MAX_POINTS)
        .enumerate()
        .map(|(i, v)| ((i + 1) as f64, v / 1000.0))
        .collect())
}

pub fn figure(settings: &Settings, sets: &[ResultSet]) -> Result<Figure> {
    let mut eibrs = Panel::new(1.0..MAX_POINTS as f64, -5.0..105.0);
    eibrs.title = Some("eIBRS".to_string());
    eibrs.x_desc = Some("repetition".to_string());
    eibrs.y_desc = Some("success rate".to_string());
    eibrs.y_axis = YAxis::Percent;

    let mut bhi_dis_s = Panel::new(1.0..MAX_POINTS as f64, -5.0..105.0);
    bhi_dis_s.title = Some("eIBRS + BHI_DIS_S".to_string());
    bhi_dis_s.x_desc = Some("repetition".to_string());
    bhi_dis_s.y_axis = YAxis::Percent;

    for (i, set) in sets.iter().enumerate() {
        let color = plot::color(i);
        eibrs.series.push(Series {
            label: Some(settings.core_label(set)?),
            color,
            points: success_curve(set, KEY)?,
        });
        bhi_dis_s.series.push(Series {
            label: None,
            color,
            points: success_curve(set, &format!("dis_{KEY}"))?,
        });
    }

    Ok(Figure {
        size: (1000, 500),
        grid: (1, 2),
        panels: vec![eibrs, bhi_dis_s],
    })
}
