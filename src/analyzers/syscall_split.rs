//! Gadget hit rate in kernel and user mode over a growing NOP delay between
//! the syscall and the victim branch.

use std::path::Path;

use anyhow::Result;
use plotters::style::RGBColor;
use uarch_core::{stats, ResultSet};

use crate::plot::{Figure, Panel, Series, YAxis};
use crate::settings::{self, Settings};

pub const FIGURE_FILE: &str = "syscall_split.svg";

/// Key, legend label and color of each curve.
const CURVES: [(&str, &str, RGBColor); 2] = [
    ("jump_result_btb_wait_supervisor", "kernel", RGBColor(0xdb, 0x7a, 0x7a)),
    ("jump_result_btb_wait_user", "user", RGBColor(0x8c, 0xbf, 0x88)),
];

pub fn run(settings: &Settings, data_dir: &Path) -> Result<()> {
    let sets = settings.load_ordered(data_dir)?;
    let svg = figure(settings, &sets)?.render()?;
    let path = settings.figure_path(FIGURE_FILE)?;
    settings::write_output(&path, &svg)
}

pub fn figure(settings: &Settings, sets: &[ResultSet]) -> Result<Figure> {
    let mut titles = Vec::with_capacity(sets.len());
    let mut series = Vec::with_capacity(sets.len() * CURVES.len());
    let mut longest = 0;

    for (i, set) in sets.iter().enumerate() {
        titles.push(settings.core_label(set)?);
        for (key, label, color) in CURVES {
            let points: Vec<(f64, f64)> = set
                .numbers(key)?
                .into_iter()
                .enumerate()
                .map(|(delay, hits)| (delay as f64, hits / (stats::TOTAL_ITERATIONS / 100.0)))
                .collect();
            longest = longest.max(points.len());
            series.push(Series {
                // one legend entry per curve kind
                label: (i == 0).then(|| label.to_string()),
                color,
                points,
            });
        }
    }

    let mut panel = Panel::new(0.0..longest.saturating_sub(1).max(1) as f64, -5.0..105.0);
    panel.title = Some(titles.join(", "));
    panel.x_desc = Some("# of NOP instructions delay".to_string());
    panel.y_desc = Some("gadget hit rate".to_string());
    panel.y_axis = YAxis::Percent;
    panel.series = series;

    Ok(Figure {
        size: (1000, 500),
        grid: (1, 1),
        panels: vec![panel],
    })
}
