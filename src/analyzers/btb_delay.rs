//! Average mispredictions per branch kind as the NOP distance between
//! training and victim branch grows; one panel per core.

use std::path::Path;

use anyhow::Result;
use uarch_core::ResultSet;

use crate::plot::{self, Figure, Panel, Series};
use crate::settings::{self, Settings};

pub const FIGURE_FILE: &str = "btb_delay.svg";

const ROWS: usize = 3;
const COLUMNS: usize = 4;

/// Key, legend label and the offset applied on both axes.
const CURVES: [(&str, &str, f64); 3] = [
    ("jump_avg_mispredictions", "jump* (-0.03)", -0.03),
    ("call_avg_mispredictions", "call* (+0.0)", 0.0),
    ("ret_avg_mispredictions", "ret (+0.03)", 0.03),
];

/// Cores without a return measurement leave it out.
const OPTIONAL_KEY: &str = "ret_avg_mispredictions";

pub fn run(settings: &Settings, data_dir: &Path) -> Result<()> {
    let sets = settings.load_ordered(data_dir)?;
    let svg = figure(settings, &sets)?.render()?;
    let path = settings.figure_path(FIGURE_FILE)?;
    settings::write_output(&path, &svg)
}

fn shifted(values: Vec<f64>, offset: f64) -> Vec<(f64, f64)> {
    let keep = values.len().saturating_sub(1);
    values
        .into_iter()
        .take(keep)
        .enumerate()
        .map(|(x, y)| (x as f64 + offset, y + offset))
        .collect()
}

pub fn figure(settings: &Settings, sets: &[ResultSet]) -> Result<Figure> {
    let mut panels = Vec::with_capacity(sets.len());
    for (i, set) in sets.iter().enumerate() {
        let mut series = Vec::with_capacity(CURVES.len());
        let mut longest = 0;
        for (c, (key, label, offset)) in CURVES.into_iter().enumerate() {
            if key == OPTIONAL_KEY && !set.contains(key) {
                continue;
            }
            let points = shifted(set.numbers(key)?, offset);
            longest = longest.max(points.len());
            series.push(Series {
                label: (i == 0).then(|| label.to_string()),
                color: plot::color(c),
                points,
            });
        }

        let mut panel = Panel::new(-0.5..longest.max(1) as f64, 0.9..2.1);
        panel.title = Some(settings.core_label(set)?);
        if i / COLUMNS == ROWS - 1 {
            panel.x_desc = Some("# of NOP instructions".to_string());
        }
        if i % COLUMNS == 0 {
            panel.y_desc = Some("avg misp.".to_string());
        }
        panel.series = series;
        panels.push(panel);
    }

    Ok(Figure {
        size: (1200, 600),
        grid: (ROWS, COLUMNS),
        panels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::testing::result_set;
    use serde_json::json;
    use std::path::PathBuf;

    fn settings() -> Settings {
        Settings::new(PathBuf::new(), PathBuf::new(), PathBuf::new(), None, false).unwrap()
    }

    fn assert_points(actual: &[(f64, f64)], expected: &[(f64, f64)]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a.0 - e.0).abs() < 1e-9 && (a.1 - e.1).abs() < 1e-9, "{a:?} != {e:?}");
        }
    }

    #[test]
    fn last_point_dropped_and_curves_shifted() {
        let set = result_set(
            "ee-tik-cn103",
            0,
            &[
                ("jump_avg_mispredictions", json!([1.0, 2.0, 1.5])),
                ("call_avg_mispredictions", json!([1.0, 1.0, 1.0])),
                ("ret_avg_mispredictions", json!([2.0, 2.0, 2.0])),
            ],
        );
        let figure = figure(&settings(), &[set]).unwrap();
        let panel = &figure.panels[0];

        assert_eq!(panel.title.as_deref(), Some("Skylake (CFL-R)"));
        assert_eq!(panel.y_desc.as_deref(), Some("avg misp."));
        assert_eq!(panel.x_desc, None);
        assert_eq!(panel.series.len(), 3);
        assert_points(&panel.series[0].points, &[(-0.03, 0.97), (0.97, 1.97)]);
        assert_points(&panel.series[1].points, &[(0.0, 1.0), (1.0, 1.0)]);
        assert_points(&panel.series[2].points, &[(0.03, 2.03), (1.03, 2.03)]);
        assert_eq!(panel.series[0].label.as_deref(), Some("jump* (-0.03)"));
    }

    #[test]
    fn ret_curve_is_optional() {
        let sets: Vec<ResultSet> = (0..5)
            .map(|core| {
                result_set(
                    "ee-tik-cn114",
                    16 + core,
                    &[
                        ("jump_avg_mispredictions", json!([1.0, 1.0])),
                        ("call_avg_mispredictions", json!([1.0, 1.0])),
                    ],
                )
            })
            .collect();
        let figure = figure(&settings(), &sets).unwrap();

        assert_eq!(figure.panels.len(), 5);
        assert!(figure.panels.iter().all(|p| p.series.len() == 2));
        assert_eq!(figure.panels[0].series[0].label.as_deref(), Some("jump* (-0.03)"));
        assert_eq!(figure.panels[1].series[0].label, None);
        assert_eq!(figure.panels[1].y_desc, None);
        assert_eq!(figure.panels[4].y_desc.as_deref(), Some("avg misp."));
        assert_eq!(figure.panels[4].title.as_deref(), Some("Gracemont (ADL)"));
    }

    #[test]
    fn bottom_row_gets_the_x_label() {
        let sets: Vec<ResultSet> = (0..9)
            .map(|core| {
                result_set(
                    "ee-tik-cn109",
                    core,
                    &[
                        ("jump_avg_mispredictions", json!([1.0])),
                        ("call_avg_mispredictions", json!([1.0])),
                    ],
                )
            })
            .collect();
        let figure = figure(&settings(), &sets).unwrap();
        assert_eq!(figure.panels[7].x_desc, None);
        assert_eq!(figure.panels[8].x_desc.as_deref(), Some("# of NOP instructions"));
        assert!(figure.panels[8].series.iter().all(|s| s.points.is_empty()));
    }
}
