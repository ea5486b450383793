//! Line charts rendered to SVG.

use std::ops::Range;

use anyhow::{Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;

const FONT: &str = "sans-serif";
const TITLE_SIZE: u32 = 16;
const STROKE_WIDTH: u32 = 2;

/// matplotlib's default color cycle.
const PALETTE: [RGBColor; 10] = [
    RGBColor(0x1f, 0x77, 0xb4),
    RGBColor(0xff, 0x7f, 0x0e),
    RGBColor(0x2c, 0xa0, 0x2c),
    RGBColor(0xd6, 0x27, 0x28),
    RGBColor(0x94, 0x67, 0xbd),
    RGBColor(0x8c, 0x56, 0x4b),
    RGBColor(0xe3, 0x77, 0xc2),
    RGBColor(0x7f, 0x7f, 0x7f),
    RGBColor(0xbc, 0xbd, 0x22),
    RGBColor(0x17, 0xbe, 0xcf),
];

pub fn color(index: usize) -> RGBColor {
    PALETTE[index % PALETTE.len()]
}

#[derive(Debug, Clone)]
pub struct Series {
    /// Legend entry; unlabelled series are left out of the legend.
    pub label: Option<String>,
    pub color: RGBColor,
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum YAxis {
    #[default]
    Plain,
    /// Tick labels carry a `%` suffix.
    Percent,
}

#[derive(Debug, Clone)]
pub struct Panel {
    pub title: Option<String>,
    pub x_range: Range<f64>,
    pub y_range: Range<f64>,
    pub x_desc: Option<String>,
    pub y_desc: Option<String>,
    pub y_axis: YAxis,
    pub series: Vec<Series>,
}

impl Panel {
    pub fn new(x_range: Range<f64>, y_range: Range<f64>) -> Self {
        Self {
            title: None,
            x_range,
            y_range,
            x_desc: None,
            y_desc: None,
            y_axis: YAxis::Plain,
            series: Vec::new(),
        }
    }

    fn draw(&self, area: &DrawingArea<SVGBackend<'_>, Shift>) -> Result<()> {
        let mut builder = ChartBuilder::on(area);
        builder
            .margin(8)
            .x_label_area_size(if self.x_desc.is_some() { 36 } else { 24 })
            .y_label_area_size(if self.y_desc.is_some() { 52 } else { 40 });
        if let Some(title) = &self.title {
            builder.caption(title, (FONT, TITLE_SIZE));
        }
        let mut chart = builder.build_cartesian_2d(self.x_range.clone(), self.y_range.clone())?;

        let y_axis = self.y_axis;
        let y_format = move |y: &f64| match y_axis {
            YAxis::Percent => format!("{y:.0}%"),
            YAxis::Plain => format!("{y:.1}"),
        };
        chart
            .configure_mesh()
            .x_desc(self.x_desc.clone().unwrap_or_default())
            .y_desc(self.y_desc.clone().unwrap_or_default())
            .x_label_formatter(&|x: &f64| format!("{x:.0}"))
            .y_label_formatter(&y_format)
            .draw()?;

        for series in &self.series {
            let color = series.color;
            let drawn = chart.draw_series(LineSeries::new(
                series.points.iter().copied(),
                color.stroke_width(STROKE_WIDTH),
            ))?;
            if let Some(label) = &series.label {
                drawn.label(label.as_str()).legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 16, y)], color.stroke_width(STROKE_WIDTH))
                });
            }
        }

        if self.series.iter().any(|s| s.label.is_some()) {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::LowerRight)
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;
        }
        Ok(())
    }
}

/// A grid of panels filled row by row.
#[derive(Debug, Clone)]
pub struct Figure {
    pub size: (u32, u32),
    /// (rows, columns)
    pub grid: (usize, usize),
    pub panels: Vec<Panel>,
}

impl Figure {
    pub fn render(&self) -> Result<String> {
        let cells = self.grid.0 * self.grid.1;
        if self.panels.len() > cells {
            tracing::warn!(
                panels = self.panels.len(),
                cells,
                "more panels than grid cells, dropping the rest"
            );
        }

        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, self.size).into_drawing_area();
            root.fill(&WHITE)?;
            let areas = root.split_evenly(self.grid);
            for (i, (panel, area)) in self.panels.iter().zip(&areas).enumerate() {
                panel
                    .draw(area)
                    .with_context(|| format!("drawing panel {i}"))?;
            }
            root.present()?;
        }
        Ok(svg)
    }
}
