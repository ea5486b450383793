//! LaTeX `tabular` fragments and the cell formats shared by the paper tables.
//!
//! The fragments rely on macros defined by the paper preamble
//! (`\colorLightGrey`, `\inst`, the `tabred`/`tabgreen` colors).

use std::fmt::Write as _;

use crate::stats::{self, Signal};

/// Row shading applied to every other row.
pub const LIGHT_GREY: &str = r"\colorLightGrey";
/// Footnote marker for values indistinguishable from noise.
pub const NOISE_MARK: &str = r"$^a$";
/// Placeholder for a cell that does not apply to this core.
pub const NOT_APPLICABLE: &str = r"\multicolumn{1}{c}{-}";

/// `12.3\%`
pub fn pct_cell(pct: f64) -> String {
    format!("{pct:.1}\\%")
}

/// Red intensity for a success percentage: 0 for no hits, otherwise
/// 20 plus 0.6 per percent.
pub fn heat(pct: f64) -> i64 {
    if pct > 0.0 {
        20 + (pct * 0.6).round_ties_even() as i64
    } else {
        0
    }
}

/// `12.3\% \cellcolor{tabred!27}`
pub fn heat_cell(pct: f64) -> String {
    format!("{} \\cellcolor{{tabred!{}}}", pct_cell(pct), heat(pct))
}

/// Hit count rendered against the noise floor of the same run.
///
/// Hits above the floor are shaded; non-zero hits at or below it carry
/// [`NOISE_MARK`].
pub fn denoised_cell(hits: f64, noise_hits: f64) -> String {
    match Signal::classify(hits, noise_hits) {
        Signal::Leak(hits) => heat_cell(stats::pct(hits)),
        Signal::Noise(hits) if hits > 0.0 => {
            format!("{NOISE_MARK}{}", pct_cell(stats::pct(hits)))
        }
        Signal::Noise(hits) => pct_cell(stats::pct(hits)),
    }
}

/// Misprediction rate (0..1) as a whole percentage; 99% and above counts as
/// "no hit" for the attacker.
pub fn misprediction_cell(rate: f64) -> String {
    let pct = ((rate * 100.0).round_ties_even() as i64).min(100);
    if pct >= 99 {
        format!("{pct}\\% \\doNohit")
    } else {
        format!("{pct}\\% \\doHit")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shade {
    #[default]
    None,
    /// Shade marker after the row label only.
    Label,
    /// Shade marker after the label and after every cell.
    EveryCell,
}

#[derive(Debug, Clone, Default)]
pub struct Row {
    label: String,
    cells: Vec<String>,
    shade: Shade,
}

impl Row {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn cell(mut self, cell: impl Into<String>) -> Self {
        self.cells.push(cell.into());
        self
    }

    pub fn shade(mut self, shade: Shade) -> Self {
        self.shade = shade;
        self
    }

    /// [`Shade::Label`] on even positions of the ordered data.
    pub fn striped(self, index: usize) -> Self {
        let shade = if index % 2 == 0 { Shade::Label } else { Shade::None };
        self.shade(shade)
    }

    fn render(&self, out: &mut String) {
        let marker = |out: &mut String, on: bool| {
            if on {
                out.push(' ');
                out.push_str(LIGHT_GREY);
            }
        };

        out.push_str("    ");
        out.push_str(&self.label);
        marker(out, self.shade != Shade::None);
        for cell in &self.cells {
            out.push_str(" & ");
            out.push_str(cell);
            marker(out, self.shade == Shade::EveryCell);
        }
        out.push_str(" \\\\\n");
    }
}

/// A table fragment: fixed header, one line per row, fixed footer.
#[derive(Debug, Clone)]
pub struct Tabular {
    header: String,
    footer: String,
    rows: Vec<Row>,
}

impl Tabular {
    pub fn new(header: impl Into<String>, footer: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            footer: footer.into(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out =
            String::with_capacity(self.header.len() + self.footer.len() + 80 * self.rows.len());
        out.push_str(&self.header);
        for row in &self.rows {
            row.render(&mut out);
        }
        out.push_str(&self.footer);
        out
    }
}

impl std::fmt::Display for Tabular {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

/// Escape text for use inside a LaTeX cell.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str(r"\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                let _ = write!(out, "\\{c}");
            }
            '~' => out.push_str(r"\textasciitilde{}"),
            '^' => out.push_str(r"\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}
