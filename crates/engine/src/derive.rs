// Derivation: average column, plot dataset, and the optional percentage summary.

use crate::config::{PipelineConfig, TotalsStrategy};
use crate::model::{RawRow, Row};
use crate::table::Table;

/// Label written next to the staged average percentage.
pub const SUMMARY_LABEL: &str = "average_percentage";

/// Column holding the summary: just after Bit, 0to1, 1to0, average.
pub const SUMMARY_COLUMN: usize = 4;

/// One bar group on the chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotPoint {
    pub bit: u64,
    pub zero_to_one: i64,
    pub one_to_zero: i64,
    pub average: f64,
}

/// A named value pinned to a fixed position in the sheet (0-based rows).
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub label: String,
    pub value: String,
    pub label_row: usize,
    pub value_row: usize,
    pub column: usize,
}

/// Rows ready to be written as text, plus everything the chart needs.
#[derive(Debug, Clone, Default)]
pub struct AugmentedTable {
    pub rows: Vec<RawRow>,
    pub plot: Vec<PlotPoint>,
    pub summary: Option<Summary>,
}

impl AugmentedTable {
    /// Widest row, counting the summary column when one is staged.
    pub fn width(&self) -> usize {
        let rows = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        let summary = self.summary.as_ref().map_or(0, |s| s.column + 1);
        rows.max(summary)
    }
}

pub fn derive(table: &Table, config: &PipelineConfig) -> AugmentedTable {
    let precision = config.table.average_precision as usize;

    let mut rows = Vec::with_capacity(table.rows.len());
    let mut plot = Vec::new();

    for row in &table.rows {
        match row {
            Row::Data(data) => {
                let average = data.average();
                let mut cells = data.cells.clone();
                cells.push(format!("{average:.precision$}"));
                rows.push(cells);
                plot.push(PlotPoint {
                    bit: data.bit,
                    zero_to_one: data.zero_to_one,
                    one_to_zero: data.one_to_zero,
                    average,
                });
            }
            other => rows.push(other.cells().to_vec()),
        }
    }

    let summary = stage_summary(table, config);
    if let Some(summary) = &summary {
        while rows.len() <= summary.value_row {
            rows.push(Vec::new());
        }
    }

    AugmentedTable { rows, plot, summary }
}

fn stage_summary(table: &Table, config: &PipelineConfig) -> Option<Summary> {
    if config.totals.strategy != TotalsStrategy::FixedOffset {
        return None;
    }
    let percentage = table.totals.average_percentage()?;
    let value_row = config.totals.fixed_row;
    Some(Summary {
        label: SUMMARY_LABEL.to_string(),
        value: format!("{percentage:.2}"),
        label_row: value_row.saturating_sub(1),
        value_row,
        column: SUMMARY_COLUMN,
    })
}
