// Total-bits extraction: labeled-row scan or fixed-offset read.
//
// Failures never abort a load. They produce the documented defaults
// (total_bits = 1, total_flipped_bits = 0) plus a warning the caller reports.

use std::fmt;

use crate::config::{TotalsConfig, TotalsStrategy};
use crate::model::Row;

/// Result of total-bits extraction for one file.
#[derive(Debug, Clone, PartialEq)]
pub struct Totals {
    /// Always positive; 1 when extraction failed.
    pub total_bits: u64,
    /// Only the fixed-offset layout carries this value.
    pub total_flipped_bits: Option<u64>,
    pub warning: Option<TotalsWarning>,
}

impl Totals {
    fn resolved(total_bits: u64, total_flipped_bits: Option<u64>) -> Self {
        Self { total_bits, total_flipped_bits, warning: None }
    }

    fn defaulted(strategy: TotalsStrategy, warning: TotalsWarning) -> Self {
        let total_flipped_bits = match strategy {
            TotalsStrategy::LabeledRow => None,
            TotalsStrategy::FixedOffset => Some(0),
        };
        Self { total_bits: 1, total_flipped_bits, warning: Some(warning) }
    }

    /// `100 * total_flipped_bits / total_bits`, only when both were read from the file.
    pub fn average_percentage(&self) -> Option<f64> {
        if self.warning.is_some() {
            return None;
        }
        self.total_flipped_bits
            .map(|flipped| 100.0 * flipped as f64 / self.total_bits as f64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TotalsWarning {
    /// No row carries the totals label.
    LabelNotFound { label: String },
    /// The label row is the last row, or the row below has no second cell.
    ValueMissing { label: String, row: usize },
    /// The fixed-offset row lies past the end of the file.
    RowMissing { row: usize },
    /// A cell that should hold an integer does not.
    NotAnInteger { row: usize, column: usize, value: String },
    /// total_bits parsed but is zero or negative.
    NonPositive { row: usize, value: i64 },
}

impl fmt::Display for TotalsWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LabelNotFound { label } => write!(f, "'{label}' not found"),
            Self::ValueMissing { label, row } => {
                write!(f, "'{label}' at row {} has no value in the next row", row + 1)
            }
            Self::RowMissing { row } => {
                write!(f, "totals row {} is past the end of the file", row + 1)
            }
            Self::NotAnInteger { row, column, value } => write!(
                f,
                "invalid total bits value '{value}' at row {}, column {}",
                row + 1,
                column + 1
            ),
            Self::NonPositive { row, value } => {
                write!(f, "total bits at row {} is not positive ({value})", row + 1)
            }
        }
    }
}

/// Locate the total-bits value according to the configured strategy.
pub fn extract(rows: &[Row], config: &TotalsConfig) -> Totals {
    let outcome = match config.strategy {
        TotalsStrategy::LabeledRow => from_labeled_row(rows, &config.label),
        TotalsStrategy::FixedOffset => from_fixed_offset(rows, config.fixed_row),
    };
    outcome.unwrap_or_else(|warning| Totals::defaulted(config.strategy, warning))
}

fn from_labeled_row(rows: &[Row], label: &str) -> Result<Totals, TotalsWarning> {
    let label_row = rows
        .iter()
        .position(|row| row.cells().get(1).is_some_and(|cell| cell.trim() == label))
        .ok_or_else(|| TotalsWarning::LabelNotFound { label: label.to_string() })?;

    let value_row = label_row + 1;
    let raw = rows
        .get(value_row)
        .and_then(|row| row.cells().get(1))
        .ok_or_else(|| TotalsWarning::ValueMissing { label: label.to_string(), row: label_row })?;

    let total_bits = positive(value_row, parse_count(raw, value_row, 1)?)?;
    Ok(Totals::resolved(total_bits, None))
}

fn from_fixed_offset(rows: &[Row], fixed_row: usize) -> Result<Totals, TotalsWarning> {
    let cells = rows
        .get(fixed_row)
        .map(Row::cells)
        .ok_or(TotalsWarning::RowMissing { row: fixed_row })?;

    let cell = |column: usize| -> Result<i64, TotalsWarning> {
        let raw = cells.get(column).map(String::as_str).unwrap_or("");
        parse_count(raw, fixed_row, column)
    };

    let flipped = cell(0)?;
    let total_bits = positive(fixed_row, cell(1)?)?;
    let flipped = u64::try_from(flipped).map_err(|_| TotalsWarning::NotAnInteger {
        row: fixed_row,
        column: 0,
        value: flipped.to_string(),
    })?;

    Ok(Totals::resolved(total_bits, Some(flipped)))
}

/// Trim, drop spreadsheet text markers (leading `'`), parse.
fn parse_count(raw: &str, row: usize, column: usize) -> Result<i64, TotalsWarning> {
    raw.trim()
        .trim_start_matches('\'')
        .trim()
        .parse::<i64>()
        .map_err(|_| TotalsWarning::NotAnInteger { row, column, value: raw.trim().to_string() })
}

fn positive(row: usize, value: i64) -> Result<u64, TotalsWarning> {
    if value > 0 {
        Ok(value as u64)
    } else {
        Err(TotalsWarning::NonPositive { row, value })
    }
}
