use serde::Deserialize;

use crate::error::EngineError;

/// Bits per comparison unit on the scaled secondary axis. The percentage
/// denominator is `total_bits / PAIR_WIDTH_BITS`.
pub const PAIR_WIDTH_BITS: u32 = 128;

/// 0-based index of the totals row in fixed-length instrument exports.
pub const DEFAULT_FIXED_ROW: usize = 68;

pub const DEFAULT_TOTALS_LABEL: &str = "Total compared bits";
pub const DEFAULT_DOCUMENT_NAME: &str = "processed_data";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default)]
    pub table: TableConfig,
    #[serde(default)]
    pub totals: TotalsConfig,
    #[serde(default)]
    pub chart: ChartConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableConfig {
    /// Decimal places of the derived `average` cell (1 or 2).
    #[serde(default = "default_precision")]
    pub average_precision: u8,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            average_precision: default_precision(),
            delimiter: default_delimiter(),
        }
    }
}

fn default_precision() -> u8 {
    1
}

fn default_delimiter() -> char {
    ','
}

// ---------------------------------------------------------------------------
// Totals
// ---------------------------------------------------------------------------

/// How the total-bits denominator is located in a file.
///
/// The two layouts are mutually exclusive; the correct one depends on which
/// instrument produced the export, so it is always chosen explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalsStrategy {
    /// A row whose second cell is the totals label; the value sits in the
    /// second cell of the row below.
    LabeledRow,
    /// `total_flipped_bits` and `total_bits` in the first two cells of a
    /// fixed row.
    FixedOffset,
}

impl Default for TotalsStrategy {
    fn default() -> Self {
        Self::LabeledRow
    }
}

impl std::fmt::Display for TotalsStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LabeledRow => write!(f, "labeled_row"),
            Self::FixedOffset => write!(f, "fixed_offset"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TotalsConfig {
    #[serde(default)]
    pub strategy: TotalsStrategy,
    #[serde(default = "default_totals_label")]
    pub label: String,
    /// 0-based row holding the totals for [`TotalsStrategy::FixedOffset`].
    /// The summary label goes one row above it.
    #[serde(default = "default_fixed_row")]
    pub fixed_row: usize,
}

impl Default for TotalsConfig {
    fn default() -> Self {
        Self {
            strategy: TotalsStrategy::default(),
            label: default_totals_label(),
            fixed_row: default_fixed_row(),
        }
    }
}

fn default_totals_label() -> String {
    DEFAULT_TOTALS_LABEL.to_string()
}

fn default_fixed_row() -> usize {
    DEFAULT_FIXED_ROW
}

// ---------------------------------------------------------------------------
// Chart
// ---------------------------------------------------------------------------

/// Policy for the right-hand percentage axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondaryAxis {
    None,
    /// Always 0–100%, independent of the data.
    Fixed,
    /// Primary maximum expressed as a percentage of
    /// `total_bits / pair_width_bits`.
    Scaled,
}

impl Default for SecondaryAxis {
    fn default() -> Self {
        Self::Fixed
    }
}

impl std::fmt::Display for SecondaryAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Fixed => write!(f, "fixed"),
            Self::Scaled => write!(f, "scaled"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChartConfig {
    #[serde(default)]
    pub secondary_axis: SecondaryAxis,
    #[serde(default = "default_pair_width")]
    pub pair_width_bits: u32,
    #[serde(default = "default_height")]
    pub height_px: u32,
    #[serde(default = "default_min_width")]
    pub min_width_px: u32,
    #[serde(default = "default_px_per_bit")]
    pub px_per_bit: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            secondary_axis: SecondaryAxis::default(),
            pair_width_bits: default_pair_width(),
            height_px: default_height(),
            min_width_px: default_min_width(),
            px_per_bit: default_px_per_bit(),
        }
    }
}

fn default_pair_width() -> u32 {
    PAIR_WIDTH_BITS
}

fn default_height() -> u32 {
    800
}

fn default_min_width() -> u32 {
    1000
}

fn default_px_per_bit() -> u32 {
    20
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Document name used when no file carries a `ProductName`.
    #[serde(default = "default_document_name")]
    pub default_name: String,
    /// Input file extension, matched case-insensitively.
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default)]
    pub save_pngs: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_name: default_document_name(),
            extension: default_extension(),
            save_pngs: false,
        }
    }
}

fn default_document_name() -> String {
    DEFAULT_DOCUMENT_NAME.to_string()
}

fn default_extension() -> String {
    "csv".to_string()
}

// ---------------------------------------------------------------------------
// Parsing + validation
// ---------------------------------------------------------------------------

impl PipelineConfig {
    pub fn from_toml(input: &str) -> Result<Self, EngineError> {
        let config: PipelineConfig =
            toml::from_str(input).map_err(|e| EngineError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(1..=2).contains(&self.table.average_precision) {
            return Err(EngineError::ConfigValidation(format!(
                "average_precision must be 1 or 2, got {}",
                self.table.average_precision
            )));
        }

        if !self.table.delimiter.is_ascii() {
            return Err(EngineError::ConfigValidation(format!(
                "delimiter must be a single ASCII character, got '{}'",
                self.table.delimiter
            )));
        }

        if self.totals.label.trim().is_empty() {
            return Err(EngineError::ConfigValidation(
                "totals label must not be empty".into(),
            ));
        }

        // The summary label is written one row above the totals row
        if self.totals.fixed_row == 0 {
            return Err(EngineError::ConfigValidation(
                "fixed_row must be at least 1".into(),
            ));
        }

        if self.chart.pair_width_bits == 0 {
            return Err(EngineError::ConfigValidation(
                "pair_width_bits must be greater than 0".into(),
            ));
        }

        if self.chart.height_px == 0 || self.chart.min_width_px == 0 {
            return Err(EngineError::ConfigValidation(
                "chart dimensions must be greater than 0".into(),
            ));
        }

        if self.output.default_name.trim().is_empty() {
            return Err(EngineError::ConfigValidation(
                "default_name must not be empty".into(),
            ));
        }

        if self.output.extension.trim_start_matches('.').is_empty() {
            return Err(EngineError::ConfigValidation(
                "extension must not be empty".into(),
            ));
        }

        Ok(())
    }
}
