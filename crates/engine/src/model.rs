/// Labels the first three header cells must carry, in order.
pub const HEADER_LABELS: [&str; 3] = ["Bit", "0to1", "1to0"];

/// Label appended to the header for the derived column.
pub const AVERAGE_LABEL: &str = "average";

/// One CSV line, cell by cell. A completely empty line has no cells.
pub type RawRow = Vec<String>;

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKey {
    ProductName,
    Temperature,
    Time,
}

impl MetadataKey {
    /// Match a (trimmed) first cell against the recognized labels.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "ProductName" => Some(Self::ProductName),
            "Temperature" => Some(Self::Temperature),
            "Time" => Some(Self::Time),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ProductName => "ProductName",
            Self::Temperature => "Temperature",
            Self::Time => "Time",
        }
    }
}

impl std::fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Named fields pulled from metadata rows. Missing or unparseable fields stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub product_name: Option<String>,
    pub temperature: Option<f64>,
    pub time: Option<f64>,
}

impl Metadata {
    /// `temp_<temperature>_time_<time>`, when both numbers are known.
    pub fn composite_name(&self) -> Option<String> {
        match (self.temperature, self.time) {
            (Some(temperature), Some(time)) => Some(format!(
                "temp_{}_time_{}",
                format_measurement(temperature),
                format_measurement(time)
            )),
            _ => None,
        }
    }

    /// Apply one metadata row. Later rows overwrite earlier ones.
    pub(crate) fn apply(&mut self, key: MetadataKey, raw_value: &str) {
        let value = raw_value.trim();
        match key {
            MetadataKey::ProductName => {
                self.product_name = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            MetadataKey::Temperature => self.temperature = value.parse::<f64>().ok(),
            MetadataKey::Time => self.time = value.parse::<f64>().ok(),
        }
    }
}

/// Integral values keep one decimal (`25.0`); others use the shortest form (`25.5`).
pub fn format_measurement(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// A numeric row after the header: bit index plus both transition counts.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRow {
    pub cells: RawRow,
    pub bit: u64,
    pub zero_to_one: i64,
    pub one_to_zero: i64,
}

impl DataRow {
    /// `(A + B) / 2`, exact for every pair of counts representable in `f64`.
    pub fn average(&self) -> f64 {
        (self.zero_to_one as f64 + self.one_to_zero as f64) / 2.0
    }
}

/// A classified CSV line. Classification happens once, in the loader.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Blank,
    Metadata { key: MetadataKey, cells: RawRow },
    /// Already carries the appended `average` label.
    Header(RawRow),
    Data(DataRow),
    Unclassified(RawRow),
}

impl Row {
    pub fn cells(&self) -> &[String] {
        match self {
            Row::Blank => &[],
            Row::Metadata { cells, .. } => cells,
            Row::Header(cells) => cells,
            Row::Data(data) => &data.cells,
            Row::Unclassified(cells) => cells,
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self, Row::Data(_))
    }
}
