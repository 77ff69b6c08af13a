// XLSX document assembly: one sheet per measurement file, chart embedded at the top.
//
// The document is built in memory and written once, by `Document::save`.

use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Image, Workbook as XlsxWorkbook, Worksheet};
use togglesheet_engine::{AugmentedTable, Metadata};

/// Embedded charts are shown at 70% of their native size.
pub const CHART_SCALE: f64 = 0.7;

/// Pixel density assumed when converting chart pixels to physical units.
const SCREEN_DPI: f64 = 96.0;
const CM_PER_INCH: f64 = 2.54;

/// Excel limit on sheet name length (characters).
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Excel limit on the text of one cell (characters).
pub const MAX_CELL_CHARS: usize = 32_767;

const DOCUMENT_EXTENSION: &str = "xlsx";

/// Physical size of an embedded chart frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartFrame {
    pub width_cm: f64,
    pub height_cm: f64,
}

impl ChartFrame {
    /// Scale native pixel dimensions by [`CHART_SCALE`] and convert at 96 DPI.
    pub fn from_pixels(width_px: f64, height_px: f64) -> Self {
        let to_cm = |px: f64| px * CHART_SCALE / SCREEN_DPI * CM_PER_INCH;
        Self {
            width_cm: to_cm(width_px),
            height_cm: to_cm(height_px),
        }
    }
}

/// What `add_sheet` wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetReport {
    pub name: String,
    pub rows_written: usize,
    pub chart: Option<ChartFrame>,
}

/// The in-progress workbook for a whole batch.
pub struct Document {
    workbook: XlsxWorkbook,
    sheet_names: Vec<String>,
    product_name: Option<String>,
    default_name: String,
}

impl Document {
    pub fn new(default_name: impl Into<String>) -> Self {
        Self {
            workbook: XlsxWorkbook::new(),
            sheet_names: Vec::new(),
            product_name: None,
            default_name: default_name.into(),
        }
    }

    /// Record a file's product name. Only the first one sticks.
    pub fn note_product_name(&mut self, product_name: Option<&str>) {
        if self.product_name.is_none() {
            if let Some(name) = product_name.filter(|n| !n.trim().is_empty()) {
                self.product_name = Some(name.trim().to_string());
            }
        }
    }

    pub fn product_name(&self) -> Option<&str> {
        self.product_name.as_deref()
    }

    pub fn sheet_names(&self) -> &[String] {
        &self.sheet_names
    }

    pub fn sheet_count(&self) -> usize {
        self.sheet_names.len()
    }

    /// `<product name>.xlsx`, or `<default name>.xlsx` when no file had one.
    pub fn file_name(&self) -> String {
        let stem = self
            .product_name
            .as_deref()
            .map(sanitize_file_stem)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| sanitize_file_stem(&self.default_name));
        format!("{stem}.{DOCUMENT_EXTENSION}")
    }

    /// Append one sheet holding `table`, with the chart in the first row.
    ///
    /// Names are made legal for XLSX but not de-duplicated. A chart that is
    /// missing or unreadable yields a sheet without a chart. The sheet joins
    /// the workbook only once every write has succeeded.
    pub fn add_sheet(
        &mut self,
        name: &str,
        table: &AugmentedTable,
        chart: Option<&Path>,
    ) -> Result<SheetReport, String> {
        let name = sanitize_sheet_name(name);
        let mut sheet = Worksheet::new();
        let worksheet = sheet
            .set_name(&name)
            .map_err(|e| format!("Failed to create sheet '{}': {}", name, e))?;

        let rows_written = write_rows(worksheet, table, &name)?;

        if let Some(summary) = &table.summary {
            let col = to_col(summary.column)?;
            worksheet
                .write_string(to_row(summary.label_row)?, col, &summary.label)
                .map_err(|e| format!("Failed to write summary label: {}", e))?;
            worksheet
                .write_string(to_row(summary.value_row)?, col, &summary.value)
                .map_err(|e| format!("Failed to write summary value: {}", e))?;
        }

        let chart = match chart {
            Some(path) if path.is_file() => match embed_chart(worksheet, path, table.width()) {
                Ok(frame) => Some(frame),
                Err(e) => {
                    log::warn!("{}; sheet '{}' written without chart", e, name);
                    None
                }
            },
            Some(path) => {
                log::warn!(
                    "chart {} not found; sheet '{}' written without chart",
                    path.display(),
                    name
                );
                None
            }
            None => None,
        };

        self.workbook.push_worksheet(sheet);
        self.sheet_names.push(name.clone());
        Ok(SheetReport { name, rows_written, chart })
    }

    /// Write the workbook into `dir`. Consumes the document: it is saved once.
    pub fn save(mut self, dir: &Path) -> Result<PathBuf, String> {
        let path = dir.join(self.file_name());
        self.workbook
            .save(&path)
            .map_err(|e| format!("Failed to save XLSX file {}: {}", path.display(), e))?;
        Ok(path)
    }
}

/// Sheet name for one file: metadata composite, else the file stem.
pub fn sheet_name_for(metadata: &Metadata, file_stem: &str) -> String {
    metadata
        .composite_name()
        .unwrap_or_else(|| file_stem.to_string())
}

/// Replace characters XLSX forbids in sheet names and cap the length.
pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    // Truncate before trimming so a cut never leaves an edge apostrophe
    let truncated: String = cleaned.chars().take(MAX_SHEET_NAME_LEN).collect();
    let trimmed = truncated.trim().trim_matches('\'').trim();
    if trimmed.is_empty() {
        return "Sheet".to_string();
    }
    trimmed.to_string()
}

/// Make a product name usable as a file name.
pub fn sanitize_file_stem(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim_matches('.')
        .to_string()
}

fn write_rows(worksheet: &mut Worksheet, table: &AugmentedTable, sheet: &str) -> Result<usize, String> {
    for (row_idx, cells) in table.rows.iter().enumerate() {
        let row = to_row(row_idx)?;
        for (col_idx, value) in cells.iter().enumerate() {
            // Leave empty cells blank rather than writing empty strings
            if value.is_empty() {
                continue;
            }
            let text = fit_cell(value);
            if text.len() < value.len() {
                log::warn!(
                    "cell ({}, {}) in sheet '{}' exceeds {} characters; truncated",
                    row_idx + 1,
                    col_idx + 1,
                    sheet,
                    MAX_CELL_CHARS
                );
            }
            worksheet
                .write_string(row, to_col(col_idx)?, text)
                .map_err(|e| format!("Failed to write cell ({}, {}): {}", row_idx, col_idx, e))?;
        }
    }
    Ok(table.rows.len())
}

/// Cut `value` to the cell text limit, on a character boundary.
pub fn fit_cell(value: &str) -> &str {
    match value.char_indices().nth(MAX_CELL_CHARS) {
        Some((cut, _)) => &value[..cut],
        None => value,
    }
}

fn embed_chart(worksheet: &mut Worksheet, path: &Path, column: usize) -> Result<ChartFrame, String> {
    let image = Image::new(path)
        .map_err(|e| format!("Failed to read chart {}: {}", path.display(), e))?;
    let frame = ChartFrame::from_pixels(image.width(), image.height());

    let image = image.set_scale_width(CHART_SCALE).set_scale_height(CHART_SCALE);
    worksheet
        .insert_image(0, to_col(column)?, &image)
        .map_err(|e| format!("Failed to insert chart {}: {}", path.display(), e))?;

    Ok(frame)
}

fn to_row(row: usize) -> Result<u32, String> {
    u32::try_from(row).map_err(|_| format!("row {} out of range", row))
}

fn to_col(col: usize) -> Result<u16, String> {
    u16::try_from(col).map_err(|_| format!("column {} out of range", col))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use calamine::{open_workbook_auto, Data, Reader};
    use std::io::Read;
    use togglesheet_engine::Summary;

    // 1x1 transparent PNG.
    const PNG_1X1: &str =
        "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mP8/58HAQUBAO3+2NoAAAAASUVORK5CYII=";

    fn table(rows: &[&[&str]]) -> AugmentedTable {
        AugmentedTable {
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
            ..AugmentedTable::default()
        }
    }

    fn write_png(dir: &Path) -> PathBuf {
        let bytes = base64::engine::general_purpose::STANDARD.decode(PNG_1X1).unwrap();
        let path = dir.join("chart.png");
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn cell(path: &Path, sheet: &str, row: u32, col: u32) -> Option<String> {
        let mut workbook = open_workbook_auto(path).unwrap();
        let range = workbook.worksheet_range(sheet).unwrap();
        match range.get_value((row, col)) {
            Some(Data::String(s)) => Some(s.clone()),
            _ => None,
        }
    }

    #[test]
    fn frame_is_seventy_percent_at_96_dpi() {
        let frame = ChartFrame::from_pixels(960.0, 480.0);
        assert!((frame.width_cm - 17.78).abs() < 1e-9);
        assert!((frame.height_cm - 8.89).abs() < 1e-9);
    }

    #[test]
    fn sheet_name_prefers_metadata() {
        let mut meta = Metadata::default();
        assert_eq!(sheet_name_for(&meta, "run_01"), "run_01");
        meta.temperature = Some(85.0);
        meta.time = Some(30.0);
        assert_eq!(sheet_name_for(&meta, "run_01"), "temp_85.0_time_30.0");
    }

    #[test]
    fn sheet_names_are_made_legal() {
        assert_eq!(sanitize_sheet_name("a/b:c"), "a_b_c");
        assert_eq!(sanitize_sheet_name("''"), "Sheet");
        let long = "x".repeat(40);
        assert_eq!(sanitize_sheet_name(&long).chars().count(), MAX_SHEET_NAME_LEN);
    }

    #[test]
    fn truncation_never_ends_on_apostrophe() {
        let stem = format!("{}'tail", "x".repeat(30));
        assert_eq!(sanitize_sheet_name(&stem), "x".repeat(30));

        let dir = tempfile::tempdir().unwrap();
        let mut doc = Document::new("out");
        let report = doc.add_sheet(&stem, &table(&[&["x"]]), None).unwrap();
        assert_eq!(report.name, "x".repeat(30));
        doc.save(dir.path()).unwrap();
    }

    #[test]
    fn oversize_cell_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let long = "y".repeat(MAX_CELL_CHARS + 10);
        let mut doc = Document::new("out");
        doc.add_sheet("big", &table(&[&["Note", long.as_str()]]), None).unwrap();

        let path = doc.save(dir.path()).unwrap();
        let text = cell(&path, "big", 0, 1).unwrap();
        assert_eq!(text.chars().count(), MAX_CELL_CHARS);
    }

    #[test]
    fn fit_cell_respects_char_boundaries() {
        assert_eq!(fit_cell("short"), "short");
        let wide = "\u{b0}".repeat(MAX_CELL_CHARS + 1);
        assert_eq!(fit_cell(&wide).chars().count(), MAX_CELL_CHARS);
    }

    #[test]
    fn failed_sheet_leaves_workbook_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = Document::new("out");
        doc.add_sheet("kept", &table(&[&["x"]]), None).unwrap();

        // Summary rows past the XLSX row limit
        let mut bad = table(&[&["x"]]);
        bad.summary = Some(Summary {
            label: "average_percentage".into(),
            value: "1.00".into(),
            label_row: 2_000_000,
            value_row: 2_000_001,
            column: 4,
        });
        assert!(doc.add_sheet("bad", &bad, None).is_err());
        assert_eq!(doc.sheet_names(), &["kept".to_string()]);

        let path = doc.save(dir.path()).unwrap();
        let workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["kept".to_string()]);
    }

    #[test]
    fn file_name_falls_back_to_default() {
        let mut doc = Document::new("processed_data");
        assert_eq!(doc.file_name(), "processed_data.xlsx");

        doc.note_product_name(None);
        doc.note_product_name(Some("  "));
        assert_eq!(doc.file_name(), "processed_data.xlsx");

        doc.note_product_name(Some("DDR5/X"));
        doc.note_product_name(Some("Later"));
        assert_eq!(doc.product_name(), Some("DDR5/X"));
        assert_eq!(doc.file_name(), "DDR5_X.xlsx");
    }

    #[test]
    fn rows_written_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = Document::new("out");
        let t = table(&[&["ProductName", "P1"], &[], &["Bit", "0to1", "1to0", "average"], &["3", "10", "20", "15.0"]]);

        let report = doc.add_sheet("temp_25.0_time_1.0", &t, None).unwrap();
        assert_eq!(report.rows_written, 4);
        assert_eq!(report.chart, None);

        let path = doc.save(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("out.xlsx"));
        assert_eq!(cell(&path, "temp_25.0_time_1.0", 0, 1).as_deref(), Some("P1"));
        assert_eq!(cell(&path, "temp_25.0_time_1.0", 2, 3).as_deref(), Some("average"));
        assert_eq!(cell(&path, "temp_25.0_time_1.0", 3, 0).as_deref(), Some("3"));
        assert_eq!(cell(&path, "temp_25.0_time_1.0", 3, 3).as_deref(), Some("15.0"));
    }

    #[test]
    fn summary_written_at_fixed_position() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = Document::new("out");
        let mut t = table(&[&["Bit", "0to1", "1to0", "average"]]);
        t.summary = Some(Summary {
            label: "average_percentage".into(),
            value: "12.50".into(),
            label_row: 67,
            value_row: 68,
            column: 4,
        });

        doc.add_sheet("s", &t, None).unwrap();
        let path = doc.save(dir.path()).unwrap();
        assert_eq!(cell(&path, "s", 67, 4).as_deref(), Some("average_percentage"));
        assert_eq!(cell(&path, "s", 68, 4).as_deref(), Some("12.50"));
    }

    #[test]
    fn missing_chart_still_produces_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = Document::new("out");
        let t = table(&[&["Bit", "0to1", "1to0", "average"]]);

        let report = doc
            .add_sheet("a", &t, Some(&dir.path().join("gone.png")))
            .unwrap();
        assert_eq!(report.chart, None);
        assert_eq!(doc.sheet_count(), 1);
    }

    #[test]
    fn chart_embedded_in_package() {
        let dir = tempfile::tempdir().unwrap();
        let png = write_png(dir.path());
        let mut doc = Document::new("out");
        let t = table(&[&["Bit", "0to1", "1to0", "average"], &["0", "1", "1", "1.0"]]);

        let report = doc.add_sheet("with_chart", &t, Some(&png)).unwrap();
        let frame = report.chart.expect("chart embedded");
        assert!((frame.width_cm - 0.7 / 96.0 * 2.54).abs() < 1e-9);

        let path = doc.save(dir.path()).unwrap();
        let file = std::fs::File::open(&path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut media = archive.by_name("xl/media/image1.png").expect("image part");
        let mut bytes = Vec::new();
        media.read_to_end(&mut bytes).unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn sheets_keep_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = Document::new("out");
        let t = table(&[&["x"]]);
        doc.add_sheet("zeta", &t, None).unwrap();
        doc.add_sheet("alpha", &t, None).unwrap();
        assert_eq!(doc.sheet_names(), &["zeta".to_string(), "alpha".to_string()]);

        let path = doc.save(dir.path()).unwrap();
        let workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["zeta".to_string(), "alpha".to_string()]);
    }
}
