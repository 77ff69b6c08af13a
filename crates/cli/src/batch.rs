// Batch driver: every matching file in a folder becomes one sheet of one workbook.
//
// Files are processed one at a time in directory-listing order. Per-file
// problems are logged and never abort the batch.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use togglesheet_engine::{derive, PipelineConfig};
use togglesheet_io::chart;
use togglesheet_io::csv;
use togglesheet_io::xlsx::{self, Document, MAX_SHEET_NAME_LEN};

use crate::CliError;

/// Subfolder of the output folder that receives standalone chart PNGs.
pub const PNG_DIR: &str = "chart_pngs";

pub struct BatchOptions {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub config: PipelineConfig,
}

#[derive(Debug)]
pub struct BatchOutcome {
    /// Saved workbook.
    pub document: PathBuf,
    pub sheets: usize,
    pub skipped: usize,
}

pub fn run(opts: &BatchOptions) -> Result<BatchOutcome, CliError> {
    let files = list_input_files(&opts.input_dir, &opts.config.output.extension)?;

    std::fs::create_dir_all(&opts.output_dir).map_err(|e| {
        CliError::io(format!("cannot create {}: {}", opts.output_dir.display(), e))
    })?;

    // Removed on drop, including when an error below returns early
    let scratch = tempfile::Builder::new()
        .prefix("togglesheet-")
        .tempdir()
        .map_err(|e| CliError::io(format!("cannot create temporary folder: {}", e)))?;

    let mut document = Document::new(opts.config.output.default_name.clone());
    let mut names = BatchNames::default();
    let mut skipped = 0;

    for path in &files {
        log::info!("Processing: {}", path.display());
        if !process_file(path, opts, scratch.path(), &mut document, &mut names) {
            skipped += 1;
        }
    }

    let sheets = document.sheet_count();
    if sheets == 0 {
        log::warn!(
            "no .{} files processed in {}; workbook has a single empty sheet",
            opts.config.output.extension,
            opts.input_dir.display()
        );
    }

    let saved = document.save(&opts.output_dir).map_err(CliError::io)?;
    log::info!("All processed data saved to: {}", saved.display());
    log::info!(
        "{} sheet{} written, {} file{} skipped",
        sheets,
        if sheets == 1 { "" } else { "s" },
        skipped,
        if skipped == 1 { "" } else { "s" },
    );
    Ok(BatchOutcome { document: saved, sheets, skipped })
}

/// Names handed out during one batch: sheet names and chart file stems.
#[derive(Debug)]
struct BatchNames {
    sheets: UniqueNames,
    charts: UniqueNames,
}

impl Default for BatchNames {
    fn default() -> Self {
        Self {
            sheets: UniqueNames::with_limit(MAX_SHEET_NAME_LEN),
            charts: UniqueNames::with_limit(usize::MAX),
        }
    }
}

/// Load, derive, chart and append one file. Returns `false` when the file was skipped.
fn process_file(
    path: &Path,
    opts: &BatchOptions,
    scratch: &Path,
    document: &mut Document,
    names: &mut BatchNames,
) -> bool {
    let config = &opts.config;

    let table = match csv::load(path, config) {
        Ok(table) => table,
        Err(e) => {
            log::warn!("skipping {}: {}", path.display(), e);
            return false;
        }
    };

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = names
        .sheets
        .claim(&xlsx::sanitize_sheet_name(&xlsx::sheet_name_for(&table.metadata, &stem)));

    let augmented = derive(&table, config);

    let chart_stem = names.charts.claim(&chart_file_stem(&stem));
    let chart_path = scratch.join(format!("{chart_stem}.png"));
    let chart = match chart::render(&augmented.plot, table.totals.total_bits, &config.chart, &chart_path) {
        Ok(image) => {
            if config.output.save_pngs {
                if let Err(e) = chart::persist_copy(&image, &opts.output_dir.join(PNG_DIR)) {
                    log::warn!("{}", e);
                }
            }
            Some(image.path)
        }
        Err(e) => {
            log::warn!("{}; sheet '{}' from {} written without chart", e, name, path.display());
            None
        }
    };

    if let Err(e) = document.add_sheet(&name, &augmented, chart.as_deref()) {
        log::warn!("skipping {}: {}", path.display(), e);
        return false;
    }
    document.note_product_name(table.metadata.product_name.as_deref());

    true
}

/// File-name-safe stem for a chart image, never empty.
fn chart_file_stem(file_stem: &str) -> String {
    let stem = xlsx::sanitize_file_stem(file_stem);
    if stem.is_empty() {
        "chart".to_string()
    } else {
        stem
    }
}

/// Regular files in `dir` whose extension matches `extension` (case-insensitive),
/// in directory-listing order.
pub fn list_input_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, CliError> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        CliError::io(format!("cannot read input folder {}: {}", dir.display(), e))
            .with_hint("pass a folder containing the measurement CSV files")
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|e| CliError::io(format!("cannot read input folder {}: {}", dir.display(), e)))?;
        let path = entry.path();
        if path.is_file() && has_extension(&path, extension) {
            files.push(path);
        }
    }
    Ok(files)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension.trim_start_matches('.')))
}

/// Names already handed out, compared case-insensitively as XLSX sheet names
/// and case-insensitive file systems do.
#[derive(Debug)]
pub struct UniqueNames {
    taken: HashSet<String>,
    limit: usize,
}

impl UniqueNames {
    /// `limit` caps the length (in characters) of suffixed names.
    pub fn with_limit(limit: usize) -> Self {
        Self { taken: HashSet::new(), limit }
    }

    /// Return `base`, or `base_2`, `base_3`, ... if it is taken, within the length limit.
    pub fn claim(&mut self, base: &str) -> String {
        if self.taken.insert(base.to_lowercase()) {
            return base.to_string();
        }
        let mut n = 2usize;
        loop {
            let suffix = format!("_{n}");
            let keep = self.limit.saturating_sub(suffix.chars().count());
            let candidate: String = base.chars().take(keep).chain(suffix.chars()).collect();
            if self.taken.insert(candidate.to_lowercase()) {
                return candidate;
            }
            n += 1;
        }
    }
}
