// togglesheet - batch converter from bit-toggle CSV measurements to one charted XLSX workbook

mod batch;
mod exit_codes;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use togglesheet_engine::{PipelineConfig, SecondaryAxis, TotalsStrategy};

use exit_codes::{EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "togglesheet")]
#[command(about = "Convert a folder of bit-toggle CSV measurements into one charted XLSX workbook")]
#[command(long_version = long_version())]
#[command(version)]
#[command(after_help = "\
Examples:
  togglesheet ./measurements
  togglesheet ./measurements -o ./reports --save-pngs
  togglesheet ./measurements --totals-strategy fixed-offset --secondary-axis scaled
  togglesheet ./measurements --config togglesheet.toml")]
struct Cli {
    /// Folder containing the CSV files to process
    input_folder: PathBuf,

    /// Folder for the workbook (created if missing)
    #[arg(long, short = 'o', default_value = ".")]
    output_folder: PathBuf,

    /// Also keep each chart as a standalone PNG under <OUTPUT_FOLDER>/chart_pngs
    #[arg(long)]
    save_pngs: bool,

    /// TOML pipeline configuration; flags below override it
    #[arg(long, value_name = "FILE", env = "TOGGLESHEET_CONFIG")]
    config: Option<PathBuf>,

    /// Where the total-bits value is read from
    #[arg(long, value_enum)]
    totals_strategy: Option<StrategyArg>,

    /// 0-based row holding the totals for --totals-strategy fixed-offset
    #[arg(long, value_name = "ROW")]
    fixed_row: Option<usize>,

    /// Right-hand percentage axis on charts
    #[arg(long, value_enum)]
    secondary_axis: Option<AxisArg>,

    /// Decimal places for the average column (1 or 2)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=2))]
    precision: Option<u8>,

    /// Workbook name used when no file carries a ProductName
    #[arg(long, value_name = "NAME")]
    default_name: Option<String>,

    /// Only print warnings and errors
    #[arg(long, short = 'q')]
    quiet: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// Row after the "Total compared bits" label
    LabeledRow,
    /// Fixed row, with total flipped bits beside it
    FixedOffset,
}

impl From<StrategyArg> for TotalsStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::LabeledRow => TotalsStrategy::LabeledRow,
            StrategyArg::FixedOffset => TotalsStrategy::FixedOffset,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum AxisArg {
    None,
    /// 0-100%
    Fixed,
    /// Count axis as a percentage of total_bits / 128
    Scaled,
}

impl From<AxisArg> for SecondaryAxis {
    fn from(arg: AxisArg) -> Self {
        match arg {
            AxisArg::None => SecondaryAxis::None,
            AxisArg::Fixed => SecondaryAxis::Fixed,
            AxisArg::Scaled => SecondaryAxis::Scaled,
        }
    }
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  togglesheet-engine ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  togglesheet-engine ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    let result = build_config(&cli).and_then(|config| {
        batch::run(&batch::BatchOptions {
            input_dir: cli.input_folder,
            output_dir: cli.output_folder,
            config,
        })
    });

    match result {
        Ok(_) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

/// Diagnostics go to stdout; only warnings and errors carry a prefix.
fn init_logging(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stdout)
        .format(|buf, record| match record.level() {
            log::Level::Error => writeln!(buf, "error: {}", record.args()),
            log::Level::Warn => writeln!(buf, "warning: {}", record.args()),
            _ => writeln!(buf, "{}", record.args()),
        })
        .init();
}

/// Config file (if any), then command-line overrides, then validation.
fn build_config(cli: &Cli) -> Result<PipelineConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => load_config_file(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(strategy) = cli.totals_strategy {
        config.totals.strategy = strategy.into();
    }
    if let Some(row) = cli.fixed_row {
        config.totals.fixed_row = row;
    }
    if let Some(axis) = cli.secondary_axis {
        config.chart.secondary_axis = axis.into();
    }
    if let Some(precision) = cli.precision {
        config.table.average_precision = precision;
    }
    if let Some(name) = &cli.default_name {
        config.output.default_name = name.clone();
    }
    if cli.save_pngs {
        config.output.save_pngs = true;
    }

    config
        .validate()
        .map_err(|e| CliError::args(e.to_string()))?;
    Ok(config)
}

fn load_config_file(path: &Path) -> Result<PipelineConfig, CliError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::args(format!("{}: {}", path.display(), e)))?;
    PipelineConfig::from_toml(&text).map_err(|e| {
        CliError::args(format!("{}: {}", path.display(), e))
            .with_hint("every key is optional; sections are [table], [totals], [chart], [output]")
    })
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
