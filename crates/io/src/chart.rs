// Grouped bar chart rendering (PNG)
//
// Three bars per bit: 0to1, 1to0 and their average, on a count axis with an
// optional percentage axis on the right.

use std::error::Error;
use std::ops::Range;
use std::panic;
use std::path::{Path, PathBuf};

use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::FontTransform;

use togglesheet_engine::config::ChartConfig;
use togglesheet_engine::{PlotPoint, SecondaryAxis};

/// Width of one bar, in bit-group units. Three bars fill 0.6 of a group.
const BAR_WIDTH: f64 = 0.2;

/// Headroom above the tallest bar.
const Y_HEADROOM: f64 = 1.05;

/// Matplotlib's tab10 blue, orange, green.
const SERIES_COLORS: [RGBColor; 3] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
];

const SERIES_LABELS: [&str; 3] = ["0to1", "1to0", "average"];

/// A rendered chart on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartImage {
    pub path: PathBuf,
    pub width_px: u32,
    pub height_px: u32,
}

/// Render the chart for one file to `path` (PNG).
pub fn render(
    points: &[PlotPoint],
    total_bits: u64,
    config: &ChartConfig,
    path: &Path,
) -> Result<ChartImage, String> {
    let (width_px, height_px) = figure_size(points.len(), config);

    // Font lookups inside the bitmap backend can panic on hosts without fonts
    let drawn = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        let root = BitMapBackend::new(path, (width_px, height_px)).into_drawing_area();
        draw_chart(&root, points, total_bits, config).map_err(|e| e.to_string())
    }));

    match drawn {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(format!("Failed to draw chart {}: {}", path.display(), e)),
        Err(_) => return Err(format!("Chart renderer panicked for {}", path.display())),
    }

    Ok(ChartImage {
        path: path.to_path_buf(),
        width_px,
        height_px,
    })
}

/// Copy a rendered chart into `dir` under the same file name.
pub fn persist_copy(image: &ChartImage, dir: &Path) -> Result<PathBuf, String> {
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("cannot create {}: {}", dir.display(), e))?;

    let file_name = image
        .path
        .file_name()
        .ok_or_else(|| format!("chart path has no file name: {}", image.path.display()))?;
    let target = dir.join(file_name);

    std::fs::copy(&image.path, &target)
        .map_err(|e| format!("cannot copy chart to {}: {}", target.display(), e))?;

    log::info!("Standalone PNG saved to: {}", target.display());
    Ok(target)
}

/// Width grows with the number of bits; height is fixed.
pub fn figure_size(bits: usize, config: &ChartConfig) -> (u32, u32) {
    let scaled = u32::try_from(bits)
        .unwrap_or(u32::MAX)
        .saturating_mul(config.px_per_bit);
    (scaled.max(config.min_width_px), config.height_px)
}

/// Top of the count axis: tallest bar plus headroom, never below 1.
pub fn primary_max(points: &[PlotPoint]) -> f64 {
    let tallest = points
        .iter()
        .flat_map(|p| [p.zero_to_one as f64, p.one_to_zero as f64, p.average])
        .fold(0.0_f64, f64::max);
    (tallest * Y_HEADROOM).max(1.0)
}

/// Range of the percentage axis for the configured policy.
///
/// `Scaled` expresses the top of the count axis as a percentage of one
/// comparison unit, `total_bits / pair_width_bits`.
pub fn secondary_range(
    policy: SecondaryAxis,
    primary_max: f64,
    total_bits: u64,
    pair_width_bits: u32,
) -> Option<Range<f64>> {
    match policy {
        SecondaryAxis::None => None,
        SecondaryAxis::Fixed => Some(0.0..100.0),
        SecondaryAxis::Scaled => {
            let unit = total_bits.max(1) as f64 / f64::from(pair_width_bits.max(1));
            Some(0.0..primary_max / unit * 100.0)
        }
    }
}

/// Integer tick label with comma thousands separators.
pub fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Left/right edges of bar `series` (0..3) in group `position`.
pub fn bar_span(position: usize, series: usize) -> (f64, f64) {
    let center = position as f64 + (series as f64 - 1.0) * BAR_WIDTH;
    (center - BAR_WIDTH / 2.0, center + BAR_WIDTH / 2.0)
}

/// X range trimmed to the outer half-groups, no blank margin.
fn x_range(groups: usize) -> Range<f64> {
    -0.5..(groups.max(1) as f64 - 0.5)
}

fn series_value(point: &PlotPoint, series: usize) -> f64 {
    match series {
        0 => point.zero_to_one as f64,
        1 => point.one_to_zero as f64,
        _ => point.average,
    }
}

type CountChart<'a, DB> = ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

fn draw_chart<DB>(
    root: &DrawingArea<DB, Shift>,
    points: &[PlotPoint],
    total_bits: u64,
    config: &ChartConfig,
) -> Result<(), Box<dyn Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let y_max = primary_max(points);
    let secondary = secondary_range(config.secondary_axis, y_max, total_bits, config.pair_width_bits);

    let mut builder = ChartBuilder::on(root);
    builder
        .margin(20)
        .set_label_area_size(LabelAreaPosition::Left, 100)
        .set_label_area_size(LabelAreaPosition::Bottom, 80);
    if secondary.is_some() {
        builder.set_label_area_size(LabelAreaPosition::Right, 80);
    }

    let mut chart = builder.build_cartesian_2d(x_range(points.len()), 0.0..y_max)?;
    draw_counts(&mut chart, points)?;
    draw_legend(&mut chart)?;

    if let Some(range) = secondary {
        let mut chart = chart.set_secondary_coord(x_range(points.len()), range);
        chart
            .configure_secondary_axes()
            .y_desc("Percentage of Total Memory")
            .y_label_formatter(&|v| format!("{:.0}%", v))
            .draw()?;
    }

    root.present()?;
    Ok(())
}

fn draw_counts<DB>(chart: &mut CountChart<'_, DB>, points: &[PlotPoint]) -> Result<(), Box<dyn Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let bit_label = |x: &f64| -> String {
        let nearest = x.round();
        if (x - nearest).abs() > 1e-6 || nearest < 0.0 {
            return String::new();
        }
        points
            .get(nearest as usize)
            .map(|p| p.bit.to_string())
            .unwrap_or_default()
    };
    let count_label = |y: &f64| group_thousands(y.round() as i64);

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(points.len().max(1))
        .x_label_formatter(&bit_label)
        .x_label_style(("sans-serif", 12).into_font().transform(FontTransform::Rotate90))
        .y_label_formatter(&count_label)
        .x_desc("Bit number in data bus")
        .y_desc("Absolute Value (bits switched)")
        .draw()?;

    for (series, (&label, &color)) in SERIES_LABELS.iter().zip(SERIES_COLORS.iter()).enumerate() {
        chart
            .draw_series(points.iter().enumerate().map(|(position, point)| {
                let (left, right) = bar_span(position, series);
                Rectangle::new(
                    [(left, 0.0), (right, series_value(point, series))],
                    color.filled(),
                )
            }))?
            .label(label)
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled()));
    }

    Ok(())
}

fn draw_legend<'a, DB>(chart: &mut CountChart<'a, DB>) -> Result<(), Box<dyn Error>>
where
    DB: DrawingBackend + 'a,
    DB::ErrorType: 'static,
{
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK.mix(0.3))
        .draw()?;
    Ok(())
}
