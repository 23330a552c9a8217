//! Bar chart rendering.
//!
//! One bar per major in ranking order, each annotated with its average,
//! category labels turned vertical along the x axis. The output format
//! follows the file extension.

use crate::config::ChartConfig;
use crate::report::generator::RankedCategory;
use anyhow::{bail, Context, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::Path;
use tracing::{debug, info};

const SKY_BLUE: RGBColor = RGBColor(135, 206, 235);
const NAVY: RGBColor = RGBColor(0, 0, 128);
const FONT: &str = "sans-serif";
/// Fraction of a slot left empty on each side of a bar.
const BAR_INSET: f64 = 0.1;

/// Image encodings we can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// Raster output through the bitmap backend (png, jpg, bmp).
    Bitmap,
    Svg,
}

/// Pick the image format from the output path's extension.
pub fn image_format(path: &Path) -> Result<ImageFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "png" | "jpg" | "jpeg" | "bmp" => Ok(ImageFormat::Bitmap),
        "svg" => Ok(ImageFormat::Svg),
        "" => bail!("Chart output {} has no file extension", path.display()),
        other => bail!("Unsupported chart format '.{}' for {}", other, path.display()),
    }
}

/// Convert a point size to pixels at the given resolution.
pub fn font_px(points: f64, dpi: u32) -> f64 {
    points * f64::from(dpi) / 72.0
}

/// Y range covering every bar plus headroom for the value labels.
pub fn value_range(ranked: &[RankedCategory]) -> (f64, f64) {
    let max = ranked
        .iter()
        .map(|r| r.average_minutes)
        .fold(0.0_f64, f64::max);
    let min = ranked
        .iter()
        .map(|r| r.average_minutes)
        .fold(0.0_f64, f64::min);

    if max == 0.0 && min == 0.0 {
        return (0.0, 1.0);
    }
    (min * 1.15, max * 1.15)
}

/// Text drawn above a bar.
pub fn bar_label(average_minutes: f64) -> String {
    format!("{:.1}", average_minutes)
}

/// Render the chart to `config.output`.
pub fn draw_bar_chart(ranked: &[RankedCategory], config: &ChartConfig) -> Result<()> {
    config.validate()?;
    let path = config.output.as_path();
    let format = image_format(path)?;
    let size = config.pixel_size();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    debug!(
        "Rendering {} bars to {} ({}x{}, {:?})",
        ranked.len(),
        path.display(),
        size.0,
        size.1,
        format
    );

    let rendered = match format {
        ImageFormat::Bitmap => {
            let root = BitMapBackend::new(path, size).into_drawing_area();
            draw_on(&root, ranked, config)
        }
        ImageFormat::Svg => {
            let root = SVGBackend::new(path, size).into_drawing_area();
            draw_on(&root, ranked, config)
        }
    };
    rendered.with_context(|| format!("Failed to render chart to {}", path.display()))?;

    info!("Chart written to {}", path.display());
    Ok(())
}

fn draw_on<DB>(
    root: &DrawingArea<DB, Shift>,
    ranked: &[RankedCategory],
    config: &ChartConfig,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (width, height) = config.pixel_size();
    let dpi = config.dpi;
    let title_px = font_px(14.0, dpi);
    let axis_px = font_px(12.0, dpi);
    let tick_px = font_px(10.0, dpi);
    let value_px = font_px(9.0, dpi);

    let slots = ranked.len() as f64;
    let (y_min, y_max) = value_range(ranked);

    // Vertical labels need room for the longest major plus the axis title.
    let longest = ranked
        .iter()
        .map(|r| r.category.chars().count())
        .max()
        .unwrap_or(1) as f64;
    let x_label_area = ((longest * tick_px * 0.6) + axis_px * 3.0).min(f64::from(height) / 2.0);
    let y_label_area = tick_px * 6.0;

    root.fill(&WHITE)?;

    // One unit-wide slot per major; ticks sit on the slot centres.
    let centres: Vec<f64> = (0..ranked.len()).map(slot_centre).collect();
    let mut chart = ChartBuilder::on(root)
        .caption(
            &config.title,
            (FONT, title_px).into_font().style(FontStyle::Bold),
        )
        .margin((axis_px / 2.0) as u32)
        .x_label_area_size(x_label_area as u32)
        .y_label_area_size(y_label_area as u32)
        .build_cartesian_2d(
            KeyPointAxis((0.0..slots).with_key_points(centres)),
            y_min..y_max,
        )?;

    let no_label = |_: &f64| String::new();
    let y_formatter = |v: &f64| format!("{:.0}", v);

    chart
        .configure_mesh()
        .disable_x_mesh()
        .bold_line_style(BLACK.mix(0.3))
        .light_line_style(WHITE.mix(0.0))
        .x_label_formatter(&no_label)
        .y_label_formatter(&y_formatter)
        .y_label_style((FONT, tick_px).into_font())
        .x_desc(config.x_label.as_str())
        .y_desc(config.y_label.as_str())
        .axis_desc_style((FONT, axis_px).into_font().style(FontStyle::Bold))
        .draw()?;

    let outline = (f64::from(dpi) / 100.0).max(1.0) as u32;
    let bar_rect = |i: usize, value: f64, style: ShapeStyle| {
        let left = i as f64 + BAR_INSET;
        let right = (i + 1) as f64 - BAR_INSET;
        Rectangle::new([(left, 0.0), (right, value)], style)
    };

    chart.draw_series(
        ranked
            .iter()
            .enumerate()
            .map(|(i, r)| bar_rect(i, r.average_minutes, SKY_BLUE.filled())),
    )?;
    chart.draw_series(
        ranked
            .iter()
            .enumerate()
            .map(|(i, r)| bar_rect(i, r.average_minutes, NAVY.stroke_width(outline))),
    )?;

    chart.draw_series(ranked.iter().enumerate().map(|(i, r)| {
        let anchor = if r.average_minutes < 0.0 {
            VPos::Top
        } else {
            VPos::Bottom
        };
        let style = TextStyle::from((FONT, value_px).into_font()).pos(Pos::new(HPos::Center, anchor));
        Text::new(
            bar_label(r.average_minutes),
            (slot_centre(i), r.average_minutes),
            style,
        )
    }))?;

    // Category names hang below the x axis, read bottom to top, ending at the tick.
    let label_style = TextStyle::from((FONT, tick_px).into_font())
        .transform(FontTransform::Rotate270)
        .pos(Pos::new(HPos::Right, VPos::Center));
    let gap = (tick_px / 2.0) as i32;
    for (i, r) in ranked.iter().enumerate() {
        let (x, y) = chart.backend_coord(&(slot_centre(i), y_min));
        root.draw_text(&r.category, &label_style, (x, y + gap))?;
    }

    debug!("Chart canvas {}x{} px", width, height);
    root.present()?;
    Ok(())
}

/// `WithKeyPoints` over an f64 axis opts out of plotters' default value
/// formatting, which makes `configure_mesh` unavailable. This wrapper forwards
/// everything unchanged and opts back in; labels come from `x_label_formatter`.
struct KeyPointAxis(plotters::coord::combinators::WithKeyPoints<plotters::coord::types::RangedCoordf64>);

impl Ranged for KeyPointAxis {
    type FormatOption = plotters::coord::ranged1d::DefaultFormatting;
    type ValueType = f64;

    fn map(&self, value: &f64, limit: (i32, i32)) -> i32 {
        self.0.map(value, limit)
    }

    fn key_points<Hint: plotters::coord::ranged1d::KeyPointHint>(&self, hint: Hint) -> Vec<f64> {
        self.0.key_points(hint)
    }

    fn range(&self) -> std::ops::Range<f64> {
        self.0.range()
    }

    fn axis_pixel_range(&self, limit: (i32, i32)) -> std::ops::Range<i32> {
        self.0.axis_pixel_range(limit)
    }
}

/// X coordinate of the middle of the `i`-th bar slot.
fn slot_centre(i: usize) -> f64 {
    i as f64 + 0.5
}
