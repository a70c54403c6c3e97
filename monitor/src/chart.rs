//! PNG chart rendering for the dashboard
//!
//! Two stacked panels share the time axis: heart rate on top, SpO2 below.
//! Axis ranges are fixed by configuration so the panels do not rescale as
//! the series scrolls. Labels are drawn with a small built-in digit font, so
//! rendering needs no system fonts.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Offset;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut,
};
use imageproc::rect::Rect;

use crate::config::ChartConfig;
use crate::error::{ChartError, ChartResult};
use crate::generator::Sample;

/// Smallest canvas that still fits both panels and their labels
pub(crate) const MIN_WIDTH: u32 = 160;
pub(crate) const MIN_HEIGHT: u32 = 160;
/// Largest width or height accepted; the canvas is allocated per request
pub(crate) const MAX_DIMENSION: u32 = 4096;

const FIGURE_BG: Rgb<u8> = Rgb([248, 249, 250]);
const PANEL_BG: Rgb<u8> = Rgb([255, 255, 255]);
const GRID: Rgb<u8> = Rgb([222, 226, 230]);
const BORDER: Rgb<u8> = Rgb([108, 117, 125]);
const TEXT: Rgb<u8> = Rgb([44, 62, 80]);
const HEART_RATE_COLOR: Rgb<u8> = Rgb([220, 53, 69]);
const SPO2_COLOR: Rgb<u8> = Rgb([0, 123, 255]);

const PADDING: i32 = 10;
const AXIS_LABEL_WIDTH: i32 = 34;
const X_LABEL_HEIGHT: i32 = 18;
const TITLE_HEIGHT: i32 = 14;
const FONT_SCALE: i32 = 2;

/// 3x5 bitmap glyphs; each row's low three bits are pixels, left to right.
/// Letters are uppercase only; characters without a glyph render as a gap.
const GLYPHS: &[(char, [u8; 5])] = &[
    ('0', [0b111, 0b101, 0b101, 0b101, 0b111]),
    ('1', [0b010, 0b110, 0b010, 0b010, 0b111]),
    ('2', [0b111, 0b001, 0b111, 0b100, 0b111]),
    ('3', [0b111, 0b001, 0b111, 0b001, 0b111]),
    ('4', [0b101, 0b101, 0b111, 0b001, 0b001]),
    ('5', [0b111, 0b100, 0b111, 0b001, 0b111]),
    ('6', [0b111, 0b100, 0b111, 0b101, 0b111]),
    ('7', [0b111, 0b001, 0b001, 0b001, 0b001]),
    ('8', [0b111, 0b101, 0b111, 0b101, 0b111]),
    ('9', [0b111, 0b101, 0b111, 0b001, 0b111]),
    (':', [0b000, 0b010, 0b000, 0b010, 0b000]),
    ('A', [0b010, 0b101, 0b111, 0b101, 0b101]),
    ('B', [0b110, 0b101, 0b110, 0b101, 0b110]),
    ('C', [0b011, 0b100, 0b100, 0b100, 0b011]),
    ('D', [0b110, 0b101, 0b101, 0b101, 0b110]),
    ('E', [0b111, 0b100, 0b110, 0b100, 0b111]),
    ('F', [0b111, 0b100, 0b110, 0b100, 0b100]),
    ('G', [0b011, 0b100, 0b101, 0b101, 0b011]),
    ('H', [0b101, 0b101, 0b111, 0b101, 0b101]),
    ('I', [0b111, 0b010, 0b010, 0b010, 0b111]),
    ('J', [0b001, 0b001, 0b001, 0b101, 0b010]),
    ('K', [0b101, 0b101, 0b110, 0b101, 0b101]),
    ('L', [0b100, 0b100, 0b100, 0b100, 0b111]),
    ('M', [0b101, 0b111, 0b111, 0b101, 0b101]),
    ('N', [0b110, 0b101, 0b101, 0b101, 0b101]),
    ('O', [0b010, 0b101, 0b101, 0b101, 0b010]),
    ('P', [0b110, 0b101, 0b110, 0b100, 0b100]),
    ('Q', [0b010, 0b101, 0b101, 0b110, 0b011]),
    ('R', [0b110, 0b101, 0b110, 0b101, 0b101]),
    ('S', [0b011, 0b100, 0b010, 0b001, 0b110]),
    ('T', [0b111, 0b010, 0b010, 0b010, 0b010]),
    ('U', [0b101, 0b101, 0b101, 0b101, 0b111]),
    ('V', [0b101, 0b101, 0b101, 0b101, 0b010]),
    ('W', [0b101, 0b101, 0b111, 0b111, 0b101]),
    ('X', [0b101, 0b101, 0b010, 0b101, 0b101]),
    ('Y', [0b101, 0b101, 0b010, 0b010, 0b010]),
    ('Z', [0b111, 0b001, 0b010, 0b100, 0b111]),
    ('(', [0b001, 0b010, 0b010, 0b010, 0b001]),
    (')', [0b100, 0b010, 0b010, 0b010, 0b100]),
    ('%', [0b101, 0b001, 0b010, 0b100, 0b101]),
    ('-', [0b000, 0b000, 0b111, 0b000, 0b000]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Circle,
    Square,
}

struct PanelSpec {
    title: &'static str,
    /// Axis caption drawn left of the time labels, bottom panel only
    x_title: Option<&'static str>,
    range: (f64, f64),
    grid_step: f64,
    color: Rgb<u8>,
    marker: Marker,
    value: fn(&Sample) -> f64,
}

/// Pixel rectangle of one plot area
#[derive(Debug, Clone, Copy)]
struct PlotArea {
    left: i32,
    top: i32,
    width: i32,
    height: i32,
}

impl PlotArea {
    fn right(&self) -> i32 {
        self.left + self.width
    }

    fn bottom(&self) -> i32 {
        self.top + self.height
    }

    fn y_for(&self, value: f64, range: (f64, f64)) -> f32 {
        let fraction = ((value - range.0) / (range.1 - range.0)).clamp(0.0, 1.0);
        self.bottom() as f32 - (fraction * self.height as f64) as f32
    }
}

/// Time axis shared by both panels, in epoch milliseconds
#[derive(Debug, Clone, Copy)]
struct TimeAxis {
    start_ms: i64,
    end_ms: i64,
    /// Local offset from UTC in seconds, for wall-clock aligned labels
    offset_secs: i64,
}

impl TimeAxis {
    fn from_series(series: &[Sample]) -> Option<Self> {
        let first = series.first()?;
        let last = series.last()?;
        let mut start_ms = first.timestamp.timestamp_millis();
        let mut end_ms = last.timestamp.timestamp_millis();
        if end_ms <= start_ms {
            start_ms -= 1_000;
            end_ms = start_ms + 2_000;
        }
        Some(Self {
            start_ms,
            end_ms,
            offset_secs: first.timestamp.offset().fix().local_minus_utc() as i64,
        })
    }

    fn x_for(&self, epoch_ms: i64, area: &PlotArea) -> f32 {
        let fraction = (epoch_ms - self.start_ms) as f64 / (self.end_ms - self.start_ms) as f64;
        area.left as f32 + (fraction * area.width as f64) as f32
    }

    /// Epoch seconds of every wall-clock multiple of `interval_secs` in range
    fn ticks(&self, interval_secs: i64) -> Vec<i64> {
        let interval = interval_secs.max(1);
        let first_local = (self.start_ms + 999).div_euclid(1_000) + self.offset_secs;
        let mut local = first_local + (interval - first_local.rem_euclid(interval)) % interval;
        let last_local = self.end_ms.div_euclid(1_000) + self.offset_secs;

        let mut ticks = Vec::new();
        while local <= last_local {
            ticks.push(local - self.offset_secs);
            local += interval;
        }
        ticks
    }

    fn label(&self, epoch_secs: i64) -> String {
        let of_day = (epoch_secs + self.offset_secs).rem_euclid(86_400);
        format!("{:02}:{:02}:{:02}", of_day / 3_600, (of_day % 3_600) / 60, of_day % 60)
    }
}

/// Renders the two-panel vital-signs chart
#[derive(Debug, Clone)]
pub struct ChartRenderer {
    config: ChartConfig,
}

impl ChartRenderer {
    pub fn new(config: ChartConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    /// Render `series` as PNG bytes. An empty series has no chart.
    pub fn render(&self, series: &[Sample]) -> ChartResult<Option<Vec<u8>>> {
        let Some(axis) = TimeAxis::from_series(series) else {
            return Ok(None);
        };

        let (width, height) = (self.config.width, self.config.height);
        if width < MIN_WIDTH || height < MIN_HEIGHT {
            return Err(ChartError::CanvasTooSmall { width, height });
        }
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(ChartError::CanvasTooLarge { width, height });
        }

        let mut canvas = RgbImage::from_pixel(width, height, FIGURE_BG);

        let panel_height = (height as i32 - PADDING) / 2;
        let panels = [
            PanelSpec {
                title: "Heart rate (bpm)",
                x_title: None,
                range: self.config.heart_rate_range,
                grid_step: 5.0,
                color: HEART_RATE_COLOR,
                marker: Marker::Circle,
                value: |s| s.heart_rate,
            },
            PanelSpec {
                title: "SpO2 (%)",
                x_title: Some("Time"),
                range: self.config.spo2_range,
                grid_step: 1.0,
                color: SPO2_COLOR,
                marker: Marker::Square,
                value: |s| s.spo2,
            },
        ];

        for (index, panel) in panels.iter().enumerate() {
            let area = PlotArea {
                left: PADDING + AXIS_LABEL_WIDTH,
                top: PADDING + index as i32 * panel_height + TITLE_HEIGHT,
                width: width as i32 - 2 * PADDING - AXIS_LABEL_WIDTH,
                height: panel_height - PADDING - X_LABEL_HEIGHT - TITLE_HEIGHT,
            };
            self.draw_panel(&mut canvas, &area, &axis, panel, series);
        }

        let mut buffer = Vec::new();
        DynamicImage::ImageRgb8(canvas)
            .write_to(&mut Cursor::new(&mut buffer), ImageOutputFormat::Png)?;
        Ok(Some(buffer))
    }

    /// Render and base64-encode with the standard alphabet
    pub fn render_base64(&self, series: &[Sample]) -> ChartResult<Option<String>> {
        Ok(self.render(series)?.map(|png| STANDARD.encode(png)))
    }

    fn draw_panel(
        &self,
        canvas: &mut RgbImage,
        area: &PlotArea,
        axis: &TimeAxis,
        panel: &PanelSpec,
        series: &[Sample],
    ) {
        draw_filled_rect_mut(
            canvas,
            Rect::at(area.left, area.top).of_size(area.width as u32, area.height as u32),
            PANEL_BG,
        );

        draw_label(canvas, area.left, area.top - TITLE_HEIGHT + 2, panel.title, panel.color);

        // Horizontal gridlines and y labels
        let (low, high) = panel.range;
        let mut value = (low / panel.grid_step).ceil() * panel.grid_step;
        while value <= high {
            let y = area.y_for(value, panel.range);
            draw_line_segment_mut(canvas, (area.left as f32, y), (area.right() as f32, y), GRID);
            let label = format!("{}", value.round() as i64);
            let label_x = area.left - 4 - label_width(&label);
            draw_label(canvas, label_x, y as i32 - 5 * FONT_SCALE / 2, &label, TEXT);
            value += panel.grid_step;
        }

        // Vertical gridlines and time labels, thinned so labels never overlap
        let ticks = axis.ticks(self.config.tick_interval_secs as i64);
        let label_span = label_width("00:00:00") + 6;
        let mut last_label_right = i32::MIN;
        if let Some(x_title) = panel.x_title {
            draw_label(canvas, PADDING, area.bottom() + 4, x_title, TEXT);
            last_label_right = PADDING + label_width(x_title) + 2;
        }
        for tick in ticks {
            let x = axis.x_for(tick * 1_000, area);
            draw_line_segment_mut(canvas, (x, area.top as f32), (x, area.bottom() as f32), GRID);

            let label = axis.label(tick);
            let label_x = (x as i32 - label_span / 2)
                .clamp(0, (canvas.width() as i32 - label_span).max(0));
            if label_x > last_label_right {
                draw_label(canvas, label_x, area.bottom() + 4, &label, TEXT);
                last_label_right = label_x + label_span;
            }
        }

        // Series line, two pixels wide, then markers on top
        let points: Vec<(f32, f32)> = series
            .iter()
            .map(|sample| {
                (
                    axis.x_for(sample.timestamp.timestamp_millis(), area),
                    area.y_for((panel.value)(sample), panel.range),
                )
            })
            .collect();

        for pair in points.windows(2) {
            let (start, end) = (pair[0], pair[1]);
            draw_line_segment_mut(canvas, start, end, panel.color);
            draw_line_segment_mut(canvas, (start.0, start.1 + 1.0), (end.0, end.1 + 1.0), panel.color);
        }

        for &(x, y) in &points {
            match panel.marker {
                Marker::Circle => draw_filled_circle_mut(canvas, (x as i32, y as i32), 2, panel.color),
                Marker::Square => draw_filled_rect_mut(
                    canvas,
                    Rect::at(x as i32 - 2, y as i32 - 2).of_size(4, 4),
                    panel.color,
                ),
            }
        }

        draw_hollow_rect_mut(
            canvas,
            Rect::at(area.left, area.top).of_size(area.width as u32, area.height as u32),
            BORDER,
        );
    }
}

impl Default for ChartRenderer {
    fn default() -> Self {
        Self::new(ChartConfig::default())
    }
}

fn label_width(text: &str) -> i32 {
    let chars = text.chars().count() as i32;
    if chars == 0 {
        0
    } else {
        chars * 4 * FONT_SCALE - FONT_SCALE
    }
}

fn draw_label(canvas: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
    let mut cursor = x;
    for ch in text.chars().map(|c| c.to_ascii_uppercase()) {
        if let Some((_, rows)) = GLYPHS.iter().find(|(glyph, _)| *glyph == ch) {
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..3 {
                    if bits & (0b100 >> col) != 0 {
                        draw_filled_rect_mut(
                            canvas,
                            Rect::at(cursor + col * FONT_SCALE, y + row as i32 * FONT_SCALE)
                                .of_size(FONT_SCALE as u32, FONT_SCALE as u32),
                            color,
                        );
                    }
                }
            }
        }
        cursor += 4 * FONT_SCALE;
    }
}
