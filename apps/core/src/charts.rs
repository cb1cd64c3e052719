//! Chart rendering and persistence.
//!
//! Handlers describe what to draw as a [`Figure`]; a [`ChartSink`] renders and
//! stores it and hands back an opaque reference (a URL path for the file sink).

use chrono::{Datelike, NaiveDate};
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppError;

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 400.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 50.0;
const TICKS: usize = 5;
const PALETTE: [&str; 4] = ["#1f77b4", "#ff7f0e", "#2ca02c", "#d62728"];

/// How a series is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesStyle {
    Line,
    LineWithMarkers,
    Markers,
}

/// A named, date-indexed sequence of values.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub points: Vec<(NaiveDate, f64)>,
    pub style: SeriesStyle,
}

/// A line chart over calendar days.
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<String>, x_label: impl Into<String>, y_label: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            x_label: x_label.into(),
            y_label: y_label.into(),
            series: Vec::new(),
        }
    }

    pub fn with_series(mut self, label: impl Into<String>, points: Vec<(NaiveDate, f64)>, style: SeriesStyle) -> Self {
        self.series.push(Series {
            label: label.into(),
            points,
            style,
        });
        self
    }

    fn bounds(&self) -> Option<((i64, i64), (f64, f64))> {
        let mut points = self.series.iter().flat_map(|s| s.points.iter());
        let first = points.next()?;
        let day = first.0.num_days_from_ce() as i64;
        let init = ((day, day), (first.1, first.1));
        let ((x_min, x_max), (y_min, y_max)) = points.fold(init, |((x0, x1), (y0, y1)), (d, v)| {
            let d = d.num_days_from_ce() as i64;
            ((x0.min(d), x1.max(d)), (y0.min(*v), y1.max(*v)))
        });
        let (y_min, y_max) = if (y_max - y_min).abs() < f64::EPSILON {
            (y_min - 1.0, y_max + 1.0)
        } else {
            let pad = (y_max - y_min) * 0.05;
            (y_min - pad, y_max + pad)
        };
        Some(((x_min, x_max), (y_min, y_max)))
    }

    /// Renders the figure as a standalone SVG document.
    pub fn render_svg(&self) -> Result<String, AppError> {
        let ((x_min, x_max), (y_min, y_max)) = self
            .bounds()
            .ok_or_else(|| AppError::Internal("cannot render a figure without points".to_string()))?;
        if !y_min.is_finite() || !y_max.is_finite() {
            return Err(AppError::Internal("cannot render non-finite values".to_string()));
        }

        let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
        let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
        let x_span = (x_max - x_min) as f64;
        let px = |day: NaiveDate| {
            if x_span == 0.0 {
                MARGIN_LEFT + plot_w / 2.0
            } else {
                MARGIN_LEFT + (day.num_days_from_ce() as i64 - x_min) as f64 / x_span * plot_w
            }
        };
        let py = |v: f64| MARGIN_TOP + (1.0 - (v - y_min) / (y_max - y_min)) * plot_h;

        let mut svg = String::new();
        // Writing into a String cannot fail; the results are ignored below.
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="sans-serif">"#
        );
        let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);
        let _ = writeln!(
            svg,
            r#"<text x="{}" y="24" text-anchor="middle" font-size="16">{}</text>"#,
            WIDTH / 2.0,
            escape_xml(&self.title)
        );

        // Axes
        let x_axis_y = MARGIN_TOP + plot_h;
        let _ = writeln!(
            svg,
            r#"<line x1="{MARGIN_LEFT}" y1="{x_axis_y}" x2="{}" y2="{x_axis_y}" stroke="black"/>"#,
            MARGIN_LEFT + plot_w
        );
        let _ = writeln!(
            svg,
            r#"<line x1="{MARGIN_LEFT}" y1="{MARGIN_TOP}" x2="{MARGIN_LEFT}" y2="{x_axis_y}" stroke="black"/>"#
        );

        for i in 0..TICKS {
            let frac = i as f64 / (TICKS - 1) as f64;
            let value = y_min + frac * (y_max - y_min);
            let y = py(value);
            let _ = writeln!(
                svg,
                r##"<line x1="{MARGIN_LEFT}" y1="{y:.1}" x2="{}" y2="{y:.1}" stroke="#e0e0e0"/>"##,
                MARGIN_LEFT + plot_w
            );
            let _ = writeln!(
                svg,
                r#"<text x="{}" y="{:.1}" text-anchor="end" font-size="10">{:.2}</text>"#,
                MARGIN_LEFT - 6.0,
                y + 3.0,
                value
            );
        }

        let x_ticks = if x_span == 0.0 { 1 } else { TICKS.min(x_span as usize + 1) };
        for i in 0..x_ticks {
            let offset = if x_ticks == 1 {
                0
            } else {
                ((i as f64 / (x_ticks - 1) as f64) * x_span).round() as i64
            };
            if let Some(day) = NaiveDate::from_num_days_from_ce_opt((x_min + offset) as i32) {
                let _ = writeln!(
                    svg,
                    r#"<text x="{:.1}" y="{}" text-anchor="middle" font-size="10">{}</text>"#,
                    px(day),
                    x_axis_y + 16.0,
                    day.format("%Y-%m-%d")
                );
            }
        }

        let _ = writeln!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="middle" font-size="12">{}</text>"#,
            MARGIN_LEFT + plot_w / 2.0,
            HEIGHT - 10.0,
            escape_xml(&self.x_label)
        );
        let _ = writeln!(
            svg,
            r#"<text x="16" y="{0}" text-anchor="middle" font-size="12" transform="rotate(-90 16 {0})">{1}</text>"#,
            MARGIN_TOP + plot_h / 2.0,
            escape_xml(&self.y_label)
        );

        for (idx, series) in self.series.iter().enumerate() {
            let color = PALETTE[idx % PALETTE.len()];
            if matches!(series.style, SeriesStyle::Line | SeriesStyle::LineWithMarkers) && series.points.len() > 1 {
                let coords: Vec<String> = series
                    .points
                    .iter()
                    .map(|(d, v)| format!("{:.1},{:.1}", px(*d), py(*v)))
                    .collect();
                let _ = writeln!(
                    svg,
                    r#"<polyline fill="none" stroke="{color}" stroke-width="2" points="{}"/>"#,
                    coords.join(" ")
                );
            }
            if matches!(series.style, SeriesStyle::Markers | SeriesStyle::LineWithMarkers) || series.points.len() == 1 {
                for (d, v) in &series.points {
                    let _ = writeln!(
                        svg,
                        r#"<circle cx="{:.1}" cy="{:.1}" r="3" fill="{color}"/>"#,
                        px(*d),
                        py(*v)
                    );
                }
            }
            let legend_y = MARGIN_TOP + 14.0 * idx as f64;
            let _ = writeln!(
                svg,
                r#"<text x="{}" y="{legend_y}" text-anchor="end" font-size="10" fill="{color}">{}</text>"#,
                MARGIN_LEFT + plot_w - 4.0,
                escape_xml(&series.label)
            );
        }

        svg.push_str("</svg>\n");
        Ok(svg)
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders a figure and stores it somewhere retrievable.
pub trait ChartSink: Send + Sync + 'static {
    /// Persists the figure and returns an opaque reference to it.
    fn persist(&self, figure: &Figure, prefix: &str) -> Result<String, AppError>;
}

/// Writes SVG charts into a directory and returns URL paths to them.
pub struct FileChartSink {
    dir: PathBuf,
    url_prefix: String,
    write_lock: Mutex<()>,
}

impl FileChartSink {
    pub fn new(dir: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
            write_lock: Mutex::new(()),
        }
    }
}

impl ChartSink for FileChartSink {
    fn persist(&self, figure: &Figure, prefix: &str) -> Result<String, AppError> {
        let svg = figure.render_svg()?;
        let id = Uuid::new_v4().simple().to_string();
        let file_name = format!("{}_{}.svg", prefix, &id[..8]);

        // One writer at a time.
        let _guard = self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(&file_name);
        fs::write(&path, svg)?;
        debug!("Chart written to {:?}", path);
        info!("Chart persisted: {}", file_name);

        Ok(format!("{}/{}", self.url_prefix, file_name))
    }
}
