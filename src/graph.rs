#![cfg(not(tarpaulin_include))]
#![cfg(feature = "web")]
use plotters::prelude::*;
use std::error::Error;
use std::f64::consts::PI;

use crate::chart::ChartType;
use crate::downloader::{ChartExporter, ChartImage, ChartView};
use crate::error::{DatavisError, Result};

type DrawResult<T> = std::result::Result<T, Box<dyn Error>>;
type Area<'a> = DrawingArea<BitMapBackend<'a>, plotters::coord::Shift>;

/// Renders charts into an RGB buffer with plotters
///
/// With `labels` off nothing that needs a font is drawn, which keeps
/// rendering working on hosts without system fonts.
#[derive(Clone, Debug)]
pub struct PlottersExporter {
    /// Width of the image in pixels
    pub width: u32,

    /// Height of the image in pixels
    pub height: u32,

    /// Draw the caption, axis labels and tick labels
    pub labels: bool,
}

impl Default for PlottersExporter {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            labels: true,
        }
    }
}

impl ChartExporter for PlottersExporter {
    fn render(&self, view: &ChartView<'_>) -> Result<ChartImage> {
        let mut rgb = vec![0u8; (self.width as usize) * (self.height as usize) * 3];
        self.draw(view, &mut rgb)
            .map_err(|e| DatavisError::Export(e.to_string()))?;
        Ok(ChartImage {
            width: self.width,
            height: self.height,
            rgb,
        })
    }
}

/// Points pulled out of the dataset for the selected axes
///
/// Rows whose y value is not numeric are skipped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Series {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl Series {
    pub fn from_view(view: &ChartView<'_>) -> Self {
        let (Some(x), Some(y)) = (&view.config.x_axis, &view.config.y_axis) else {
            return Series::default();
        };

        let mut series = Series::default();
        for row in view.rows {
            let Some(value) = row.get(y.as_str()).and_then(|v| v.as_f64()) else {
                continue;
            };
            let label = row.get(x.as_str()).map(|v| v.to_string()).unwrap_or_default();
            series.labels.push(label);
            series.values.push(value);
        }
        series
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn bounds(&self) -> (f64, f64) {
        let min = self.values.iter().cloned().fold(0.0_f64, f64::min);
        let max = self.values.iter().cloned().fold(0.0_f64, f64::max);
        if (max - min).abs() < f64::EPSILON {
            (min, min + 1.0)
        } else {
            let pad = (max - min) * 0.05;
            (if min < 0.0 { min - pad } else { min }, max + pad)
        }
    }
}

impl PlottersExporter {
    fn draw(&self, view: &ChartView<'_>, buffer: &mut [u8]) -> DrawResult<()> {
        let root = BitMapBackend::with_buffer(buffer, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE)?;

        let series = Series::from_view(view);
        let title = format!(
            "{} - {} Chart",
            view.file_name,
            view.config.chart_type.label()
        );
        let area = if self.labels {
            root.titled(&title, ("sans-serif", 24).into_font())?
        } else {
            root.clone()
        };

        if !series.is_empty() {
            match view.config.chart_type {
                ChartType::Bar => self.draw_bars(&area, &series, view.config.is_3d())?,
                ChartType::Line | ChartType::Area | ChartType::Scatter => {
                    self.draw_cartesian(&area, &series, view.config.chart_type)?
                }
                ChartType::Pie => draw_pie(&area, &series)?,
                ChartType::Radar => draw_radar(&area, &series)?,
                ChartType::Funnel => draw_funnel(&area, &series)?,
            }
        }

        root.present()?;
        Ok(())
    }

    fn draw_bars(&self, area: &Area<'_>, series: &Series, three_d: bool) -> DrawResult<()> {
        let n = series.values.len() as f64;
        let (min_y, max_y) = series.bounds();
        let mut chart = self
            .builder(area)
            .build_cartesian_2d(-0.5..n - 0.5, min_y..max_y)?;
        if self.labels {
            let labels = &series.labels;
            chart
                .configure_mesh()
                .disable_x_mesh()
                .x_labels(series.labels.len().min(20))
                .x_label_formatter(&|x| label_at(labels, *x))
                .draw()?;
        }

        let depth_x = 0.15;
        let depth_y = (max_y - min_y) * 0.04;
        for (i, value) in series.values.iter().enumerate() {
            let x = i as f64;
            let (left, right) = (x - 0.35, x + 0.35);
            if three_d {
                // top and side faces, offset up and to the right
                chart.draw_series(std::iter::once(Polygon::new(
                    vec![
                        (left, *value),
                        (left + depth_x, *value + depth_y),
                        (right + depth_x, *value + depth_y),
                        (right, *value),
                    ],
                    BLUE.mix(0.6).filled(),
                )))?;
                chart.draw_series(std::iter::once(Polygon::new(
                    vec![
                        (right, 0.0),
                        (right + depth_x, depth_y),
                        (right + depth_x, *value + depth_y),
                        (right, *value),
                    ],
                    BLUE.mix(0.4).filled(),
                )))?;
            }
            chart.draw_series(std::iter::once(Rectangle::new(
                [(left, 0.0), (right, *value)],
                BLUE.filled(),
            )))?;
        }
        Ok(())
    }

    fn draw_cartesian(&self, area: &Area<'_>, series: &Series, kind: ChartType) -> DrawResult<()> {
        let n = series.values.len() as f64;
        let (min_y, max_y) = series.bounds();
        let mut chart = self
            .builder(area)
            .build_cartesian_2d(-0.5..n - 0.5, min_y..max_y)?;
        if self.labels {
            let labels = &series.labels;
            chart
                .configure_mesh()
                .x_labels(series.labels.len().min(20))
                .x_label_formatter(&|x| label_at(labels, *x))
                .draw()?;
        }

        let points: Vec<(f64, f64)> = series
            .values
            .iter()
            .enumerate()
            .map(|(i, y)| (i as f64, *y))
            .collect();

        match kind {
            ChartType::Area => {
                chart.draw_series(
                    AreaSeries::new(points, 0.0, BLUE.mix(0.2)).border_style(BLUE),
                )?;
            }
            ChartType::Scatter => {
                chart.draw_series(
                    points
                        .into_iter()
                        .map(|(x, y)| Circle::new((x, y), 5, GREEN.filled())),
                )?;
            }
            _ => {
                chart.draw_series(LineSeries::new(points, &BLUE))?;
            }
        }
        Ok(())
    }

    fn builder<'a, 'b, 'c>(&self, area: &'a Area<'b>) -> ChartBuilder<'a, 'c, BitMapBackend<'b>> {
        let mut builder = ChartBuilder::on(area);
        builder.margin(10);
        if self.labels {
            builder.x_label_area_size(30).y_label_area_size(50);
        }
        builder
    }
}

fn label_at(labels: &[String], x: f64) -> String {
    let rounded = x.round();
    if (x - rounded).abs() > 0.01 || rounded < 0.0 {
        return String::new();
    }
    labels.get(rounded as usize).cloned().unwrap_or_default()
}

fn draw_pie(area: &Area<'_>, series: &Series) -> DrawResult<()> {
    let (w, h) = area.dim_in_pixel();
    let center = (w as f64 / 2.0, h as f64 / 2.0);
    let radius = w.min(h) as f64 * 0.4;
    let total: f64 = series.values.iter().map(|v| v.abs()).sum();
    if total <= 0.0 {
        return Ok(());
    }

    let mut start = -PI / 2.0;
    for (i, value) in series.values.iter().enumerate() {
        let sweep = value.abs() / total * 2.0 * PI;
        if sweep <= 0.0 {
            continue;
        }
        let steps = ((sweep / (2.0 * PI)) * 90.0).ceil().max(2.0) as usize;
        let mut points = vec![(center.0 as i32, center.1 as i32)];
        for s in 0..=steps {
            let angle = start + sweep * s as f64 / steps as f64;
            points.push((
                (center.0 + radius * angle.cos()) as i32,
                (center.1 + radius * angle.sin()) as i32,
            ));
        }
        area.draw(&Polygon::new(points, Palette99::pick(i).filled()))?;
        start += sweep;
    }
    Ok(())
}

fn draw_radar(area: &Area<'_>, series: &Series) -> DrawResult<()> {
    let (w, h) = area.dim_in_pixel();
    let center = (w as f64 / 2.0, h as f64 / 2.0);
    let radius = w.min(h) as f64 * 0.4;
    let max = series.values.iter().cloned().fold(0.0_f64, f64::max);
    let n = series.values.len();
    if max <= 0.0 || n < 3 {
        // a radar needs at least a triangle
        return Ok(());
    }

    let point = |i: usize, scale: f64| {
        let angle = -PI / 2.0 + 2.0 * PI * i as f64 / n as f64;
        (
            (center.0 + radius * scale * angle.cos()) as i32,
            (center.1 + radius * scale * angle.sin()) as i32,
        )
    };

    for i in 0..n {
        area.draw(&PathElement::new(
            vec![(center.0 as i32, center.1 as i32), point(i, 1.0)],
            BLACK.mix(0.3),
        ))?;
    }
    let outline: Vec<(i32, i32)> = series
        .values
        .iter()
        .enumerate()
        .map(|(i, v)| point(i, v.max(0.0) / max))
        .collect();
    area.draw(&Polygon::new(outline.clone(), BLUE.mix(0.3).filled()))?;
    let mut closed = outline;
    closed.push(closed[0]);
    area.draw(&PathElement::new(closed, BLUE))?;
    Ok(())
}

fn draw_funnel(area: &Area<'_>, series: &Series) -> DrawResult<()> {
    let (w, h) = area.dim_in_pixel();
    let mut values: Vec<f64> = series.values.iter().map(|v| v.max(0.0)).collect();
    values.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let max = values.first().cloned().unwrap_or(0.0);
    if max <= 0.0 {
        return Ok(());
    }

    let step = h as f64 * 0.9 / values.len() as f64;
    let top = h as f64 * 0.05;
    let full = w as f64 * 0.8;
    for (i, value) in values.iter().enumerate() {
        let width = full * value / max;
        let x0 = (w as f64 - width) / 2.0;
        let y0 = top + step * i as f64;
        area.draw(&Rectangle::new(
            [
                (x0 as i32, y0 as i32),
                ((x0 + width) as i32, (y0 + step * 0.9) as i32),
            ],
            Palette99::pick(i).filled(),
        ))?;
    }
    Ok(())
}
