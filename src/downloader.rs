use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use std::io::Write;

use crate::chart::{ChartConfig, ChartType};
use crate::dataset::Row;
use crate::error::{DatavisError, Result};

/// A4 portrait page, in millimetres
pub const PAGE_WIDTH_MM: f64 = 210.0;
pub const PAGE_HEIGHT_MM: f64 = 297.0;
/// Margin around the chart on the PDF page
pub const PAGE_MARGIN_MM: f64 = 10.0;

const POINTS_PER_MM: f64 = 72.0 / 25.4;

/// Download formats offered for the chart
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Pdf,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Pdf => "application/pdf",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExportFormat::Png => "PNG",
            ExportFormat::Pdf => "PDF",
        }
    }
}

/// Everything a renderer needs to draw the current chart
#[derive(Clone, Copy, Debug)]
pub struct ChartView<'a> {
    pub file_name: &'a str,
    pub rows: &'a [Row],
    pub config: &'a ChartConfig,
}

/// Raw 8-bit RGB pixels of a rendered chart
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChartImage {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

/// Draws a chart into pixels
pub trait ChartExporter {
    fn render(&self, view: &ChartView<'_>) -> Result<ChartImage>;
}

/// A finished download
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportedFile {
    pub file_name: String,
    pub format: ExportFormat,
    pub bytes: Vec<u8>,
}

/// Download name for a chart, e.g. `q1-bar-chart.png`
///
/// The stem is the uploaded file name up to its first dot, or `chart` when
/// that is empty.
pub fn export_file_name(file_name: &str, chart_type: ChartType, format: ExportFormat) -> String {
    let stem = file_name
        .split('.')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("chart");
    format!("{}-{}-chart.{}", stem, chart_type, format.extension())
}

/// Where the chart image sits on the PDF page, in millimetres from the top left
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PdfPlacement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PdfPlacement {
    /// Fill the page width inside the margins, keeping the aspect ratio
    pub fn fit(image_width: u32, image_height: u32) -> Option<Self> {
        if image_width == 0 || image_height == 0 {
            return None;
        }
        let width = PAGE_WIDTH_MM - 2.0 * PAGE_MARGIN_MM;
        let height = image_height as f64 * width / image_width as f64;
        Some(Self {
            x: PAGE_MARGIN_MM,
            y: PAGE_MARGIN_MM,
            width,
            height,
        })
    }
}

/// Render the chart and encode it in the requested format
pub fn export_chart<E: ChartExporter + ?Sized>(
    exporter: &E,
    view: &ChartView<'_>,
    format: ExportFormat,
) -> Result<ExportedFile> {
    let image = exporter.render(view)?;
    if image.rgb.len() != (image.width as usize) * (image.height as usize) * 3 {
        return Err(DatavisError::Export(format!(
            "renderer returned {} bytes for a {}x{} image",
            image.rgb.len(),
            image.width,
            image.height
        )));
    }

    let bytes = match format {
        ExportFormat::Png => encode_png(&image)?,
        ExportFormat::Pdf => encode_pdf(&image)?,
    };

    Ok(ExportedFile {
        file_name: export_file_name(view.file_name, view.config.chart_type, format),
        format,
        bytes,
    })
}

pub fn encode_png(image: &ChartImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    PngEncoder::new(&mut buffer)
        .write_image(&image.rgb, image.width, image.height, ColorType::Rgb8)
        .map_err(|e| DatavisError::Export(e.to_string()))?;
    Ok(buffer)
}

/// Single-page PDF with the image placed per [`PdfPlacement::fit`]
pub fn encode_pdf(image: &ChartImage) -> Result<Vec<u8>> {
    let placement = PdfPlacement::fit(image.width, image.height)
        .ok_or_else(|| DatavisError::Export("image has no area".to_string()))?;

    let mut zlib = ZlibEncoder::new(Vec::new(), Compression::default());
    zlib.write_all(&image.rgb)?;
    let pixels = zlib.finish()?;

    let page_w = PAGE_WIDTH_MM * POINTS_PER_MM;
    let page_h = PAGE_HEIGHT_MM * POINTS_PER_MM;
    let draw_w = placement.width * POINTS_PER_MM;
    let draw_h = placement.height * POINTS_PER_MM;
    let draw_x = placement.x * POINTS_PER_MM;
    // PDF space starts at the bottom left
    let draw_y = page_h - (placement.y * POINTS_PER_MM) - draw_h;
    let content = format!(
        "q {:.2} 0 0 {:.2} {:.2} {:.2} cm /Im0 Do Q",
        draw_w, draw_h, draw_x, draw_y
    );

    let mut out: Vec<u8> = Vec::new();
    let mut offsets = Vec::with_capacity(5);
    out.extend_from_slice(b"%PDF-1.4\n");

    offsets.push(out.len());
    out.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");

    offsets.push(out.len());
    out.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n");

    offsets.push(out.len());
    out.extend_from_slice(
        format!(
            "3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
             /Resources << /XObject << /Im0 4 0 R >> >> /Contents 5 0 R >>\nendobj\n",
            page_w, page_h
        )
        .as_bytes(),
    );

    offsets.push(out.len());
    out.extend_from_slice(
        format!(
            "4 0 obj\n<< /Type /XObject /Subtype /Image /Width {} /Height {} \
             /ColorSpace /DeviceRGB /BitsPerComponent 8 /Filter /FlateDecode /Length {} >>\nstream\n",
            image.width,
            image.height,
            pixels.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&pixels);
    out.extend_from_slice(b"\nendstream\nendobj\n");

    offsets.push(out.len());
    out.extend_from_slice(
        format!(
            "5 0 obj\n<< /Length {} >>\nstream\n{}\nendstream\nendobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );

    let xref_at = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", offsets.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            offsets.len() + 1,
            xref_at
        )
        .as_bytes(),
    );

    Ok(out)
}
