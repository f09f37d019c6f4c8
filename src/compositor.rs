// Page composition: background template, image grid and form text on one
// fixed-size canvas.

use std::io::Read;
use std::sync::Arc;

use ::image::codecs::jpeg::JpegEncoder;
use ::image::imageops::{self, FilterType};
use ::image::{DynamicImage, RgbaImage};
use chrono::NaiveDate;

use crate::album::AlbumEntry;
use crate::error::{AppError, Result};
use crate::fields::{self, field, FieldSnapshot};
use crate::layout::{self, Anchor, CELL_HEIGHT, CELL_WIDTH, IMAGES_PER_PAGE, PAGE_HEIGHT_PX, PAGE_WIDTH_PX};
use crate::text::TextPainter;
use crate::thai::format_thai_date;

const CHECKMARK: &str = "\u{2713}";

// ============================================================================
// Inputs and outputs
// ============================================================================

/// Background artwork, scaled once to the page size and shared read-only.
#[derive(Debug, Clone)]
pub struct Template {
    image: RgbaImage,
}

impl Template {
    /// Load from a file path or an http(s) URL.
    pub fn load(source: &str) -> Result<Self> {
        let bytes = if source.starts_with("http://") || source.starts_with("https://") {
            let response = ureq::get(source)
                .call()
                .map_err(|e| AppError::TemplateError(format!("Failed to fetch URL: {}", e)))?;

            let mut bytes = Vec::new();
            response
                .into_reader()
                .read_to_end(&mut bytes)
                .map_err(|e| AppError::TemplateError(format!("Failed to read response: {}", e)))?;
            bytes
        } else {
            std::fs::read(source).map_err(|e| AppError::TemplateError(format!("{}: {}", source, e)))?
        };

        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let img = ::image::load_from_memory(bytes)
            .map_err(|e| AppError::TemplateError(format!("Failed to decode image: {}", e)))?;
        Ok(Self::from_image(img))
    }

    pub fn from_image(img: DynamicImage) -> Self {
        let rgba = img.to_rgba8();
        let image = if rgba.dimensions() == (PAGE_WIDTH_PX, PAGE_HEIGHT_PX) {
            rgba
        } else {
            imageops::resize(&rgba, PAGE_WIDTH_PX, PAGE_HEIGHT_PX, FilterType::Triangle)
        };
        Self { image }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

/// An encoded image destined for one grid slot.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl PageImage {
    /// A standalone copy of the entry's bytes.
    pub fn from_entry(entry: &AlbumEntry) -> Self {
        Self {
            name: entry.display_name.clone(),
            bytes: entry.source_bytes.to_vec(),
        }
    }

    fn decode(&self) -> Result<DynamicImage> {
        ::image::load_from_memory(&self.bytes)
            .map_err(|e| AppError::DecodeError(format!("{}: {}", self.name, e)))
    }
}

/// Everything besides images that a page needs.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub fields: FieldSnapshot,
    /// Date used when the form leaves the date blank.
    pub today: NaiveDate,
}

/// A finished page at the fixed page resolution.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    canvas: RgbaImage,
}

impl RenderedPage {
    pub fn new(canvas: RgbaImage) -> Result<Self> {
        if canvas.dimensions() != (PAGE_WIDTH_PX, PAGE_HEIGHT_PX) {
            let (w, h) = canvas.dimensions();
            return Err(AppError::ComposeError(format!(
                "page must be {}x{}, got {}x{}",
                PAGE_WIDTH_PX, PAGE_HEIGHT_PX, w, h
            )));
        }
        Ok(Self { canvas })
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        let rgb = DynamicImage::ImageRgba8(self.canvas.clone()).to_rgb8();
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, quality)
            .encode_image(&rgb)
            .map_err(|e| AppError::PdfError(format!("Failed to encode page: {}", e)))?;
        Ok(bytes)
    }
}

// ============================================================================
// Composition
// ============================================================================

/// Renders one page from up to `IMAGES_PER_PAGE` images.
pub trait PageComposer: Send + Sync {
    /// `index` is the page's 0-based position in the document.
    fn compose(&self, index: usize, images: &[PageImage], ctx: &PageContext) -> Result<RenderedPage>;
}

pub struct Compositor {
    template: Arc<Template>,
    painter: Arc<dyn TextPainter>,
}

impl Compositor {
    pub fn new(template: Arc<Template>, painter: Arc<dyn TextPainter>) -> Self {
        Self { template, painter }
    }

    pub fn compose_page(&self, images: &[PageImage], ctx: &PageContext) -> Result<RenderedPage> {
        if images.len() > IMAGES_PER_PAGE {
            return Err(AppError::ComposeError(format!(
                "a page holds at most {} images, got {}",
                IMAGES_PER_PAGE,
                images.len()
            )));
        }

        // Decode everything first so a bad image rejects the page before drawing.
        let decoded = images
            .iter()
            .map(PageImage::decode)
            .collect::<Result<Vec<_>>>()?;

        let mut canvas = self.template.image().clone();

        for (slot, img) in decoded.iter().enumerate() {
            let (x, y) = layout::slot_origin(slot);
            let cell = imageops::resize(&img.to_rgba8(), CELL_WIDTH, CELL_HEIGHT, FilterType::Triangle);
            imageops::overlay(&mut canvas, &cell, x as i64, y as i64);
        }

        self.draw_fields(&mut canvas, ctx);

        RenderedPage::new(canvas)
    }

    fn draw_fields(&self, canvas: &mut RgbaImage, ctx: &PageContext) {
        let values = &ctx.fields;
        let mut put = |text: &str, at: Anchor| {
            if !text.is_empty() {
                self.painter.draw(canvas, text, at);
            }
        };

        let full_name = format!("{} {}", field(values, fields::PREFIX), field(values, fields::FIRST_NAME));
        let last_name = field(values, fields::LAST_NAME);
        let months = field(values, fields::MONTHS);
        let semester = field(values, fields::SEMESTER);

        put(&full_name, layout::FULL_NAME);
        put(last_name, layout::LAST_NAME);
        put(field(values, fields::STUDENT_ID), layout::STUDENT_ID);
        put(field(values, fields::CLASS), layout::CLASS);
        put(field(values, fields::POINTS), layout::POINTS);
        put(months, layout::MONTH);
        put(semester, layout::SEMESTER);
        put(field(values, fields::SEMESTER_YEAR), layout::SEMESTER_YEAR);

        if !months.is_empty() {
            put(CHECKMARK, layout::MONTH_CHECK);
        }
        if !semester.is_empty() {
            put(CHECKMARK, layout::SEMESTER_CHECK);
        }

        let date = match field(values, fields::DATE) {
            "" => format_thai_date(ctx.today),
            given => given.to_string(),
        };
        put(&date, layout::DATE);

        let signed_name = format!("{}    {}", full_name, last_name);
        let width = self.painter.measure(&signed_name);
        put(&signed_name, layout::signature_anchor(width));
    }
}

impl PageComposer for Compositor {
    fn compose(&self, index: usize, images: &[PageImage], ctx: &PageContext) -> Result<RenderedPage> {
        tracing::debug!(page = index + 1, images = images.len(), "composing page");
        self.compose_page(images, ctx)
    }
}
