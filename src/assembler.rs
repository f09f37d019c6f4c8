// Document assembly: album -> pages -> one PDF.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local, SecondsFormat, Utc};
use printpdf::{ColorBits, ColorSpace, Image, ImageFilter, ImageTransform, ImageXObject, Mm, PdfDocument, Px};

use crate::album::AlbumEntry;
use crate::compositor::{PageComposer, PageContext, PageImage, RenderedPage};
use crate::error::{AppError, Result};
use crate::fields::{field, FieldSnapshot, FIRST_NAME, LAST_NAME};
use crate::layout::{px_to_mm, IMAGES_PER_PAGE, JPEG_QUALITY, PAGE_DPI};

/// Length of the compact timestamp in generated filenames (`YYYYMMDDTHHMMSS`).
const TIMESTAMP_LEN: usize = 15;

const DOCUMENT_TITLE: &str = "Student Album";

/// A finished PDF and the name it should be saved under (without extension).
#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

impl Document {
    pub fn file_name(&self) -> String {
        format!("{}.pdf", self.filename)
    }

    /// Write into `dir`, replacing any file of the same name.
    pub fn save_in(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

pub struct Assembler {
    composer: Arc<dyn PageComposer>,
}

impl Assembler {
    pub fn new(composer: Arc<dyn PageComposer>) -> Self {
        Self { composer }
    }

    pub async fn assemble(&self, entries: &[AlbumEntry], fields: &FieldSnapshot) -> Result<Document> {
        self.assemble_at(entries, fields, Local::now()).await
    }

    /// Build the document as of `now`; fails as a whole if any page fails.
    pub async fn assemble_at(
        &self,
        entries: &[AlbumEntry],
        fields: &FieldSnapshot,
        now: DateTime<Local>,
    ) -> Result<Document> {
        if entries.is_empty() {
            return Err(AppError::EmptyAlbum);
        }

        let images = entries.iter().map(PageImage::from_entry).collect();
        let ctx = PageContext {
            fields: fields.clone(),
            today: now.date_naive(),
        };

        let pages = self.compose_pages(images, ctx).await?;
        let page_count = pages.len();
        let bytes = tokio::task::spawn_blocking(move || write_pdf(&pages))
            .await
            .map_err(|e| AppError::PdfError(format!("Task join error: {}", e)))??;

        let document = Document {
            filename: document_filename(fields, now.with_timezone(&Utc)),
            page_count,
            bytes,
        };
        tracing::info!(
            filename = %document.file_name(),
            pages = document.page_count,
            images = entries.len(),
            "document assembled"
        );
        Ok(document)
    }

    /// Compose every chunk concurrently and return the pages in chunk order.
    pub async fn compose_pages(&self, images: Vec<PageImage>, ctx: PageContext) -> Result<Vec<RenderedPage>> {
        let ctx = Arc::new(ctx);
        let tasks: Vec<_> = chunk(images, IMAGES_PER_PAGE)
            .into_iter()
            .enumerate()
            .map(|(index, batch)| {
                let composer = Arc::clone(&self.composer);
                let ctx = Arc::clone(&ctx);
                tokio::task::spawn_blocking(move || {
                    let page = composer.compose(index, &batch, &ctx);
                    tracing::debug!(page = index + 1, ok = page.is_ok(), "page finished");
                    page
                })
            })
            .collect();

        let mut pages = Vec::with_capacity(tasks.len());
        for (index, task) in tasks.into_iter().enumerate() {
            let page = task
                .await
                .map_err(|e| AppError::ComposeError(format!("page {}: {}", index + 1, e)))??;
            pages.push(page);
        }
        Ok(pages)
    }
}

/// Split into consecutive runs of at most `size`, keeping order.
pub fn chunk<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let mut chunks = Vec::with_capacity(items.len().div_ceil(size.max(1)));
    let mut items = items.into_iter().peekable();
    while items.peek().is_some() {
        chunks.push(items.by_ref().take(size.max(1)).collect());
    }
    chunks
}

/// `{firstName}-{lastName}-{YYYYMMDDTHHMMSS}`, the timestamp in UTC.
///
/// Characters that cannot appear in a file name are replaced with `_` so a
/// name part can never leave the output directory.
pub fn document_filename(fields: &FieldSnapshot, now: DateTime<Utc>) -> String {
    let stamp: String = now
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(TIMESTAMP_LEN)
        .collect();
    format!(
        "{}-{}-{}",
        sanitize_name_part(field(fields, FIRST_NAME)),
        sanitize_name_part(field(fields, LAST_NAME)),
        stamp
    )
}

fn sanitize_name_part(part: &str) -> String {
    part.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

// ============================================================================
// PDF Generation
// ============================================================================

/// One page per rendered page, each filled edge to edge by its JPEG.
pub fn write_pdf(pages: &[RenderedPage]) -> Result<Vec<u8>> {
    let Some((first, rest)) = pages.split_first() else {
        return Err(AppError::PdfError("document has no pages".to_string()));
    };

    let (width_px, height_px) = first.canvas().dimensions();
    let page_width = Mm(px_to_mm(width_px));
    let page_height = Mm(px_to_mm(height_px));

    let (doc, page1, layer1) = PdfDocument::new(DOCUMENT_TITLE, page_width, page_height, "Layer 1");
    embed_page(&doc.get_page(page1).get_layer(layer1), first)?;

    for page in rest {
        let (new_page, new_layer) = doc.add_page(page_width, page_height, "Layer 1");
        embed_page(&doc.get_page(new_page).get_layer(new_layer), page)?;
    }

    doc.save_to_bytes().map_err(|e| AppError::PdfError(e.to_string()))
}

fn embed_page(layer: &printpdf::PdfLayerReference, page: &RenderedPage) -> Result<()> {
    let (width, height) = page.canvas().dimensions();
    let jpeg = page.to_jpeg(JPEG_QUALITY)?;

    let image = Image::from(ImageXObject {
        width: Px(width as usize),
        height: Px(height as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: true,
        image_data: jpeg,
        image_filter: Some(ImageFilter::DCT),
        clipping_bbox: None,
        smask: None,
    });

    image.add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(0.0)),
            translate_y: Some(Mm(0.0)),
            dpi: Some(PAGE_DPI),
            ..Default::default()
        },
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::album::tests::album_of;
    use crate::compositor::{Compositor, Template};
    use crate::layout::{PAGE_HEIGHT_PX, PAGE_WIDTH_PX};
    use crate::text::tests::RecordingPainter;
    use ::image::{DynamicImage, Rgba, RgbaImage};
    use chrono::TimeZone;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Paints each page a shade derived from its index; page 0 is the slowest.
    #[derive(Default)]
    struct ShadedComposer {
        finished: Mutex<Vec<usize>>,
        sizes: Mutex<Vec<(usize, usize)>>,
    }

    fn shade(index: usize) -> Rgba<u8> {
        let v = (index * 40) as u8;
        Rgba([v, v, v, 255])
    }

    impl PageComposer for ShadedComposer {
        fn compose(&self, index: usize, images: &[PageImage], _ctx: &PageContext) -> Result<RenderedPage> {
            if index == 0 {
                std::thread::sleep(Duration::from_millis(300));
            }
            self.sizes.lock().unwrap().push((index, images.len()));
            self.finished.lock().unwrap().push(index);
            RenderedPage::new(RgbaImage::from_pixel(PAGE_WIDTH_PX, PAGE_HEIGHT_PX, shade(index)))
        }
    }

    struct FailingComposer;

    impl PageComposer for FailingComposer {
        fn compose(&self, index: usize, _images: &[PageImage], _ctx: &PageContext) -> Result<RenderedPage> {
            if index == 1 {
                return Err(AppError::DecodeError("img.jpg: truncated".to_string()));
            }
            RenderedPage::new(RgbaImage::new(PAGE_WIDTH_PX, PAGE_HEIGHT_PX))
        }
    }

    fn ctx() -> PageContext {
        PageContext {
            fields: FieldSnapshot::new(),
            today: chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        }
    }

    /// Each page carries exactly one DCT-encoded image.
    fn count_jpeg_pages(pdf: &[u8]) -> usize {
        pdf.windows(b"DCTDecode".len()).filter(|w| *w == b"DCTDecode").count()
    }

    fn images(count: usize) -> Vec<PageImage> {
        (0..count)
            .map(|i| PageImage {
                name: format!("{}.png", i),
                bytes: Vec::new(),
            })
            .collect()
    }

    #[test]
    fn chunks_preserve_order() {
        let chunks = chunk((0..23).collect::<Vec<_>>(), 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], (0..10).collect::<Vec<_>>());
        assert_eq!(chunks[1], (10..20).collect::<Vec<_>>());
        assert_eq!(chunks[2], vec![20, 21, 22]);
        assert!(chunk(Vec::<u8>::new(), 10).is_empty());
        assert_eq!(chunk((0..10).collect::<Vec<_>>(), 10).len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn pages_follow_chunk_order_not_completion_order() {
        let composer = Arc::new(ShadedComposer::default());
        let assembler = Assembler::new(composer.clone());

        let pages = assembler.compose_pages(images(23), ctx()).await.unwrap();

        assert_eq!(pages.len(), 3);
        for (index, page) in pages.iter().enumerate() {
            assert_eq!(*page.canvas().get_pixel(0, 0), shade(index));
        }
        assert_eq!(composer.finished.lock().unwrap().last(), Some(&0));

        let mut sizes = composer.sizes.lock().unwrap().clone();
        sizes.sort();
        assert_eq!(sizes, vec![(0, 10), (1, 10), (2, 3)]);
    }

    #[tokio::test]
    async fn one_failed_page_fails_the_document() {
        let assembler = Assembler::new(Arc::new(FailingComposer));
        let err = assembler.compose_pages(images(25), ctx()).await.unwrap_err();
        assert!(matches!(err, AppError::DecodeError(_)));
    }

    #[tokio::test]
    async fn empty_album_is_rejected() {
        let assembler = Assembler::new(Arc::new(ShadedComposer::default()));
        let err = assembler.assemble(&[], &FieldSnapshot::new()).await.unwrap_err();
        assert!(matches!(err, AppError::EmptyAlbum));
        assert_eq!(err.to_string(), "No images in the album to generate a PDF.");
    }

    #[tokio::test]
    async fn assembles_a_pdf_with_one_page_per_ten_images() {
        let template = Template::from_image(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            PAGE_WIDTH_PX,
            PAGE_HEIGHT_PX,
            Rgba([255, 255, 255, 255]),
        )));
        let compositor = Compositor::new(Arc::new(template), Arc::new(RecordingPainter::default()));
        let assembler = Assembler::new(Arc::new(compositor));

        let album = album_of(12).await;
        let fields: FieldSnapshot = [("firstName", "Somchai"), ("lastName", "Sae")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let now = Local.with_ymd_and_hms(2024, 1, 15, 10, 30, 45).unwrap();

        let document = assembler.assemble_at(album.entries(), &fields, now).await.unwrap();

        assert_eq!(document.page_count, 2);
        assert!(document.bytes.starts_with(b"%PDF"));
        assert_eq!(count_jpeg_pages(&document.bytes), 2);
        assert!(document.filename.starts_with("Somchai-Sae-"));
        assert_eq!(document.filename.len(), "Somchai-Sae-".len() + TIMESTAMP_LEN);

        let dir = tempfile::tempdir().unwrap();
        let path = document.save_in(dir.path()).unwrap();
        assert!(path.ends_with(document.file_name()));
        assert_eq!(std::fs::read(path).unwrap(), document.bytes);
    }

    #[tokio::test]
    async fn corrupt_entry_aborts_assembly() {
        let template = Template::from_image(DynamicImage::ImageRgba8(RgbaImage::new(8, 8)));
        let compositor = Compositor::new(Arc::new(template), Arc::new(RecordingPainter::default()));
        let assembler = Assembler::new(Arc::new(compositor));

        let album = album_of(1).await;
        let mut entries = album.entries().to_vec();
        entries[0].source_bytes = Arc::from(vec![0u8, 1, 2]);

        let err = assembler.assemble(&entries, &FieldSnapshot::new()).await.unwrap_err();
        assert!(matches!(err, AppError::DecodeError(_)));
    }

    #[test]
    fn filename_uses_a_compact_utc_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 45).unwrap();
        let fields: FieldSnapshot = [("firstName", "Somchai"), ("lastName", "Sae")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(document_filename(&fields, now), "Somchai-Sae-20240115T103045");
        assert_eq!(document_filename(&FieldSnapshot::new(), now), "--20240115T103045");
    }

    #[test]
    fn filename_cannot_escape_the_output_directory() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 45).unwrap();
        let fields: FieldSnapshot = [("firstName", "A/B"), ("lastName", "../x")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let name = document_filename(&fields, now);
        assert_eq!(name, "A_B-.._x-20240115T103045");
        assert!(!name.contains('/'));

        let thai: FieldSnapshot = [("firstName", "สมชาย"), ("lastName", "C:\\temp")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(document_filename(&thai, now), "สมชาย-C__temp-20240115T103045");
    }

    #[test]
    fn slashes_in_names_still_save_inside_the_directory() {
        let document = Document {
            filename: document_filename(
                &[("firstName".to_string(), "../A/B".to_string())].into_iter().collect(),
                Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 45).unwrap(),
            ),
            bytes: b"%PDF-1.3".to_vec(),
            page_count: 1,
        };
        let dir = tempfile::tempdir().unwrap();
        let path = document.save_in(dir.path()).unwrap();
        assert_eq!(path.parent(), Some(dir.path()));
        assert!(path.exists());
    }

    #[test]
    fn pdf_needs_at_least_one_page() {
        assert!(matches!(write_pdf(&[]), Err(AppError::PdfError(_))));
    }
}
