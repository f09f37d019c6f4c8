// Text rasterisation onto rendered pages.

use std::path::Path;

use ::image::{Rgba, RgbaImage};
use ab_glyph::{point, Font, FontArc, GlyphId, PxScale, ScaleFont};

use crate::error::{AppError, Result};
use crate::layout::Anchor;

/// Measures and draws single-line text in one fixed face, size and color.
pub trait TextPainter: Send + Sync {
    /// Advance width of `text` in canvas pixels.
    fn measure(&self, text: &str) -> f32;

    /// Draw `text` starting at the anchor's left edge on its baseline.
    fn draw(&self, canvas: &mut RgbaImage, text: &str, at: Anchor);
}

/// TrueType/OpenType painter.
pub struct GlyphPainter {
    font: FontArc,
    scale: PxScale,
    color: Rgba<u8>,
}

impl GlyphPainter {
    /// `size_px` is the em size, as a canvas font size would be given.
    pub fn from_bytes(bytes: Vec<u8>, size_px: f32) -> Result<Self> {
        let font = FontArc::try_from_vec(bytes).map_err(|e| AppError::FontError(e.to_string()))?;
        let units_per_em = font
            .units_per_em()
            .ok_or_else(|| AppError::FontError("font has no units-per-em".to_string()))?;
        let scale = PxScale::from(size_px * font.height_unscaled() / units_per_em);
        Ok(Self {
            font,
            scale,
            color: Rgba([0, 0, 0, 255]),
        })
    }

    pub fn load(path: &Path, size_px: f32) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| AppError::FontError(format!("{}: {}", path.display(), e)))?;
        Self::from_bytes(bytes, size_px)
    }

    /// Glyph ids with their pen x offset from the text start.
    ///
    /// Glyphs are placed from the cmap and kerning alone; there is no
    /// GSUB/GPOS shaping. Thai above and below marks take no advance and sit
    /// on the preceding consonant, which relies on the font drawing them with
    /// a negative left bearing as Thai faces do. Fonts whose default tone
    /// marks expect a shaper to lift them over an upper vowel will overlap.
    fn layout(&self, text: &str) -> (Vec<(GlyphId, f32)>, f32) {
        let scaled = self.font.as_scaled(self.scale);
        let mut caret = 0.0;
        let mut previous: Option<GlyphId> = None;
        let mut glyphs = Vec::with_capacity(text.len());

        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if is_thai_mark(c) {
                glyphs.push((id, caret));
                continue;
            }
            if let Some(prev) = previous {
                caret += scaled.kern(prev, id);
            }
            glyphs.push((id, caret));
            caret += scaled.h_advance(id);
            previous = Some(id);
        }

        (glyphs, caret)
    }
}

/// Thai vowel and tone marks written above or below a consonant.
fn is_thai_mark(c: char) -> bool {
    matches!(c, '\u{0E31}' | '\u{0E34}'..='\u{0E3A}' | '\u{0E47}'..='\u{0E4E}')
}

impl TextPainter for GlyphPainter {
    fn measure(&self, text: &str) -> f32 {
        self.layout(text).1
    }

    fn draw(&self, canvas: &mut RgbaImage, text: &str, at: Anchor) {
        let (glyphs, _) = self.layout(text);
        let (width, height) = canvas.dimensions();
        let Rgba([cr, cg, cb, _]) = self.color;

        for (id, offset) in glyphs {
            let glyph = id.with_scale_and_position(self.scale, point(at.x + offset, at.y));
            let Some(outlined) = self.font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let x = bounds.min.x as i64 + gx as i64;
                let y = bounds.min.y as i64 + gy as i64;
                if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
                    return;
                }
                let pixel = canvas.get_pixel_mut(x as u32, y as u32);
                let Rgba([r, g, b, a]) = *pixel;
                let alpha = coverage.clamp(0.0, 1.0);
                let blend = |bg: u8, fg: u8| (fg as f32 * alpha + bg as f32 * (1.0 - alpha)).round() as u8;
                *pixel = Rgba([blend(r, cr), blend(g, cg), blend(b, cb), a.max((alpha * 255.0) as u8)]);
            });
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records draw calls; every character is 10px wide.
    #[derive(Default)]
    pub(crate) struct RecordingPainter {
        pub(crate) calls: Mutex<Vec<(String, Anchor)>>,
    }

    impl RecordingPainter {
        pub(crate) fn drawn(&self) -> Vec<(String, Anchor)> {
            self.calls.lock().unwrap().clone()
        }

        pub(crate) fn anchor_of(&self, text: &str) -> Option<Anchor> {
            self.drawn()
                .into_iter()
                .find(|(t, _)| t == text)
                .map(|(_, a)| a)
        }
    }

    impl TextPainter for RecordingPainter {
        fn measure(&self, text: &str) -> f32 {
            text.chars().count() as f32 * 10.0
        }

        fn draw(&self, _canvas: &mut RgbaImage, text: &str, at: Anchor) {
            self.calls.lock().unwrap().push((text.to_string(), at));
        }
    }

    const FIXTURE_FONT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/DejaVuSans.ttf");

    fn fixture_painter(size_px: f32) -> GlyphPainter {
        GlyphPainter::load(Path::new(FIXTURE_FONT), size_px).unwrap()
    }

    #[test]
    fn measures_with_the_em_size() {
        let painter = fixture_painter(32.0);
        let width = painter.measure("M");
        assert!(width > 20.0 && width < 45.0, "unexpected width {}", width);
        assert_eq!(painter.measure(""), 0.0);
        assert!(painter.measure("MM") > width * 1.9);

        let doubled = fixture_painter(64.0).measure("M");
        assert!((doubled - 2.0 * width).abs() < 0.5, "{} vs {}", doubled, width);
    }

    #[test]
    fn draws_dark_pixels_above_the_baseline() {
        let painter = fixture_painter(32.0);
        let mut canvas = RgbaImage::from_pixel(120, 100, Rgba([255, 255, 255, 255]));
        painter.draw(&mut canvas, "M", Anchor { x: 10.0, y: 60.0 });

        let dark: Vec<(u32, u32)> = canvas
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] < 128)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!dark.is_empty());
        assert!(dark.iter().all(|&(_, y)| (30..=61).contains(&y)), "{:?}", dark);
        assert!(dark.iter().all(|&(x, _)| (9..=10 + painter.measure("M").ceil() as u32).contains(&x)));
    }

    #[test]
    fn text_outside_the_canvas_is_clipped() {
        let painter = fixture_painter(32.0);
        let mut canvas = RgbaImage::from_pixel(20, 20, Rgba([255, 255, 255, 255]));
        painter.draw(&mut canvas, "MMMM", Anchor { x: 5.0, y: 200.0 });
        assert!(canvas.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn thai_marks_take_no_advance() {
        let painter = fixture_painter(32.0);
        // ชื่อ: consonant, upper vowel, tone mark, consonant.
        assert_eq!(
            painter.measure("\u{0E0A}\u{0E37}\u{0E48}\u{0E2D}"),
            painter.measure("\u{0E0A}\u{0E2D}")
        );
        assert!(is_thai_mark('\u{0E48}'));
        assert!(!is_thai_mark('\u{0E2D}'));
    }

    #[test]
    fn rejects_bytes_that_are_not_a_font() {
        let err = GlyphPainter::from_bytes(b"not a font".to_vec(), 32.0).err().unwrap();
        assert!(matches!(err, AppError::FontError(_)));
    }

    #[test]
    fn missing_font_file_is_a_font_error() {
        let err = GlyphPainter::load(Path::new("/nonexistent/THSarabunNew.ttf"), 32.0)
            .err()
            .unwrap();
        assert!(matches!(err, AppError::FontError(_)));
    }
}
