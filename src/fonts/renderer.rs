//! Glyph rasterization

use crate::compositing::{GlyphBitmap, GLYPH_SIZE};
use crate::fonts::fallback;
use crate::fonts::registry::FontHandle;

/// Coverage at or above this value counts as ink; everything below is blank
pub const INK_COVERAGE: u8 = 255;

/// Renders one character into a fixed-size ink mask.
///
/// Implementations must be deterministic: the same character and face
/// always yield the same bitmap.
pub trait GlyphRenderer: Send + Sync {
    fn render(&self, ch: char, font: &FontHandle) -> GlyphBitmap;

    fn size(&self) -> u32;
}

/// Draws the glyph at the canvas origin with the em size equal to the canvas
#[derive(Debug, Clone)]
pub struct FontdueRenderer {
    size: u32,
}

impl FontdueRenderer {
    pub fn new() -> Self {
        Self { size: GLYPH_SIZE }
    }

    pub fn with_size(size: u32) -> Self {
        Self { size }
    }

    fn render_face(&self, face: &fontdue::Font, ch: char) -> GlyphBitmap {
        let px = self.size as f32;
        let (metrics, coverage) = face.rasterize(ch, px);
        let ascent = face
            .horizontal_line_metrics(px)
            .map(|m| m.ascent)
            .unwrap_or(px);
        // fontdue's ymin is the bottom edge relative to the baseline, y-up
        let top = (ascent - (metrics.ymin as f32 + metrics.height as f32)).round() as i64;
        let left = metrics.xmin as i64;

        let mut bitmap = GlyphBitmap::blank(self.size, self.size);
        for row in 0..metrics.height {
            for col in 0..metrics.width {
                if coverage[row * metrics.width + col] < INK_COVERAGE {
                    continue;
                }
                let (x, y) = (left + col as i64, top + row as i64);
                if x >= 0 && y >= 0 {
                    bitmap.set_ink(x as u32, y as u32, true);
                }
            }
        }
        bitmap
    }
}

impl Default for FontdueRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl GlyphRenderer for FontdueRenderer {
    fn render(&self, ch: char, font: &FontHandle) -> GlyphBitmap {
        match font {
            FontHandle::Face(face) => self.render_face(face, ch),
            FontHandle::Builtin => fallback::render(ch, self.size),
        }
    }

    fn size(&self) -> u32 {
        self.size
    }
}
