//! Ink masks and fixed-palette rasters

use image::{Rgb, RgbImage};

/// Side length of every rendered glyph
pub const GLYPH_SIZE: u32 = 1024;

/// Binary ink mask for one rendered character
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphBitmap {
    width: u32,
    height: u32,
    ink: Vec<bool>,
}

impl GlyphBitmap {
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ink: vec![false; (width as usize) * (height as usize)],
        }
    }

    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> bool) -> Self {
        let mut ink = Vec::with_capacity((width as usize) * (height as usize));
        for y in 0..height {
            for x in 0..width {
                ink.push(f(x, y));
            }
        }
        Self { width, height, ink }
    }

    pub(crate) fn from_mask(width: u32, height: u32, ink: Vec<bool>) -> Self {
        debug_assert_eq!(ink.len(), (width as usize) * (height as usize));
        Self { width, height, ink }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Out-of-range coordinates read as blank
    pub fn is_ink(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.ink[self.index(x, y)]
    }

    pub fn set_ink(&mut self, x: u32, y: u32, ink: bool) {
        if x < self.width && y < self.height {
            let i = self.index(x, y);
            self.ink[i] = ink;
        }
    }

    pub fn ink_count(&self) -> usize {
        self.ink.iter().filter(|p| **p).count()
    }

    /// Every ink pixel of `self` is also ink in `other`
    pub fn is_subset_of(&self, other: &GlyphBitmap) -> bool {
        self.dimensions() == other.dimensions()
            && self.ink.iter().zip(&other.ink).all(|(a, b)| !*a || *b)
    }

    pub(crate) fn mask(&self) -> &[bool] {
        &self.ink
    }

    /// Black ink on white
    pub fn to_silhouette(&self) -> ToneMap {
        ToneMap {
            width: self.width,
            height: self.height,
            tones: self
                .ink
                .iter()
                .map(|ink| if *ink { Tone::Black } else { Tone::White })
                .collect(),
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }
}

/// The only colors an output image may contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tone {
    Black,
    White,
    Purple,
    Blue,
    Red,
    SoftRed,
}

impl Tone {
    pub fn rgb(self) -> [u8; 3] {
        match self {
            Tone::Black => [0, 0, 0],
            Tone::White => [255, 255, 255],
            Tone::Purple => [70, 20, 190],
            Tone::Blue => [70, 65, 225],
            Tone::Red => [230, 70, 70],
            Tone::SoftRed => [240, 170, 170],
        }
    }
}

/// Raster whose every pixel is a palette `Tone`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToneMap {
    width: u32,
    height: u32,
    tones: Vec<Tone>,
}

impl ToneMap {
    pub(crate) fn from_tones(width: u32, height: u32, tones: Vec<Tone>) -> Self {
        debug_assert_eq!(tones.len(), (width as usize) * (height as usize));
        Self {
            width,
            height,
            tones,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn tone_at(&self, x: u32, y: u32) -> Tone {
        self.tones[(y as usize) * (self.width as usize) + (x as usize)]
    }

    pub fn count(&self, tone: Tone) -> usize {
        self.tones.iter().filter(|t| **t == tone).count()
    }

    /// Pixels that are not white, as an ink mask
    pub fn ink_mask(&self) -> GlyphBitmap {
        GlyphBitmap::from_mask(
            self.width,
            self.height,
            self.tones.iter().map(|t| *t != Tone::White).collect(),
        )
    }

    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| Rgb(self.tone_at(x, y).rgb()))
    }

    /// Packed RGB24 rows, as consumed by raw-video encoders
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        self.tones.iter().flat_map(|t| t.rgb()).collect()
    }
}
