//! Compositing engine
//!
//! Turns rendered glyph ink masks into the question (intersection),
//! answer (pair diff), union, and step-reveal rasters.

pub mod bitmap;
pub mod ops;

pub use bitmap::{GlyphBitmap, Tone, ToneMap, GLYPH_SIZE};
pub use ops::{
    intersection_image, pair_diff_image, step_frame, step_sequence, union_image, PairDiff,
};
