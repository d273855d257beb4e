//! Pure set operations over glyph ink masks
//!
//! Every function here is deterministic and side-effect free; outputs only
//! ever contain palette tones.

use crate::compositing::bitmap::{GlyphBitmap, Tone, ToneMap};
use crate::error::CompositeError;

/// Two-glyph question/answer pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairDiff {
    /// Ink where both glyphs are ink (equals the intersection)
    pub question: GlyphBitmap,
    /// Purple shared, blue first-only, red second-only, white neither
    pub answer: ToneMap,
}

fn check_glyphs(bitmaps: &[GlyphBitmap], required: usize) -> Result<(u32, u32), CompositeError> {
    if bitmaps.len() < required {
        return Err(CompositeError::NotEnoughGlyphs {
            required,
            given: bitmaps.len(),
        });
    }
    let expected = bitmaps[0].dimensions();
    if let Some(other) = bitmaps.iter().find(|b| b.dimensions() != expected) {
        return Err(CompositeError::DimensionMismatch {
            expected,
            found: other.dimensions(),
        });
    }
    Ok(expected)
}

fn combine(
    bitmaps: &[GlyphBitmap],
    (width, height): (u32, u32),
    f: impl Fn(usize) -> bool,
) -> GlyphBitmap {
    let len = (width as usize) * (height as usize);
    let ink = (0..len).map(f).collect();
    GlyphBitmap::from_mask(width, height, ink)
}

/// Ink iff every glyph is ink
pub fn intersection_image(bitmaps: &[GlyphBitmap]) -> Result<GlyphBitmap, CompositeError> {
    let dims = check_glyphs(bitmaps, 2)?;
    Ok(combine(bitmaps, dims, |i| bitmaps.iter().all(|b| b.mask()[i])))
}

/// Ink iff any glyph is ink
pub fn union_image(bitmaps: &[GlyphBitmap]) -> Result<GlyphBitmap, CompositeError> {
    let dims = check_glyphs(bitmaps, 2)?;
    Ok(combine(bitmaps, dims, |i| bitmaps.iter().any(|b| b.mask()[i])))
}

pub fn pair_diff_image(a: &GlyphBitmap, b: &GlyphBitmap) -> Result<PairDiff, CompositeError> {
    let pair = [a.clone(), b.clone()];
    let (width, height) = check_glyphs(&pair, 2)?;
    let question = intersection_image(&pair)?;
    let tones = a
        .mask()
        .iter()
        .zip(b.mask())
        .map(|(a, b)| match (*a, *b) {
            (true, true) => Tone::Purple,
            (true, false) => Tone::Blue,
            (false, true) => Tone::Red,
            (false, false) => Tone::White,
        })
        .collect();
    Ok(PairDiff {
        question,
        answer: ToneMap::from_tones(width, height, tones),
    })
}

/// Reveal frame `step` (1..N-1): how glyph `step` narrows the running intersection
/// of glyphs `0..step`.
///
/// * red: whole prefix ink, glyph `step` blank (drops out of the intersection)
/// * purple: whole prefix ink, glyph `step` ink
/// * soft red: some but not all of the prefix ink, glyph `step` blank
/// * blue: glyph `step` ink, prefix not uniformly ink
///
/// With a one-glyph prefix this is the plain pair rule: purple both,
/// red first-only, blue second-only.
pub fn step_frame(bitmaps: &[GlyphBitmap], step: usize) -> Result<ToneMap, CompositeError> {
    let (width, height) = check_glyphs(bitmaps, 2)?;
    if step == 0 || step >= bitmaps.len() {
        return Err(CompositeError::StepOutOfRange {
            step,
            glyphs: bitmaps.len(),
        });
    }
    let (prefix, rest) = bitmaps.split_at(step);
    let current = rest[0].mask();
    let len = (width as usize) * (height as usize);
    let tones = (0..len)
        .map(|i| {
            let inked = prefix.iter().filter(|b| b.mask()[i]).count();
            let all_prefix = inked == prefix.len();
            let some_prefix = inked > 0 && !all_prefix;
            match (all_prefix, current[i]) {
                (true, false) => Tone::Red,
                (true, true) => Tone::Purple,
                (false, true) => Tone::Blue,
                (false, false) if some_prefix => Tone::SoftRed,
                (false, false) => Tone::White,
            }
        })
        .collect();
    Ok(ToneMap::from_tones(width, height, tones))
}

/// Frames 1..N-1 followed by the exact N-way intersection silhouette
pub fn step_sequence(bitmaps: &[GlyphBitmap]) -> Result<Vec<ToneMap>, CompositeError> {
    check_glyphs(bitmaps, 2)?;
    let mut frames = (1..bitmaps.len())
        .map(|step| step_frame(bitmaps, step))
        .collect::<Result<Vec<_>, _>>()?;
    frames.push(intersection_image(bitmaps)?.to_silhouette());
    Ok(frames)
}
