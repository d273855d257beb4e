//! Built-in 5x7 block face used when no font file could be loaded
//!
//! Covers ASCII digits and letters (lowercase drawn as uppercase); every
//! other character renders as a hollow box.

use crate::compositing::GlyphBitmap;

const COLS: u32 = 5;
const ROWS: u32 = 7;

const TOFU: [u8; 7] = [0x1F, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1F];

const DIGITS: [[u8; 7]; 10] = [
    [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
    [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
    [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
    [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
    [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
    [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
    [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
    [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
    [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
    [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
];

const LETTERS: [[u8; 7]; 26] = [
    [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
    [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
    [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
    [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
    [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
    [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
    [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
    [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
    [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
    [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
    [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
    [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
    [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
    [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
    [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
    [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
    [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
    [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
    [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
    [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
    [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
    [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
    [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
    [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
    [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
    [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
];

fn rows_for(ch: char) -> &'static [u8; 7] {
    match ch {
        '0'..='9' => &DIGITS[(ch as u8 - b'0') as usize],
        'A'..='Z' => &LETTERS[(ch as u8 - b'A') as usize],
        'a'..='z' => &LETTERS[(ch as u8 - b'a') as usize],
        _ => &TOFU,
    }
}

/// Scale the 5x7 cell up to fill a `size` x `size` square, centered
pub fn render(ch: char, size: u32) -> GlyphBitmap {
    let rows = rows_for(ch);
    let scale = (size / (ROWS + 1)).max(1);
    let left = size.saturating_sub(COLS * scale) / 2;
    let top = size.saturating_sub(ROWS * scale) / 2;
    GlyphBitmap::from_fn(size, size, |x, y| {
        if x < left || y < top {
            return false;
        }
        let (col, row) = ((x - left) / scale, (y - top) / scale);
        if col >= COLS || row >= ROWS {
            return false;
        }
        rows[row as usize] & (1 << (COLS - 1 - col)) != 0
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_glyphs() {
        assert_ne!(render('A', 64), render('B', 64));
        assert_eq!(render('a', 64), render('A', 64));
    }

    #[test]
    fn test_unknown_is_box() {
        let tofu = render('森', 64);
        assert_eq!(tofu, render('林', 64));
        assert!(tofu.ink_count() > 0);
    }
}
