//! Mention markup removal

use crate::line::event::Mentionee;

/// Remove every mention range from `text`.
///
/// Ranges are character offsets and are removed from the highest index
/// down, so earlier removals never shift later ones. Ranges past the end
/// of the text are clamped; zero-length ranges are ignored.
pub fn strip_mentions(text: &str, mentionees: &[Mentionee]) -> String {
    let mut chars: Vec<char> = text.chars().collect();
    let mut ranges: Vec<(usize, usize)> = mentionees
        .iter()
        .filter(|m| m.length > 0)
        .map(|m| (m.index, m.length))
        .collect();
    ranges.sort_by(|a, b| b.0.cmp(&a.0));

    for (index, length) in ranges {
        let start = index.min(chars.len());
        let end = index.saturating_add(length).min(chars.len());
        chars.drain(start..end);
    }
    chars.into_iter().collect()
}
