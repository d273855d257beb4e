//! Quiz registration and bulk list syntax

use std::collections::BTreeMap;

use crate::error::WordError;
use crate::identity::{has_word_length, QuizSlot, Word};

/// Outcome of reading `<number>.<word>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizMessage {
    InvalidNumber,
    InvalidLength { slot: QuizSlot, len: usize },
    InvalidWord { slot: QuizSlot, text: String },
    Ok { slot: QuizSlot, word: Word },
}

/// `None` when the text has no `.` at all.
///
/// Splits at the first `.`, so the whole digit run before it is the slot
/// number: `10.ok` is slot 10 with word `ok`.
pub fn parse_quiz_message(text: &str) -> Option<QuizMessage> {
    let (number, word) = text.trim().split_once('.')?;
    let slot = match QuizSlot::parse(number) {
        Ok(slot) => slot,
        Err(_) => return Some(QuizMessage::InvalidNumber),
    };
    let word = word.trim();
    if !has_word_length(word) {
        return Some(QuizMessage::InvalidLength {
            slot,
            len: word.chars().count(),
        });
    }
    Some(match Word::parse(word) {
        Ok(word) => QuizMessage::Ok { slot, word },
        Err(_) => QuizMessage::InvalidWord {
            slot,
            text: word.to_string(),
        },
    })
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BulkListError {
    #[error("line is not '<number>.<word>': {0}")]
    Malformed(String),

    #[error("slot {0} listed twice")]
    Duplicate(QuizSlot),

    #[error("slot {0} missing")]
    Missing(QuizSlot),

    #[error("slot {slot}: {source}")]
    InvalidWord {
        slot: QuizSlot,
        #[source]
        source: WordError,
    },
}

/// Read a pasted quiz list.
///
/// `None` unless the first non-empty line starts with `title`. Lines equal
/// to `footer` are skipped; any other line must be `<1-10>.<text>` with no
/// slot repeated.
pub fn parse_bulk_list(
    text: &str,
    title: &str,
    footer: &str,
) -> Option<Result<BTreeMap<QuizSlot, String>, BulkListError>> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    if title.is_empty() || !lines.next()?.starts_with(title) {
        return None;
    }

    let mut entries = BTreeMap::new();
    for line in lines {
        if !footer.is_empty() && line == footer {
            continue;
        }
        let Some((number, word)) = line.split_once('.') else {
            return Some(Err(BulkListError::Malformed(line.to_string())));
        };
        let Ok(slot) = QuizSlot::parse(number) else {
            return Some(Err(BulkListError::Malformed(line.to_string())));
        };
        if entries.insert(slot, word.trim().to_string()).is_some() {
            return Some(Err(BulkListError::Duplicate(slot)));
        }
    }
    Some(Ok(entries))
}

/// Validate a parsed list into per-slot writes.
///
/// Every slot 1..=10 must be present. `unset_label` maps to a delete
/// (`None`); every other word must pass word validation. Nothing is
/// returned unless all ten lines are valid.
pub fn plan_bulk_update(
    entries: &BTreeMap<QuizSlot, String>,
    unset_label: &str,
) -> Result<Vec<(QuizSlot, Option<Word>)>, BulkListError> {
    QuizSlot::all()
        .map(|slot| {
            let text = entries.get(&slot).ok_or(BulkListError::Missing(slot))?;
            if text == unset_label {
                return Ok((slot, None));
            }
            Word::parse(text)
                .map(|word| (slot, Some(word)))
                .map_err(|source| BulkListError::InvalidWord { slot, source })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(n: i64) -> QuizSlot {
        QuizSlot::new(n).unwrap()
    }

    #[test]
    fn test_two_digit_slot_is_greedy() {
        assert_eq!(
            parse_quiz_message("10.ok"),
            Some(QuizMessage::Ok {
                slot: slot(10),
                word: Word::parse("ok").unwrap()
            })
        );
    }

    #[test]
    fn test_quiz_message_statuses() {
        assert_eq!(parse_quiz_message("森林"), None);
        assert_eq!(parse_quiz_message("0.森林"), Some(QuizMessage::InvalidNumber));
        assert_eq!(parse_quiz_message("11.森林"), Some(QuizMessage::InvalidNumber));
        assert_eq!(parse_quiz_message("a.森林"), Some(QuizMessage::InvalidNumber));
        assert_eq!(
            parse_quiz_message("3.森"),
            Some(QuizMessage::InvalidLength { slot: slot(3), len: 1 })
        );
        assert_eq!(
            parse_quiz_message("3. 森!林 "),
            Some(QuizMessage::InvalidWord {
                slot: slot(3),
                text: "森!林".to_string()
            })
        );
        assert_eq!(
            parse_quiz_message(" 2 . 音楽性 "),
            Some(QuizMessage::Ok {
                slot: slot(2),
                word: Word::parse("音楽性").unwrap()
            })
        );
    }

    fn full_list(overrides: &[(usize, &str)]) -> String {
        let mut lines = vec!["【問題一覧】".to_string()];
        let words = [
            "森林", "音楽性", "未設定", "山川", "花火", "空港", "電車", "海辺", "雪国", "夕日",
        ];
        for (i, word) in words.iter().enumerate() {
            let word = overrides
                .iter()
                .find(|(n, _)| *n == i + 1)
                .map(|(_, w)| *w)
                .unwrap_or(word);
            lines.push(format!("{}. {}", i + 1, word));
        }
        lines.push("footer".to_string());
        lines.join("\n")
    }

    #[test]
    fn test_bulk_list_roundtrip() {
        let entries = parse_bulk_list(&full_list(&[]), "【問題一覧】", "footer")
            .unwrap()
            .unwrap();
        let plan = plan_bulk_update(&entries, "未設定").unwrap();
        assert_eq!(plan.len(), 10);
        assert_eq!(plan[0], (slot(1), Some(Word::parse("森林").unwrap())));
        assert_eq!(plan[2], (slot(3), None));
    }

    #[test]
    fn test_bulk_list_requires_title() {
        assert!(parse_bulk_list("1. 森林", "【問題一覧】", "").is_none());
        assert!(parse_bulk_list("", "【問題一覧】", "").is_none());
    }

    #[test]
    fn test_bulk_list_rejections() {
        let dup = "【問題一覧】\n1. 森林\n1. 山川";
        assert_eq!(
            parse_bulk_list(dup, "【問題一覧】", "").unwrap(),
            Err(BulkListError::Duplicate(slot(1)))
        );
        let range = "【問題一覧】\n11. 森林";
        assert!(matches!(
            parse_bulk_list(range, "【問題一覧】", "").unwrap(),
            Err(BulkListError::Malformed(_))
        ));

        let entries = parse_bulk_list(&full_list(&[(7, "電!車")]), "【問題一覧】", "footer")
            .unwrap()
            .unwrap();
        assert!(matches!(
            plan_bulk_update(&entries, "未設定"),
            Err(BulkListError::InvalidWord { .. })
        ));

        let partial = parse_bulk_list("【問題一覧】\n1. 森林", "【問題一覧】", "")
            .unwrap()
            .unwrap();
        assert_eq!(
            plan_bulk_update(&partial, "未設定"),
            Err(BulkListError::Missing(slot(2)))
        );
    }
}
