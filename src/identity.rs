//! Validated domain identifiers
//!
//! `Identity` keys per-channel state, `QuizSlot` is a 1..=10 slot number,
//! `Word` is a compositing / quiz word that has passed the character
//! allow-list, and `FontKey` is a normalized font identifier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SlotRangeError, WordError};

pub const MIN_WORD_CHARS: usize = 2;
pub const MAX_WORD_CHARS: usize = 8;
pub const MIN_SLOT: u8 = 1;
pub const MAX_SLOT: u8 = 10;

// ============================================================================
// Identity
// ============================================================================

/// Channel-scoped owner of settings and quiz slots
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Identity {
    User(String),
    Group(String),
    Room(String),
    Unknown,
}

impl Identity {
    pub fn user(id: impl Into<String>) -> Self {
        Identity::User(id.into())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::User(id) => write!(f, "user:{}", id),
            Identity::Group(id) => write!(f, "group:{}", id),
            Identity::Room(id) => write!(f, "room:{}", id),
            Identity::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for Identity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "unknown" {
            return Ok(Identity::Unknown);
        }
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| format!("identity without kind prefix: {}", s))?;
        match kind {
            "user" => Ok(Identity::User(id.to_string())),
            "group" => Ok(Identity::Group(id.to_string())),
            "room" => Ok(Identity::Room(id.to_string())),
            other => Err(format!("unknown identity kind '{}'", other)),
        }
    }
}

// ============================================================================
// QuizSlot
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct QuizSlot(u8);

impl QuizSlot {
    pub fn new(number: i64) -> Result<Self, SlotRangeError> {
        if (MIN_SLOT as i64..=MAX_SLOT as i64).contains(&number) {
            Ok(Self(number as u8))
        } else {
            Err(SlotRangeError(number))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Every slot in ascending order
    pub fn all() -> impl Iterator<Item = QuizSlot> {
        (MIN_SLOT..=MAX_SLOT).map(QuizSlot)
    }

    /// Parse a decimal slot number; non-digit text yields `SlotRangeError(0)`
    pub fn parse(text: &str) -> Result<Self, SlotRangeError> {
        let text = text.trim();
        if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
            return Err(SlotRangeError(0));
        }
        let number = text.parse::<i64>().unwrap_or(i64::MAX);
        Self::new(number)
    }
}

impl TryFrom<i64> for QuizSlot {
    type Error = SlotRangeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<QuizSlot> for u8 {
    fn from(slot: QuizSlot) -> u8 {
        slot.0
    }
}

impl fmt::Display for QuizSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Word
// ============================================================================

/// Hiragana, Katakana, CJK Unified Ideographs, ASCII digits and letters
pub fn is_allowed_char(ch: char) -> bool {
    matches!(ch,
        '\u{3041}'..='\u{309F}'
        | '\u{30A0}'..='\u{30FF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '0'..='9'
        | 'A'..='Z'
        | 'a'..='z')
}

/// True if every character passes the allow-list (length is not checked)
pub fn is_allowed_word(text: &str) -> bool {
    text.chars().all(is_allowed_char)
}

pub fn has_word_length(text: &str) -> bool {
    (MIN_WORD_CHARS..=MAX_WORD_CHARS).contains(&text.chars().count())
}

/// A 2-8 character word made only of allowed characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Word(String);

impl Word {
    pub fn parse(text: &str) -> Result<Self, WordError> {
        let len = text.chars().count();
        if !(MIN_WORD_CHARS..=MAX_WORD_CHARS).contains(&len) {
            return Err(WordError::Length { len });
        }
        if let Some(ch) = text.chars().find(|c| !is_allowed_char(*c)) {
            return Err(WordError::Character { ch });
        }
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn chars(&self) -> impl Iterator<Item = char> + '_ {
        self.0.chars()
    }

    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }
}

impl TryFrom<String> for Word {
    type Error = WordError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Word::parse(&value)
    }
}

impl From<Word> for String {
    fn from(word: Word) -> String {
        word.0
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// FontKey
// ============================================================================

pub const DEFAULT_FONT_KEY: &str = "default";

/// Normalized font identifier; construct through `FontRegistry::normalize`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FontKey(String);

impl FontKey {
    pub fn default_key() -> Self {
        Self(DEFAULT_FONT_KEY.to_string())
    }

    pub(crate) fn from_registered(key: &str) -> Self {
        Self(key.to_string())
    }

    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_FONT_KEY
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `_<key>` for named fonts, empty for the default font
    pub fn file_suffix(&self) -> String {
        if self.is_default() {
            String::new()
        } else {
            format!("_{}", self.0)
        }
    }
}

impl Default for FontKey {
    fn default() -> Self {
        Self::default_key()
    }
}

impl fmt::Display for FontKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_roundtrip() {
        for raw in ["user:U1", "group:G1", "room:R1", "unknown"] {
            let identity: Identity = raw.parse().unwrap();
            assert_eq!(identity.to_string(), raw);
        }
        assert!("channel:x".parse::<Identity>().is_err());
    }

    #[test]
    fn test_slot_bounds() {
        assert!(QuizSlot::new(0).is_err());
        assert_eq!(QuizSlot::new(1).unwrap().get(), 1);
        assert_eq!(QuizSlot::new(10).unwrap().get(), 10);
        assert_eq!(QuizSlot::new(11), Err(SlotRangeError(11)));
        assert_eq!(QuizSlot::parse(" 7 ").unwrap().get(), 7);
        assert!(QuizSlot::parse("x").is_err());
        assert!(QuizSlot::parse("99999999999999999999999").is_err());
        assert_eq!(QuizSlot::all().count(), 10);
    }

    #[test]
    fn test_word_length_boundary() {
        assert_eq!(Word::parse("森"), Err(WordError::Length { len: 1 }));
        assert!(Word::parse("森林").is_ok());
        assert!(Word::parse("一二三四五六七八").is_ok());
        assert_eq!(
            Word::parse("一二三四五六七八九"),
            Err(WordError::Length { len: 9 })
        );
    }

    #[test]
    fn test_word_rejects_single_symbol() {
        assert_eq!(Word::parse("森!林"), Err(WordError::Character { ch: '!' }));
        assert!(Word::parse("ab12").is_ok());
        assert!(Word::parse("カタカナ").is_ok());
        assert!(Word::parse("ひらがな").is_ok());
        assert!(Word::parse("ＡＢ").is_err());
    }

    #[test]
    fn test_font_key_suffix() {
        assert_eq!(FontKey::default_key().file_suffix(), "");
        assert_eq!(FontKey::from_registered("mincho").file_suffix(), "_mincho");
    }
}
