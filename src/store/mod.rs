//! Settings and quiz persistence
//!
//! Two capabilities keyed by [`Identity`]: per-identity [`UserSettings`]
//! and per-identity quiz slots 1..=10. Backends are selected at startup:
//! [`MemoryStore`], [`JsonFileStore`] (JSON blobs on disk), or `PgStore`
//! with the `database` feature.
//!
//! Settings changes go through [`SettingsStore::update_settings`], which
//! applies the mutation atomically per store so concurrent webhook
//! deliveries for one identity cannot lose each other's writes.

pub mod file;
pub mod memory;
#[cfg(feature = "database")]
pub mod postgres;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::identity::{FontKey, Identity, QuizSlot, Word};

pub use file::JsonFileStore;
pub use memory::MemoryStore;
#[cfg(feature = "database")]
pub use postgres::{DatabaseConfig, PgStore};

// ============================================================================
// Records
// ============================================================================

/// Which composite a group quiz shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizMode {
    #[default]
    Intersection,
    Union,
}

impl QuizMode {
    pub fn as_str(self) -> &'static str {
        match self {
            QuizMode::Intersection => "intersection",
            QuizMode::Union => "union",
        }
    }
}

impl fmt::Display for QuizMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuizMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "intersection" | "common" => Ok(QuizMode::Intersection),
            "union" => Ok(QuizMode::Union),
            other => Err(format!("unknown quiz mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default)]
    pub font: FontKey,
    #[serde(default)]
    pub quiz_mode: QuizMode,
}

/// A registered quiz word for one slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizItem {
    pub word: Word,
    /// Owner's quiz mode when the word was registered
    #[serde(default)]
    pub quiz_mode: Option<QuizMode>,
    pub updated_at: DateTime<Utc>,
}

impl QuizItem {
    pub fn new(word: Word, quiz_mode: Option<QuizMode>) -> Self {
        Self {
            word,
            quiz_mode,
            updated_at: Utc::now(),
        }
    }
}

/// One slot of a bulk replacement: `None` deletes the slot
pub type SlotWrite = (QuizSlot, Option<Word>);

/// Mutation applied inside the store's update critical section
pub type SettingsMutator = Box<dyn FnOnce(&mut UserSettings) + Send>;

// ============================================================================
// Capabilities
// ============================================================================

#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Stored settings, or defaults for an unknown identity
    async fn load_settings(&self, identity: &Identity) -> StoreResult<UserSettings>;

    /// Read-modify-write under the store's lock / transaction; returns the committed value
    async fn update_settings(
        &self,
        identity: &Identity,
        mutate: SettingsMutator,
    ) -> StoreResult<UserSettings>;
}

#[async_trait]
pub trait QuizStore: Send + Sync {
    async fn get_word(&self, owner: &Identity, slot: QuizSlot) -> StoreResult<Option<QuizItem>>;

    /// Returns the word the slot held before, if any
    async fn set_word(
        &self,
        owner: &Identity,
        slot: QuizSlot,
        word: &Word,
        quiz_mode: Option<QuizMode>,
    ) -> StoreResult<Option<Word>>;

    /// Returns the deleted word, if any
    async fn delete_word(&self, owner: &Identity, slot: QuizSlot) -> StoreResult<Option<Word>>;

    async fn list_words(&self, owner: &Identity) -> StoreResult<BTreeMap<QuizSlot, QuizItem>>;

    /// Apply every write or none of them
    async fn replace_all(
        &self,
        owner: &Identity,
        writes: &[SlotWrite],
        quiz_mode: Option<QuizMode>,
    ) -> StoreResult<()>;
}

/// Apply `writes` to an in-memory slot map
pub(crate) fn apply_writes(
    slots: &mut BTreeMap<QuizSlot, QuizItem>,
    writes: &[SlotWrite],
    quiz_mode: Option<QuizMode>,
) {
    for (slot, word) in writes {
        match word {
            Some(word) => {
                slots.insert(*slot, QuizItem::new(word.clone(), quiz_mode));
            }
            None => {
                slots.remove(slot);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_json_shape() {
        let settings: UserSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, UserSettings::default());
        let json = serde_json::to_value(UserSettings {
            font: FontKey::default_key(),
            quiz_mode: QuizMode::Union,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"font": "default", "quiz_mode": "union"}));
    }

    #[test]
    fn test_quiz_mode_parse() {
        assert_eq!("Union".parse::<QuizMode>().unwrap(), QuizMode::Union);
        assert_eq!("intersection".parse::<QuizMode>().unwrap(), QuizMode::Intersection);
        assert!("both".parse::<QuizMode>().is_err());
    }

    #[test]
    fn test_stored_word_is_revalidated() {
        let bad = r#"{"word": "森", "updated_at": "2024-01-01T00:00:00Z"}"#;
        assert!(serde_json::from_str::<QuizItem>(bad).is_err());
    }
}
