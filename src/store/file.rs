//! JSON blob store on local disk
//!
//! Settings live in one file (`{"user:U1": {"font": ..., "quiz_mode": ...}}`)
//! and quiz slots in another (`{"user:U1": {"3": {"word": ...}}}`). Every
//! read-modify-write holds a per-file async mutex, and writes go through a
//! temporary file plus rename so a crash never leaves a truncated blob.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::identity::{Identity, QuizSlot, Word};
use crate::store::{
    apply_writes, QuizItem, QuizMode, QuizStore, SettingsMutator, SettingsStore, SlotWrite,
    UserSettings,
};

type SettingsBlob = BTreeMap<String, UserSettings>;
type QuizBlob = BTreeMap<String, BTreeMap<String, QuizItem>>;

pub struct JsonFileStore {
    settings_path: PathBuf,
    quiz_path: PathBuf,
    settings_lock: Mutex<()>,
    quiz_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(settings_path: impl Into<PathBuf>, quiz_path: impl Into<PathBuf>) -> Self {
        Self {
            settings_path: settings_path.into(),
            quiz_path: quiz_path.into(),
            settings_lock: Mutex::new(()),
            quiz_lock: Mutex::new(()),
        }
    }

    async fn owner_slots(&self, owner: &Identity) -> StoreResult<BTreeMap<QuizSlot, QuizItem>> {
        let blob: QuizBlob = read_blob(&self.quiz_path).await?;
        blob.get(&owner.to_string())
            .map(decode_slots)
            .transpose()
            .map(Option::unwrap_or_default)
    }

    /// Load, mutate and save one owner's slots under the quiz lock
    async fn modify_slots<R: Send>(
        &self,
        owner: &Identity,
        f: impl FnOnce(&mut BTreeMap<QuizSlot, QuizItem>) -> R + Send,
    ) -> StoreResult<R> {
        let _guard = self.quiz_lock.lock().await;
        let mut blob: QuizBlob = read_blob(&self.quiz_path).await?;
        let key = owner.to_string();
        let mut slots = blob.get(&key).map(decode_slots).transpose()?.unwrap_or_default();
        let result = f(&mut slots);
        if slots.is_empty() {
            blob.remove(&key);
        } else {
            blob.insert(key, encode_slots(&slots));
        }
        write_blob(&self.quiz_path, &blob).await?;
        Ok(result)
    }
}

fn decode_slots(raw: &BTreeMap<String, QuizItem>) -> StoreResult<BTreeMap<QuizSlot, QuizItem>> {
    raw.iter()
        .map(|(number, item)| {
            QuizSlot::parse(number)
                .map(|slot| (slot, item.clone()))
                .map_err(|e| StoreError::InvalidRecord(format!("quiz slot '{}': {}", number, e)))
        })
        .collect()
}

fn encode_slots(slots: &BTreeMap<QuizSlot, QuizItem>) -> BTreeMap<String, QuizItem> {
    slots
        .iter()
        .map(|(slot, item)| (slot.to_string(), item.clone()))
        .collect()
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// A missing file reads as an empty blob
async fn read_blob<T: DeserializeOwned + Default>(path: &Path) -> StoreResult<T> {
    match tokio::fs::read(path).await {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(T::default()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(io_error(path, e)),
    }
}

async fn write_blob<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error(parent, e))?;
    }
    let body = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, body)
        .await
        .map_err(|e| io_error(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| io_error(path, e))?;
    debug!("Saved {}", path.display());
    Ok(())
}

#[async_trait]
impl SettingsStore for JsonFileStore {
    async fn load_settings(&self, identity: &Identity) -> StoreResult<UserSettings> {
        let blob: SettingsBlob = read_blob(&self.settings_path).await?;
        Ok(blob.get(&identity.to_string()).cloned().unwrap_or_default())
    }

    async fn update_settings(
        &self,
        identity: &Identity,
        mutate: SettingsMutator,
    ) -> StoreResult<UserSettings> {
        let _guard = self.settings_lock.lock().await;
        let mut blob: SettingsBlob = read_blob(&self.settings_path).await?;
        let entry = blob.entry(identity.to_string()).or_default();
        mutate(entry);
        let committed = entry.clone();
        write_blob(&self.settings_path, &blob).await?;
        Ok(committed)
    }
}

#[async_trait]
impl QuizStore for JsonFileStore {
    async fn get_word(&self, owner: &Identity, slot: QuizSlot) -> StoreResult<Option<QuizItem>> {
        Ok(self.owner_slots(owner).await?.remove(&slot))
    }

    async fn set_word(
        &self,
        owner: &Identity,
        slot: QuizSlot,
        word: &Word,
        quiz_mode: Option<QuizMode>,
    ) -> StoreResult<Option<Word>> {
        let item = QuizItem::new(word.clone(), quiz_mode);
        self.modify_slots(owner, move |slots| slots.insert(slot, item).map(|old| old.word))
            .await
    }

    async fn delete_word(&self, owner: &Identity, slot: QuizSlot) -> StoreResult<Option<Word>> {
        self.modify_slots(owner, move |slots| slots.remove(&slot).map(|old| old.word))
            .await
    }

    async fn list_words(&self, owner: &Identity) -> StoreResult<BTreeMap<QuizSlot, QuizItem>> {
        self.owner_slots(owner).await
    }

    async fn replace_all(
        &self,
        owner: &Identity,
        writes: &[SlotWrite],
        quiz_mode: Option<QuizMode>,
    ) -> StoreResult<()> {
        self.modify_slots(owner, |slots| apply_writes(slots, writes, quiz_mode))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> JsonFileStore {
        JsonFileStore::new(
            dir.path().join("data/settings.json"),
            dir.path().join("data/quiz.json"),
        )
    }

    fn slot(n: i64) -> QuizSlot {
        QuizSlot::new(n).unwrap()
    }

    #[tokio::test]
    async fn test_missing_files_read_as_defaults() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let owner = Identity::user("U1");
        assert_eq!(store.load_settings(&owner).await.unwrap(), UserSettings::default());
        assert!(store.list_words(&owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_settings_persist_across_instances() {
        let dir = TempDir::new().unwrap();
        let owner = Identity::user("U1");
        store(&dir)
            .update_settings(&owner, Box::new(|s| s.quiz_mode = QuizMode::Union))
            .await
            .unwrap();

        let reopened = store(&dir);
        assert_eq!(
            reopened.load_settings(&owner).await.unwrap().quiz_mode,
            QuizMode::Union
        );
        let raw = std::fs::read_to_string(dir.path().join("data/settings.json")).unwrap();
        assert!(raw.contains("\"user:U1\""));
    }

    #[tokio::test]
    async fn test_quiz_slots_roundtrip_through_file() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let owner = Identity::user("U1");
        let word = Word::parse("音楽性").unwrap();
        assert_eq!(
            store.set_word(&owner, slot(10), &word, Some(QuizMode::Union)).await.unwrap(),
            None
        );
        let item = store.get_word(&owner, slot(10)).await.unwrap().unwrap();
        assert_eq!(item.word, word);
        assert_eq!(item.quiz_mode, Some(QuizMode::Union));
        assert_eq!(store.delete_word(&owner, slot(10)).await.unwrap(), Some(word));
        assert!(store.list_words(&owner).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_blob_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::create_dir_all(dir.path().join("data")).unwrap();
        std::fs::write(dir.path().join("data/settings.json"), b"{not json").unwrap();
        let result = store
            .update_settings(&Identity::user("U1"), Box::new(|_| {}))
            .await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }
}
