//! Process-local store
//!
//! Backs `STORE_BACKEND=memory` and the test suites.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreResult;
use crate::identity::{Identity, QuizSlot, Word};
use crate::store::{
    apply_writes, QuizItem, QuizMode, QuizStore, SettingsMutator, SettingsStore, SlotWrite,
    UserSettings,
};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    settings: Arc<RwLock<HashMap<Identity, UserSettings>>>,
    quizzes: Arc<RwLock<HashMap<Identity, BTreeMap<QuizSlot, QuizItem>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn load_settings(&self, identity: &Identity) -> StoreResult<UserSettings> {
        let settings = self.settings.read().await;
        Ok(settings.get(identity).cloned().unwrap_or_default())
    }

    async fn update_settings(
        &self,
        identity: &Identity,
        mutate: SettingsMutator,
    ) -> StoreResult<UserSettings> {
        let mut settings = self.settings.write().await;
        let entry = settings.entry(identity.clone()).or_default();
        mutate(entry);
        Ok(entry.clone())
    }
}

#[async_trait]
impl QuizStore for MemoryStore {
    async fn get_word(&self, owner: &Identity, slot: QuizSlot) -> StoreResult<Option<QuizItem>> {
        let quizzes = self.quizzes.read().await;
        Ok(quizzes.get(owner).and_then(|slots| slots.get(&slot)).cloned())
    }

    async fn set_word(
        &self,
        owner: &Identity,
        slot: QuizSlot,
        word: &Word,
        quiz_mode: Option<QuizMode>,
    ) -> StoreResult<Option<Word>> {
        let mut quizzes = self.quizzes.write().await;
        let previous = quizzes
            .entry(owner.clone())
            .or_default()
            .insert(slot, QuizItem::new(word.clone(), quiz_mode));
        Ok(previous.map(|item| item.word))
    }

    async fn delete_word(&self, owner: &Identity, slot: QuizSlot) -> StoreResult<Option<Word>> {
        let mut quizzes = self.quizzes.write().await;
        Ok(quizzes
            .get_mut(owner)
            .and_then(|slots| slots.remove(&slot))
            .map(|item| item.word))
    }

    async fn list_words(&self, owner: &Identity) -> StoreResult<BTreeMap<QuizSlot, QuizItem>> {
        let quizzes = self.quizzes.read().await;
        Ok(quizzes.get(owner).cloned().unwrap_or_default())
    }

    async fn replace_all(
        &self,
        owner: &Identity,
        writes: &[SlotWrite],
        quiz_mode: Option<QuizMode>,
    ) -> StoreResult<()> {
        let mut quizzes = self.quizzes.write().await;
        apply_writes(quizzes.entry(owner.clone()).or_default(), writes, quiz_mode);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(n: i64) -> QuizSlot {
        QuizSlot::new(n).unwrap()
    }

    #[tokio::test]
    async fn test_overwrite_reports_previous_word() {
        let store = MemoryStore::new();
        let owner = Identity::user("U1");
        let forest = Word::parse("森林").unwrap();
        let music = Word::parse("音楽").unwrap();

        assert_eq!(store.set_word(&owner, slot(3), &forest, None).await.unwrap(), None);
        assert_eq!(
            store.set_word(&owner, slot(3), &music, None).await.unwrap(),
            Some(forest)
        );
        assert_eq!(
            store.get_word(&owner, slot(3)).await.unwrap().unwrap().word,
            music
        );
        assert!(store.get_word(&Identity::user("U2"), slot(3)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_updates_commit() {
        let store = Arc::new(MemoryStore::new());
        let owner = Identity::user("U1");
        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            let owner = owner.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update_settings(
                        &owner,
                        Box::new(move |s| {
                            if i % 2 == 0 {
                                s.quiz_mode = QuizMode::Union;
                            }
                        }),
                    )
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(
            store.load_settings(&owner).await.unwrap().quiz_mode,
            QuizMode::Union
        );
    }

    #[tokio::test]
    async fn test_replace_all_deletes_unset_slots() {
        let store = MemoryStore::new();
        let owner = Identity::user("U1");
        let forest = Word::parse("森林").unwrap();
        store.set_word(&owner, slot(1), &forest, None).await.unwrap();
        store
            .replace_all(&owner, &[(slot(1), None), (slot(2), Some(forest.clone()))], None)
            .await
            .unwrap();
        let listed = store.list_words(&owner).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[&slot(2)].word, forest);
        assert_eq!(store.delete_word(&owner, slot(2)).await.unwrap(), Some(forest));
        assert_eq!(store.delete_word(&owner, slot(2)).await.unwrap(), None);
    }
}
