//! Postgres-backed settings and quiz store

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{info, warn};

use crate::error::{StoreError, StoreResult};
use crate::identity::{FontKey, Identity, QuizSlot, Word};
use crate::store::{
    QuizItem, QuizMode, QuizStore, SettingsMutator, SettingsStore, SlotWrite, UserSettings,
};

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Option<Duration>,
}

impl DatabaseConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: std::env::var("DATABASE_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
        }
    }
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        info!(
            "Connecting to database: {}",
            mask_database_url(&config.database_url)
        );

        let mut pool_options = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connection_timeout);
        if let Some(idle_timeout) = config.idle_timeout {
            pool_options = pool_options.idle_timeout(idle_timeout);
        }

        let pool = pool_options
            .connect(&config.database_url)
            .await
            .map_err(|e| {
                warn!("Failed to connect to database: {}", e);
                e
            })?;

        info!("Database connection pool created successfully");
        Ok(Self { pool })
    }

    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS line_user_settings (
                identity   TEXT PRIMARY KEY,
                font       TEXT NOT NULL DEFAULT 'default',
                quiz_mode  TEXT NOT NULL DEFAULT 'intersection',
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS line_quiz_items (
                user_id    TEXT NOT NULL,
                number     SMALLINT NOT NULL CHECK (number BETWEEN 1 AND 10),
                word       TEXT NOT NULL,
                quiz_mode  TEXT,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (user_id, number)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Quiz store schema verified");
        Ok(())
    }
}

fn settings_from_row(row: &PgRow) -> StoreResult<UserSettings> {
    let font: String = row.try_get("font")?;
    let mode: String = row.try_get("quiz_mode")?;
    Ok(UserSettings {
        font: if font.is_empty() {
            FontKey::default_key()
        } else {
            FontKey::from_registered(&font)
        },
        quiz_mode: mode.parse().map_err(StoreError::InvalidRecord)?,
    })
}

fn item_from_row(row: &PgRow) -> StoreResult<(QuizSlot, QuizItem)> {
    let number: i16 = row.try_get("number")?;
    let word: String = row.try_get("word")?;
    let mode: Option<String> = row.try_get("quiz_mode")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    let slot = QuizSlot::new(number.into())
        .map_err(|e| StoreError::InvalidRecord(e.to_string()))?;
    let word = Word::parse(&word)
        .map_err(|e| StoreError::InvalidRecord(format!("slot {}: {}", slot, e)))?;
    let quiz_mode = mode
        .map(|m| m.parse::<QuizMode>())
        .transpose()
        .map_err(StoreError::InvalidRecord)?;
    Ok((
        slot,
        QuizItem {
            word,
            quiz_mode,
            updated_at,
        },
    ))
}

#[async_trait]
impl SettingsStore for PgStore {
    async fn load_settings(&self, identity: &Identity) -> StoreResult<UserSettings> {
        let row = sqlx::query("SELECT font, quiz_mode FROM line_user_settings WHERE identity = $1")
            .bind(identity.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref()
            .map(settings_from_row)
            .transpose()
            .map(Option::unwrap_or_default)
    }

    async fn update_settings(
        &self,
        identity: &Identity,
        mutate: SettingsMutator,
    ) -> StoreResult<UserSettings> {
        let key = identity.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO line_user_settings (identity) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(&key)
            .execute(&mut *tx)
            .await?;
        let row = sqlx::query(
            "SELECT font, quiz_mode FROM line_user_settings WHERE identity = $1 FOR UPDATE",
        )
        .bind(&key)
        .fetch_one(&mut *tx)
        .await?;

        let mut settings = settings_from_row(&row)?;
        mutate(&mut settings);

        sqlx::query(
            r#"
            UPDATE line_user_settings
            SET font = $2, quiz_mode = $3, updated_at = now()
            WHERE identity = $1
            "#,
        )
        .bind(&key)
        .bind(settings.font.as_str())
        .bind(settings.quiz_mode.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(settings)
    }
}

#[async_trait]
impl QuizStore for PgStore {
    async fn get_word(&self, owner: &Identity, slot: QuizSlot) -> StoreResult<Option<QuizItem>> {
        let row = sqlx::query(
            r#"
            SELECT number, word, quiz_mode, updated_at
            FROM line_quiz_items
            WHERE user_id = $1 AND number = $2
            "#,
        )
        .bind(owner.to_string())
        .bind(i16::from(slot.get()))
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref()
            .map(|r| item_from_row(r).map(|(_, item)| item))
            .transpose()
    }

    async fn set_word(
        &self,
        owner: &Identity,
        slot: QuizSlot,
        word: &Word,
        quiz_mode: Option<QuizMode>,
    ) -> StoreResult<Option<Word>> {
        let mut tx = self.pool.begin().await?;
        let previous: Option<String> = sqlx::query_scalar(
            "SELECT word FROM line_quiz_items WHERE user_id = $1 AND number = $2 FOR UPDATE",
        )
        .bind(owner.to_string())
        .bind(i16::from(slot.get()))
        .fetch_optional(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO line_quiz_items (user_id, number, word, quiz_mode, updated_at)
            VALUES ($1, $2, $3, $4, now())
            ON CONFLICT (user_id, number)
            DO UPDATE SET word = EXCLUDED.word, quiz_mode = EXCLUDED.quiz_mode, updated_at = now()
            "#,
        )
        .bind(owner.to_string())
        .bind(i16::from(slot.get()))
        .bind(word.as_str())
        .bind(quiz_mode.map(QuizMode::as_str))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        // A stored word that no longer validates is reported as absent
        Ok(previous.and_then(|w| Word::parse(&w).ok()))
    }

    async fn delete_word(&self, owner: &Identity, slot: QuizSlot) -> StoreResult<Option<Word>> {
        let deleted: Option<String> = sqlx::query_scalar(
            "DELETE FROM line_quiz_items WHERE user_id = $1 AND number = $2 RETURNING word",
        )
        .bind(owner.to_string())
        .bind(i16::from(slot.get()))
        .fetch_optional(&self.pool)
        .await?;
        Ok(deleted.and_then(|w| Word::parse(&w).ok()))
    }

    async fn list_words(&self, owner: &Identity) -> StoreResult<BTreeMap<QuizSlot, QuizItem>> {
        let rows = sqlx::query(
            r#"
            SELECT number, word, quiz_mode, updated_at
            FROM line_quiz_items
            WHERE user_id = $1
            ORDER BY number
            "#,
        )
        .bind(owner.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(item_from_row).collect()
    }

    async fn replace_all(
        &self,
        owner: &Identity,
        writes: &[SlotWrite],
        quiz_mode: Option<QuizMode>,
    ) -> StoreResult<()> {
        let key = owner.to_string();
        let mut tx = self.pool.begin().await?;
        for (slot, word) in writes {
            match word {
                Some(word) => {
                    sqlx::query(
                        r#"
                        INSERT INTO line_quiz_items (user_id, number, word, quiz_mode, updated_at)
                        VALUES ($1, $2, $3, $4, now())
                        ON CONFLICT (user_id, number)
                        DO UPDATE SET word = EXCLUDED.word, quiz_mode = EXCLUDED.quiz_mode, updated_at = now()
                        "#,
                    )
                    .bind(&key)
                    .bind(i16::from(slot.get()))
                    .bind(word.as_str())
                    .bind(quiz_mode.map(QuizMode::as_str))
                    .execute(&mut *tx)
                    .await?;
                }
                None => {
                    sqlx::query("DELETE FROM line_quiz_items WHERE user_id = $1 AND number = $2")
                        .bind(&key)
                        .bind(i16::from(slot.get()))
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }
        tx.commit().await?;
        Ok(())
    }
}

/// Mask sensitive information in database URL for logging
fn mask_database_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("***"));
            }
            parsed.to_string()
        }
        Err(_) => "***".to_string(),
    }
}
