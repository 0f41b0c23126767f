//! Per-user action template history
//!
//! One row per `(user_id, normalized_text)` carrying an exact incremental
//! running average of observed durations. `user_id = 0` holds global
//! templates every user falls back to.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::models::{ActionTemplate, UserStats};
use crate::services::preprocessor::TextPreprocessor;

/// Interface for historical duration lookup and recording
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Floor of the stored running average for the normalized action text.
    /// Resolution order: exact user row, then the global row.
    async fn get_average_time(&self, user_id: i64, action_text: &str)
        -> Result<Option<i64>, sqlx::Error>;

    /// Insert a first observation or fold one more duration into the
    /// running average.
    async fn record_action(
        &self,
        user_id: i64,
        action_text: &str,
        time_minutes: i64,
    ) -> Result<(), sqlx::Error>;

    /// Template count and total recorded occurrences for one user
    async fn user_stats(&self, user_id: i64) -> Result<UserStats, sqlx::Error>;
}

/// SQLite-backed history store
pub struct SqliteHistoryStore {
    pool: SqlitePool,
    preprocessor: TextPreprocessor,
}

impl SqliteHistoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool, preprocessor: TextPreprocessor::new(false) }
    }

    /// Fetch the raw template row, test and inspection helper
    pub async fn get_template(
        &self,
        user_id: i64,
        action_text: &str,
    ) -> Result<Option<ActionTemplate>, sqlx::Error> {
        let normalized = self.preprocessor.normalize_text(action_text);
        sqlx::query_as::<_, ActionTemplate>(
            r#"
            SELECT id, user_id, normalized_text, avg_time_minutes, occurrences, last_seen
            FROM action_templates
            WHERE user_id = ?1 AND normalized_text = ?2
            "#,
        )
        .bind(user_id)
        .bind(normalized)
        .fetch_optional(&self.pool)
        .await
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn get_average_time(
        &self,
        user_id: i64,
        action_text: &str,
    ) -> Result<Option<i64>, sqlx::Error> {
        let normalized = self.preprocessor.normalize_text(action_text);

        let own: Option<f64> = sqlx::query_scalar(
            "SELECT avg_time_minutes FROM action_templates WHERE user_id = ?1 AND normalized_text = ?2",
        )
        .bind(user_id)
        .bind(&normalized)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(avg) = own {
            return Ok(Some(avg.floor() as i64));
        }

        let global: Option<f64> = sqlx::query_scalar(
            "SELECT avg_time_minutes FROM action_templates WHERE user_id = 0 AND normalized_text = ?1",
        )
        .bind(&normalized)
        .fetch_optional(&self.pool)
        .await?;

        Ok(global.map(|avg| avg.floor() as i64))
    }

    async fn record_action(
        &self,
        user_id: i64,
        action_text: &str,
        time_minutes: i64,
    ) -> Result<(), sqlx::Error> {
        let normalized = self.preprocessor.normalize_text(action_text);

        // Single upsert keeps the running-mean update atomic per key, so
        // concurrent writers cannot observe or produce a torn average.
        sqlx::query(
            r#"
            INSERT INTO action_templates (user_id, normalized_text, avg_time_minutes, occurrences)
            VALUES (?1, ?2, ?3, 1)
            ON CONFLICT(user_id, normalized_text) DO UPDATE SET
                avg_time_minutes =
                    (avg_time_minutes * occurrences + excluded.avg_time_minutes)
                        / (occurrences + 1),
                occurrences = occurrences + 1,
                last_seen = CURRENT_TIMESTAMP
            "#,
        )
        .bind(user_id)
        .bind(&normalized)
        .bind(time_minutes as f64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn user_stats(&self, user_id: i64) -> Result<UserStats, sqlx::Error> {
        let (total_templates, total_actions): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(occurrences), 0)
            FROM action_templates
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(UserStats { user_id, total_templates, total_actions })
    }
}
