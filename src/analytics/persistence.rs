use sqlx::SqlitePool;

use crate::analytics::state::{EngineState, StateKey};
use crate::db::StoreError;

/// Key/value store for engine state, one row per (learner, key).
#[derive(Clone)]
pub struct EngineStore {
    pool: SqlitePool,
}

impl EngineStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns `None` when nothing was ever stored for the learner. Values
    /// that fail to parse are replaced by defaults.
    pub async fn load_state(&self, learner_id: &str) -> Result<Option<EngineState>, StoreError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"SELECT "key", "value" FROM "learning_engine_state" WHERE "learner_id" = ?"#,
        )
        .bind(learner_id)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut state = EngineState::default();
        let mut malformed = 0usize;
        for (key, value) in &rows {
            match StateKey::parse(key) {
                Some(k) => {
                    if !state.apply_entry(k, value) {
                        malformed += 1;
                    }
                }
                None => tracing::debug!(learner_id, key = %key, "ignoring unknown state key"),
            }
        }

        tracing::debug!(
            learner_id,
            keys = rows.len(),
            malformed,
            sessions = state.history.len(),
            "engine state loaded"
        );
        Ok(Some(state))
    }

    pub async fn save_state(
        &self,
        learner_id: &str,
        state: &EngineState,
        max_persisted_records: usize,
    ) -> Result<(), StoreError> {
        let entries = state.to_entries(max_persisted_records)?;
        let updated_at = chrono::Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;
        for (key, value) in entries {
            sqlx::query(
                r#"
                INSERT INTO "learning_engine_state" ("learner_id", "key", "value", "updated_at")
                VALUES (?, ?, ?, ?)
                ON CONFLICT ("learner_id", "key")
                DO UPDATE SET "value" = excluded."value", "updated_at" = excluded."updated_at"
                "#,
            )
            .bind(learner_id)
            .bind(key.as_str())
            .bind(value)
            .bind(&updated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    /// Writes a raw value for one key, bypassing serialization.
    pub async fn put_raw(&self, learner_id: &str, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO "learning_engine_state" ("learner_id", "key", "value", "updated_at")
            VALUES (?, ?, ?, ?)
            ON CONFLICT ("learner_id", "key")
            DO UPDATE SET "value" = excluded."value", "updated_at" = excluded."updated_at"
            "#,
        )
        .bind(learner_id)
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn clear(&self, learner_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query(r#"DELETE FROM "learning_engine_state" WHERE "learner_id" = ?"#)
            .bind(learner_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
