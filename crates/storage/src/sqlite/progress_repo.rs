use std::collections::HashSet;

use chrono::{DateTime, Utc};
use deck_core::model::{CardId, ProgressStatus, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    card_id_from_i64, card_id_to_i64, card_ids_json, conn, ser, status_text, user_id_text,
};
use crate::repository::{ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn card_ids_with_status(
        &self,
        user: UserId,
        status: ProgressStatus,
        card_ids: &[CardId],
    ) -> Result<HashSet<CardId>, StorageError> {
        if card_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let rows = sqlx::query(
            r"
            SELECT card_id
            FROM user_card_progress
            WHERE user_id = ?1
              AND status = ?2
              AND card_id IN (SELECT value FROM json_each(?3))
            ",
        )
        .bind(user_id_text(user))
        .bind(status_text(status))
        .bind(card_ids_json(card_ids)?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut ids = HashSet::with_capacity(rows.len());
        for row in &rows {
            ids.insert(card_id_from_i64(
                row.try_get::<i64, _>("card_id").map_err(ser)?,
            )?);
        }
        Ok(ids)
    }

    async fn set_status(
        &self,
        user: UserId,
        card_id: CardId,
        status: ProgressStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO user_card_progress (user_id, card_id, status, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id, card_id) DO UPDATE SET
                status = excluded.status,
                updated_at = excluded.updated_at
            ",
        )
        .bind(user_id_text(user))
        .bind(card_id_to_i64(card_id)?)
        .bind(status_text(status))
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
            other => conn(other),
        })?;

        Ok(())
    }
}
