use deck_core::model::{Chapter, ChapterId, DeckId, MAX_CHAPTERS_PER_DECK};

use super::SqliteRepository;
use super::mapping::{
    chapter_id_from_i64, chapter_id_to_i64, conn, deck_id_to_i64, map_chapter_row, ser,
};
use crate::repository::{ChapterRepository, NewChapterRecord, StorageError};

#[async_trait::async_trait]
impl ChapterRepository for SqliteRepository {
    async fn list_chapters(&self, deck_id: DeckId) -> Result<Vec<Chapter>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, deck_id, ordinal, created_at
            FROM chapters
            WHERE deck_id = ?1
            ORDER BY ordinal ASC, created_at ASC, id ASC
            ",
        )
        .bind(deck_id_to_i64(deck_id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_chapter_row).collect()
    }

    async fn get_chapter(&self, id: ChapterId) -> Result<Option<Chapter>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, deck_id, ordinal, created_at
            FROM chapters WHERE id = ?1
            ",
        )
        .bind(chapter_id_to_i64(id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_chapter_row).transpose()
    }

    async fn count_chapters(&self, deck_id: DeckId) -> Result<u32, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chapters WHERE deck_id = ?1")
            .bind(deck_id_to_i64(deck_id)?)
            .fetch_one(&self.pool)
            .await
            .map_err(conn)?;
        u32::try_from(count).map_err(ser)
    }

    async fn insert_chapter(&self, chapter: NewChapterRecord) -> Result<Chapter, StorageError> {
        // count and insert in one statement keeps the cap under concurrency
        let res = sqlx::query(
            r"
            INSERT INTO chapters (deck_id, ordinal, created_at)
            SELECT ?1, ?2, ?3
            WHERE (SELECT COUNT(*) FROM chapters WHERE deck_id = ?1) < ?4
            ",
        )
        .bind(deck_id_to_i64(chapter.deck_id)?)
        .bind(i64::from(chapter.ordinal))
        .bind(chapter.created_at)
        .bind(i64::try_from(MAX_CHAPTERS_PER_DECK).map_err(ser)?)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
            other => conn(other),
        })?;

        if res.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        Chapter::new(
            chapter_id_from_i64(res.last_insert_rowid())?,
            chapter.deck_id,
            chapter.ordinal,
            chapter.created_at,
        )
        .map_err(ser)
    }

    async fn update_ordinal(&self, id: ChapterId, ordinal: u32) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE chapters SET ordinal = ?2 WHERE id = ?1")
            .bind(chapter_id_to_i64(id)?)
            .bind(i64::from(ordinal))
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_chapter(&self, id: ChapterId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM chapters WHERE id = ?1")
            .bind(chapter_id_to_i64(id)?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
