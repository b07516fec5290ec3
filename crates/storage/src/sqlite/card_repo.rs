use std::collections::HashSet;

use deck_core::model::{Card, CardId, CardPlacement, ChapterId, DeckId};
use sqlx::{Row, SqliteConnection};

use super::SqliteRepository;
use super::mapping::{
    card_id_from_i64, card_id_to_i64, card_ids_json, chapter_id_to_i64, conn, deck_id_to_i64,
    map_card_row, map_placement_row, ser,
};
use crate::distribution::plan_even_distribution;
use crate::repository::{CardRepository, NewCardRecord, StorageError};

/// Fails with `NotFound` unless every id is a chapter of `deck`.
async fn ensure_in_deck(
    conn_ref: &mut SqliteConnection,
    deck: i64,
    chapter_ids: &[ChapterId],
) -> Result<(), StorageError> {
    let distinct: HashSet<ChapterId> = chapter_ids.iter().copied().collect();
    if distinct.is_empty() {
        return Ok(());
    }
    let ids: Vec<ChapterId> = distinct.into_iter().collect();
    let json = serde_json::to_string(
        &ids.iter()
            .map(|id| chapter_id_to_i64(*id))
            .collect::<Result<Vec<i64>, _>>()?,
    )
    .map_err(ser)?;

    let owned: i64 = sqlx::query_scalar(
        r"
        SELECT COUNT(*)
        FROM chapters
        WHERE deck_id = ?1
          AND id IN (SELECT value FROM json_each(?2))
        ",
    )
    .bind(deck)
    .bind(json)
    .fetch_one(&mut *conn_ref)
    .await
    .map_err(conn)?;

    if usize::try_from(owned).map_err(ser)? == ids.len() {
        Ok(())
    } else {
        Err(StorageError::NotFound)
    }
}

#[async_trait::async_trait]
impl CardRepository for SqliteRepository {
    async fn insert_new_card(&self, card: NewCardRecord) -> Result<CardId, StorageError> {
        let deck = deck_id_to_i64(card.deck_id)?;
        let chapter = card.chapter_id.map(chapter_id_to_i64).transpose()?;

        let mut tx = self.pool.begin().await.map_err(conn)?;

        let bumped = sqlx::query("UPDATE decks SET card_count = card_count + 1 WHERE id = ?1")
            .bind(deck)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        if bumped.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        if let Some(chapter_id) = card.chapter_id {
            ensure_in_deck(&mut tx, deck, &[chapter_id]).await?;
        }

        let res = sqlx::query(
            r"
            INSERT INTO cards (deck_id, chapter_id, prompt, answer, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(deck)
        .bind(chapter)
        .bind(card.prompt)
        .bind(card.answer)
        .bind(card.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
            other => conn(other),
        })?;

        tx.commit().await.map_err(conn)?;
        card_id_from_i64(res.last_insert_rowid())
    }

    async fn list_cards(&self, deck_id: DeckId, limit: u32) -> Result<Vec<Card>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, deck_id, chapter_id, prompt, answer, created_at
            FROM cards
            WHERE deck_id = ?1
            ORDER BY created_at ASC, id ASC
            LIMIT ?2
            ",
        )
        .bind(deck_id_to_i64(deck_id)?)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_card_row).collect()
    }

    async fn card_placements(&self, deck_id: DeckId) -> Result<Vec<CardPlacement>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, chapter_id
            FROM cards
            WHERE deck_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(deck_id_to_i64(deck_id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_placement_row).collect()
    }

    async fn move_cards(
        &self,
        deck_id: DeckId,
        card_ids: &[CardId],
        chapter_id: Option<ChapterId>,
    ) -> Result<u64, StorageError> {
        if card_ids.is_empty() {
            return Ok(0);
        }

        let deck = deck_id_to_i64(deck_id)?;
        let mut tx = self.pool.begin().await.map_err(conn)?;
        if let Some(target) = chapter_id {
            ensure_in_deck(&mut tx, deck, &[target]).await?;
        }

        let res = sqlx::query(
            r"
            UPDATE cards
            SET chapter_id = ?2
            WHERE deck_id = ?1
              AND id IN (SELECT value FROM json_each(?3))
            ",
        )
        .bind(deck)
        .bind(chapter_id.map(chapter_id_to_i64).transpose()?)
        .bind(card_ids_json(card_ids)?)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        Ok(res.rows_affected())
    }

    async fn clear_chapter(&self, chapter_id: ChapterId) -> Result<u64, StorageError> {
        let res = sqlx::query("UPDATE cards SET chapter_id = NULL WHERE chapter_id = ?1")
            .bind(chapter_id_to_i64(chapter_id)?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        Ok(res.rows_affected())
    }

    async fn distribute_unassigned(
        &self,
        deck_id: DeckId,
        chapter_ids: &[ChapterId],
    ) -> Result<u64, StorageError> {
        let deck = deck_id_to_i64(deck_id)?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        // A write first takes the database write lock, so no card can be
        // created or moved between reading the unassigned pool and assigning it.
        let locked = sqlx::query("UPDATE decks SET card_count = card_count WHERE id = ?1")
            .bind(deck)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        if locked.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        ensure_in_deck(&mut tx, deck, chapter_ids).await?;

        let rows = sqlx::query("SELECT id FROM cards WHERE deck_id = ?1 AND chapter_id IS NULL")
            .bind(deck)
            .fetch_all(&mut *tx)
            .await
            .map_err(conn)?;

        let mut unassigned = Vec::with_capacity(rows.len());
        for row in &rows {
            unassigned.push(card_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?);
        }

        let plan = plan_even_distribution(unassigned, chapter_ids, &mut rand::rng());

        for assignment in &plan {
            sqlx::query("UPDATE cards SET chapter_id = ?1 WHERE id = ?2 AND chapter_id IS NULL")
                .bind(chapter_id_to_i64(assignment.chapter_id)?)
                .bind(card_id_to_i64(assignment.card_id)?)
                .execute(&mut *tx)
                .await
                .map_err(|e| match e {
                    sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                        StorageError::NotFound
                    }
                    other => conn(other),
                })?;
        }

        tx.commit().await.map_err(conn)?;
        log::debug!(
            "distributed unassigned cards deck_id={deck_id} cards={} chapters={}",
            plan.len(),
            chapter_ids.len()
        );
        Ok(plan.len() as u64)
    }
}
