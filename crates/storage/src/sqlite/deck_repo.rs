use deck_core::model::{Deck, DeckId, UserId};

use super::SqliteRepository;
use super::mapping::{conn, deck_id_from_i64, deck_id_to_i64, map_deck_row, user_id_text};
use crate::repository::{DeckRepository, NewDeckRecord, StorageError};

#[async_trait::async_trait]
impl DeckRepository for SqliteRepository {
    async fn insert_new_deck(&self, deck: NewDeckRecord) -> Result<DeckId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO decks (owner_id, name, is_shared, card_count, created_at)
            VALUES (?1, ?2, ?3, 0, ?4)
            ",
        )
        .bind(user_id_text(deck.owner_id))
        .bind(deck.name)
        .bind(i64::from(deck.is_shared))
        .bind(deck.created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        deck_id_from_i64(res.last_insert_rowid())
    }

    async fn update_deck(&self, deck: &Deck) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE decks
            SET name = ?2, is_shared = ?3
            WHERE id = ?1
            ",
        )
        .bind(deck_id_to_i64(deck.id())?)
        .bind(deck.name().to_owned())
        .bind(i64::from(deck.is_shared()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_deck(&self, id: DeckId) -> Result<Option<Deck>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, owner_id, name, is_shared, card_count, created_at
            FROM decks WHERE id = ?1
            ",
        )
        .bind(deck_id_to_i64(id)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_deck_row).transpose()
    }

    async fn list_decks(&self, owner: UserId, limit: u32) -> Result<Vec<Deck>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, owner_id, name, is_shared, card_count, created_at
            FROM decks
            WHERE owner_id = ?1
            ORDER BY id ASC
            LIMIT ?2
            ",
        )
        .bind(user_id_text(owner))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_deck_row).collect()
    }
}
