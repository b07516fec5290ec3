use deck_core::model::{
    Card, CardId, CardPlacement, Chapter, ChapterId, Deck, DeckId, ProgressStatus, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn deck_id_to_i64(id: DeckId) -> Result<i64, StorageError> {
    u64_to_i64("deck_id", id.value())
}

pub(crate) fn chapter_id_to_i64(id: ChapterId) -> Result<i64, StorageError> {
    u64_to_i64("chapter_id", id.value())
}

pub(crate) fn card_id_to_i64(id: CardId) -> Result<i64, StorageError> {
    u64_to_i64("card_id", id.value())
}

pub(crate) fn deck_id_from_i64(v: i64) -> Result<DeckId, StorageError> {
    Ok(DeckId::new(i64_to_u64("deck_id", v)?))
}

pub(crate) fn chapter_id_from_i64(v: i64) -> Result<ChapterId, StorageError> {
    Ok(ChapterId::new(i64_to_u64("chapter_id", v)?))
}

pub(crate) fn card_id_from_i64(v: i64) -> Result<CardId, StorageError> {
    Ok(CardId::new(i64_to_u64("card_id", v)?))
}

/// Encodes ids as a JSON array for `json_each(?)` membership filters, which
/// keeps an arbitrarily long id list to a single bind parameter.
pub(crate) fn card_ids_json(ids: &[CardId]) -> Result<String, StorageError> {
    let raw: Vec<u64> = ids.iter().map(CardId::value).collect();
    serde_json::to_string(&raw).map_err(ser)
}

pub(crate) fn user_id_text(user: UserId) -> String {
    user.to_string()
}

pub(crate) fn map_deck_row(row: &SqliteRow) -> Result<Deck, StorageError> {
    let owner: String = row.try_get("owner_id").map_err(ser)?;
    let owner: UserId = owner.parse().map_err(ser)?;
    let card_count: i64 = row.try_get("card_count").map_err(ser)?;

    Deck::from_persisted(
        deck_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        owner,
        row.try_get::<String, _>("name").map_err(ser)?,
        row.try_get::<i64, _>("is_shared").map_err(ser)? != 0,
        u32::try_from(card_count)
            .map_err(|_| StorageError::Serialization(format!("invalid card_count: {card_count}")))?,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_chapter_row(row: &SqliteRow) -> Result<Chapter, StorageError> {
    let ordinal: i64 = row.try_get("ordinal").map_err(ser)?;
    Chapter::new(
        chapter_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        deck_id_from_i64(row.try_get::<i64, _>("deck_id").map_err(ser)?)?,
        u32::try_from(ordinal)
            .map_err(|_| StorageError::Serialization(format!("invalid ordinal: {ordinal}")))?,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

fn optional_chapter(row: &SqliteRow) -> Result<Option<ChapterId>, StorageError> {
    row.try_get::<Option<i64>, _>("chapter_id")
        .map_err(ser)?
        .map(chapter_id_from_i64)
        .transpose()
}

pub(crate) fn map_card_row(row: &SqliteRow) -> Result<Card, StorageError> {
    Card::new(
        card_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        deck_id_from_i64(row.try_get::<i64, _>("deck_id").map_err(ser)?)?,
        optional_chapter(row)?,
        row.try_get::<String, _>("prompt").map_err(ser)?,
        row.try_get::<String, _>("answer").map_err(ser)?,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_placement_row(row: &SqliteRow) -> Result<CardPlacement, StorageError> {
    Ok(CardPlacement {
        card_id: card_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        chapter_id: optional_chapter(row)?,
    })
}

pub(crate) fn status_text(status: ProgressStatus) -> &'static str {
    status.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_lists_encode_as_json_arrays() {
        let json = card_ids_json(&[CardId::new(3), CardId::new(11)]).unwrap();
        assert_eq!(json, "[3,11]");
        assert_eq!(card_ids_json(&[]).unwrap(), "[]");
    }

    #[test]
    fn negative_ids_are_rejected() {
        assert!(deck_id_from_i64(-1).is_err());
        assert!(card_id_to_i64(CardId::new(u64::MAX)).is_err());
    }
}
