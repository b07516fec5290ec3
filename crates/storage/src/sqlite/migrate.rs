use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS decks (
        id INTEGER PRIMARY KEY,
        owner_id TEXT NOT NULL,
        name TEXT NOT NULL,
        is_shared INTEGER NOT NULL DEFAULT 0 CHECK (is_shared IN (0, 1)),
        card_count INTEGER NOT NULL DEFAULT 0 CHECK (card_count >= 0),
        created_at TEXT NOT NULL
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS chapters (
        id INTEGER PRIMARY KEY,
        deck_id INTEGER NOT NULL,
        ordinal INTEGER NOT NULL CHECK (ordinal >= 1),
        created_at TEXT NOT NULL,
        FOREIGN KEY (deck_id) REFERENCES decks(id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS cards (
        id INTEGER PRIMARY KEY,
        deck_id INTEGER NOT NULL,
        chapter_id INTEGER,
        prompt TEXT NOT NULL,
        answer TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (deck_id) REFERENCES decks(id) ON DELETE CASCADE,
        FOREIGN KEY (chapter_id) REFERENCES chapters(id) ON DELETE SET NULL
    );
    ",
    r"
    CREATE TABLE IF NOT EXISTS user_card_progress (
        user_id TEXT NOT NULL,
        card_id INTEGER NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('new', 'learning', 'learned')),
        updated_at TEXT NOT NULL,
        PRIMARY KEY (user_id, card_id),
        FOREIGN KEY (card_id) REFERENCES cards(id) ON DELETE CASCADE
    );
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_chapters_deck_order
        ON chapters (deck_id, ordinal, created_at, id);
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_cards_deck_chapter
        ON cards (deck_id, chapter_id);
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_cards_chapter
        ON cards (chapter_id);
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_progress_user_status
        ON user_card_progress (user_id, status, card_id);
    ",
];

/// Applies the versioned schema.
///
/// Version 1 creates decks, chapters, cards and per-user progress.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1 {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        log::info!("sqlite schema migrated to version 1");
    }

    Ok(())
}
