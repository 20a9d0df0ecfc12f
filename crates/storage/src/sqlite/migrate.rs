use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: [&str; 7] = [
    r"
        CREATE TABLE IF NOT EXISTS flashcard_sets (
            id INTEGER PRIMARY KEY,
            owner_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS flashcards (
            id INTEGER PRIMARY KEY,
            set_id INTEGER NOT NULL,
            term TEXT NOT NULL,
            definition TEXT NOT NULL,
            position INTEGER NOT NULL CHECK (position >= 0),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (set_id) REFERENCES flashcard_sets(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS flashcard_progress (
            learner_id INTEGER NOT NULL,
            card_id INTEGER NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('new', 'learning', 'mastered')),
            review_count INTEGER NOT NULL CHECK (review_count >= 0),
            last_reviewed_at TEXT,
            mastered_at TEXT,
            version INTEGER NOT NULL CHECK (version > 0),
            PRIMARY KEY (learner_id, card_id),
            FOREIGN KEY (card_id) REFERENCES flashcards(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS learner_activity (
            learner_id INTEGER NOT NULL,
            active_on TEXT NOT NULL,
            last_active_at TEXT NOT NULL,
            PRIMARY KEY (learner_id, active_on)
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_flashcard_sets_owner
            ON flashcard_sets (owner_id, created_at, id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_flashcards_set_position
            ON flashcards (set_id, position, id);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_flashcard_progress_card
            ON flashcard_progress (card_id);
    ",
];

/// Applies pending schema versions, each inside its own transaction.
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
    }

    Ok(())
}
