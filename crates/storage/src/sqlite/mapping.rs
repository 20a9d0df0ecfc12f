use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use study_core::model::{
    CardId, Flashcard, FlashcardProgress, FlashcardSet, LearnerActivity, LearnerId,
    ProgressStatus, SetId,
};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

/// Ids are `u64` in the domain and `INTEGER` (i64) in `SQLite`.
pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn get_i64(row: &SqliteRow, column: &'static str) -> Result<i64, StorageError> {
    row.try_get::<i64, _>(column).map_err(ser)
}

pub(crate) fn parse_status(s: &str) -> Result<ProgressStatus, StorageError> {
    s.parse::<ProgressStatus>()
        .map_err(|_| StorageError::Serialization(format!("invalid status: {s}")))
}

pub(crate) fn map_set_row(row: &SqliteRow) -> Result<FlashcardSet, StorageError> {
    Ok(FlashcardSet {
        id: SetId::new(i64_to_u64("set_id", get_i64(row, "id")?)?),
        owner: LearnerId::new(i64_to_u64("owner_id", get_i64(row, "owner_id")?)?),
        title: row.try_get("title").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_card_row(row: &SqliteRow) -> Result<Flashcard, StorageError> {
    Ok(Flashcard {
        id: CardId::new(i64_to_u64("card_id", get_i64(row, "id")?)?),
        set_id: SetId::new(i64_to_u64("set_id", get_i64(row, "set_id")?)?),
        term: row.try_get("term").map_err(ser)?,
        definition: row.try_get("definition").map_err(ser)?,
        position: u32_from_i64("position", get_i64(row, "position")?)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<FlashcardProgress, StorageError> {
    let status: String = row.try_get("status").map_err(ser)?;

    FlashcardProgress::from_persisted(
        LearnerId::new(i64_to_u64("learner_id", get_i64(row, "learner_id")?)?),
        CardId::new(i64_to_u64("card_id", get_i64(row, "card_id")?)?),
        parse_status(&status)?,
        u32_from_i64("review_count", get_i64(row, "review_count")?)?,
        row.try_get("last_reviewed_at").map_err(ser)?,
        row.try_get("mastered_at").map_err(ser)?,
        i64_to_u64("version", get_i64(row, "version")?)?,
    )
    .map_err(ser)
}

pub(crate) fn map_activity_row(row: &SqliteRow) -> Result<LearnerActivity, StorageError> {
    Ok(LearnerActivity {
        learner_id: LearnerId::new(i64_to_u64("learner_id", get_i64(row, "learner_id")?)?),
        active_on: row.try_get("active_on").map_err(ser)?,
        last_active_at: row.try_get("last_active_at").map_err(ser)?,
    })
}

/// Builds `?start, ?start+1, ...` placeholders for an `IN (...)` clause.
pub(crate) fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}
