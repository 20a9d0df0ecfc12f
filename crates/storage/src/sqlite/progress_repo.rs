use study_core::model::{CardId, FlashcardProgress, LearnerId};

use super::{
    SqliteRepository,
    mapping::{conn, id_i64, map_progress_row, placeholders},
};
use crate::repository::{ProgressRepository, StorageError};

const CARD_ID_BATCH: usize = 500;

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_foreign_key_violation())
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn find_progress(
        &self,
        learner_id: LearnerId,
        card_id: CardId,
    ) -> Result<Option<FlashcardProgress>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT learner_id, card_id, status, review_count,
                       last_reviewed_at, mastered_at, version
                FROM flashcard_progress
                WHERE learner_id = ?1 AND card_id = ?2
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(id_i64("card_id", card_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn save_progress(
        &self,
        progress: &FlashcardProgress,
    ) -> Result<FlashcardProgress, StorageError> {
        let learner = id_i64("learner_id", progress.learner_id().value())?;
        let card = id_i64("card_id", progress.card_id().value())?;
        let expected = i64::try_from(progress.version())
            .map_err(|_| StorageError::Serialization("version overflow".into()))?;

        // Each branch is one statement, so the version check and the write are atomic.
        let res = if expected == 0 {
            sqlx::query(
                r"
                    INSERT INTO flashcard_progress (
                        learner_id, card_id, status, review_count,
                        last_reviewed_at, mastered_at, version
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)
                    ON CONFLICT(learner_id, card_id) DO NOTHING
                ",
            )
            .bind(learner)
            .bind(card)
            .bind(progress.status().as_str())
            .bind(i64::from(progress.review_count()))
            .bind(progress.last_reviewed_at())
            .bind(progress.mastered_at())
            .execute(&self.pool)
            .await
        } else {
            sqlx::query(
                r"
                    UPDATE flashcard_progress
                    SET status = ?3,
                        review_count = ?4,
                        last_reviewed_at = ?5,
                        mastered_at = ?6,
                        version = version + 1
                    WHERE learner_id = ?1 AND card_id = ?2 AND version = ?7
                ",
            )
            .bind(learner)
            .bind(card)
            .bind(progress.status().as_str())
            .bind(i64::from(progress.review_count()))
            .bind(progress.last_reviewed_at())
            .bind(progress.mastered_at())
            .bind(expected)
            .execute(&self.pool)
            .await
        };

        let res = res.map_err(|e| {
            if is_foreign_key_violation(&e) {
                StorageError::NotFound
            } else {
                conn(e)
            }
        })?;

        if res.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }
        Ok(progress.clone().committed(progress.version() + 1))
    }

    async fn progress_for_cards(
        &self,
        learner_id: LearnerId,
        card_ids: &[CardId],
    ) -> Result<Vec<FlashcardProgress>, StorageError> {
        let learner = id_i64("learner_id", learner_id.value())?;
        let mut found = Vec::new();

        // One bound parameter per id; stay well under SQLite's variable limit.
        for chunk in card_ids.chunks(CARD_ID_BATCH) {
            let sql = format!(
                r"
                    SELECT learner_id, card_id, status, review_count,
                           last_reviewed_at, mastered_at, version
                    FROM flashcard_progress
                    WHERE learner_id = ?1 AND card_id IN ({})
                ",
                placeholders(2, chunk.len())
            );

            let mut q = sqlx::query(&sql).bind(learner);
            for id in chunk {
                q = q.bind(id_i64("card_id", id.value())?);
            }

            let rows = q.fetch_all(&self.pool).await.map_err(conn)?;
            for row in &rows {
                found.push(map_progress_row(row)?);
            }
        }

        found.sort_by_key(FlashcardProgress::card_id);
        found.dedup_by_key(|p| p.card_id());
        Ok(found)
    }
}
