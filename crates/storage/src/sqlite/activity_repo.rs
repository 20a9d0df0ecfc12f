use chrono::{DateTime, Utc};
use study_core::model::{LearnerActivity, LearnerId};

use super::{
    SqliteRepository,
    mapping::{conn, id_i64, map_activity_row},
};
use crate::repository::{ActivityRepository, StorageError};

#[async_trait::async_trait]
impl ActivityRepository for SqliteRepository {
    async fn record_activity(
        &self,
        learner_id: LearnerId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let activity = LearnerActivity::at(learner_id, at);
        // Timestamps share one text encoding, so MAX() on them is chronological.
        sqlx::query(
            r"
                INSERT INTO learner_activity (learner_id, active_on, last_active_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(learner_id, active_on) DO UPDATE SET
                    last_active_at = MAX(last_active_at, excluded.last_active_at)
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(activity.active_on)
        .bind(activity.last_active_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn recent_activity(
        &self,
        learner_id: LearnerId,
        limit: u32,
    ) -> Result<Vec<LearnerActivity>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT learner_id, active_on, last_active_at
                FROM learner_activity
                WHERE learner_id = ?1
                ORDER BY active_on DESC
                LIMIT ?2
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_activity_row).collect()
    }
}
