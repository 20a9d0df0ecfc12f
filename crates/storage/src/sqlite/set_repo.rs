use study_core::model::{FlashcardSet, LearnerId, SetId, ValidatedSet};

use super::{
    SqliteRepository,
    mapping::{conn, id_i64, map_set_row},
};
use crate::repository::{FlashcardSetRepository, StorageError};

#[async_trait::async_trait]
impl FlashcardSetRepository for SqliteRepository {
    async fn insert_set(&self, set: &ValidatedSet) -> Result<FlashcardSet, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO flashcard_sets (owner_id, title, description, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?4)
            ",
        )
        .bind(id_i64("owner_id", set.owner.value())?)
        .bind(&set.title)
        .bind(set.description.as_deref())
        .bind(set.created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("set_id sign overflow".into()))?;
        Ok(set.clone().assign_id(SetId::new(id)))
    }

    async fn get_set(&self, id: SetId) -> Result<Option<FlashcardSet>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, owner_id, title, description, created_at, updated_at
                FROM flashcard_sets
                WHERE id = ?1
            ",
        )
        .bind(id_i64("set_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_set_row).transpose()
    }

    async fn list_sets(&self, owner: LearnerId) -> Result<Vec<FlashcardSet>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, owner_id, title, description, created_at, updated_at
                FROM flashcard_sets
                WHERE owner_id = ?1
                ORDER BY created_at ASC, id ASC
            ",
        )
        .bind(id_i64("owner_id", owner.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_set_row).collect()
    }

    async fn update_set(&self, set: &FlashcardSet) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
                UPDATE flashcard_sets
                SET title = ?2, description = ?3, updated_at = ?4
                WHERE id = ?1
            ",
        )
        .bind(id_i64("set_id", set.id.value())?)
        .bind(&set.title)
        .bind(set.description.as_deref())
        .bind(set.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_set(&self, id: SetId) -> Result<(), StorageError> {
        // Cards and their progress rows go with the set via ON DELETE CASCADE.
        let res = sqlx::query("DELETE FROM flashcard_sets WHERE id = ?1")
            .bind(id_i64("set_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
