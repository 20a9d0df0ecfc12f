use sqlx::Row;
use study_core::model::{CardHandle, CardId, Flashcard, SetId, ValidatedFlashcard};

use super::{
    SqliteRepository,
    mapping::{conn, id_i64, map_card_row, ser},
};
use crate::repository::{CardLookup, FlashcardRepository, StorageError, is_same_card_set};

#[async_trait::async_trait]
impl FlashcardRepository for SqliteRepository {
    async fn insert_card(&self, card: &ValidatedFlashcard) -> Result<Flashcard, StorageError> {
        let set_id = id_i64("set_id", card.set_id.value())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let set_exists = sqlx::query("SELECT 1 FROM flashcard_sets WHERE id = ?1")
            .bind(set_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(conn)?
            .is_some();
        if !set_exists {
            return Err(StorageError::NotFound);
        }

        let next_position: i64 = sqlx::query(
            "SELECT COALESCE(MAX(position) + 1, 0) AS next FROM flashcards WHERE set_id = ?1",
        )
        .bind(set_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(conn)?
        .try_get("next")
        .map_err(ser)?;

        let res = sqlx::query(
            r"
                INSERT INTO flashcards (set_id, term, definition, position, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ",
        )
        .bind(set_id)
        .bind(&card.term)
        .bind(&card.definition)
        .bind(next_position)
        .bind(card.created_at)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        tx.commit().await.map_err(conn)?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("card_id sign overflow".into()))?;
        let position = u32::try_from(next_position)
            .map_err(|_| StorageError::Serialization("position overflow".into()))?;
        Ok(card.clone().assign(CardId::new(id), position))
    }

    async fn get_card(&self, id: CardId) -> Result<Option<Flashcard>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, set_id, term, definition, position, created_at, updated_at
                FROM flashcards
                WHERE id = ?1
            ",
        )
        .bind(id_i64("card_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_card_row).transpose()
    }

    async fn list_cards(&self, set_id: SetId) -> Result<Vec<Flashcard>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, set_id, term, definition, position, created_at, updated_at
                FROM flashcards
                WHERE set_id = ?1
                ORDER BY position ASC, id ASC
            ",
        )
        .bind(id_i64("set_id", set_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_card_row).collect()
    }

    async fn update_card(&self, card: &Flashcard) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
                UPDATE flashcards
                SET term = ?2, definition = ?3, position = ?4, updated_at = ?5
                WHERE id = ?1
            ",
        )
        .bind(id_i64("card_id", card.id.value())?)
        .bind(&card.term)
        .bind(&card.definition)
        .bind(i64::from(card.position))
        .bind(card.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_card(&self, id: CardId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM flashcards WHERE id = ?1")
            .bind(id_i64("card_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn reorder_cards(&self, set_id: SetId, ordered: &[CardId]) -> Result<(), StorageError> {
        let set = id_i64("set_id", set_id.value())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let rows = sqlx::query("SELECT id FROM flashcards WHERE set_id = ?1")
            .bind(set)
            .fetch_all(&mut *tx)
            .await
            .map_err(conn)?;
        let mut current = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id").map_err(ser)?;
            current.push(CardId::new(u64::try_from(id).map_err(ser)?));
        }
        if !is_same_card_set(&current, ordered) {
            return Err(StorageError::Conflict);
        }

        for (position, card_id) in (0_i64..).zip(ordered) {
            sqlx::query("UPDATE flashcards SET position = ?1 WHERE id = ?2 AND set_id = ?3")
                .bind(position)
                .bind(id_i64("card_id", card_id.value())?)
                .bind(set)
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl CardLookup for SqliteRepository {
    async fn card_exists(&self, id: CardId) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM flashcards WHERE id = ?1")
            .bind(id_i64("card_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        Ok(row.is_some())
    }

    async fn resolve_card(&self, id: CardId) -> Result<CardHandle, StorageError> {
        self.get_card(id)
            .await?
            .map(|card| card.handle())
            .ok_or(StorageError::NotFound)
    }
}
