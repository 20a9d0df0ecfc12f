use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use study_core::model::{
    CardHandle, CardId, Flashcard, FlashcardProgress, FlashcardSet, LearnerActivity, LearnerId,
    SetId, ValidatedFlashcard, ValidatedSet,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Authority deciding whether a card identity exists.
#[async_trait]
pub trait CardLookup: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be queried.
    async fn card_exists(&self, id: CardId) -> Result<bool, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the card does not exist.
    async fn resolve_card(&self, id: CardId) -> Result<CardHandle, StorageError>;
}

/// Keyed persistence for per-(learner, card) progress.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the record for the pair, if one was ever saved.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend or decoding failure.
    async fn find_progress(
        &self,
        learner_id: LearnerId,
        card_id: CardId,
    ) -> Result<Option<FlashcardProgress>, StorageError>;

    /// Create or replace the record for its (learner, card) pair.
    ///
    /// The write only applies if the stored version still equals `progress.version()`
    /// (a missing row counts as version 0). The returned record carries the new version.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if another writer got there first.
    async fn save_progress(
        &self,
        progress: &FlashcardProgress,
    ) -> Result<FlashcardProgress, StorageError>;

    /// Records for the learner among `card_ids`; cards without a record are skipped.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend or decoding failure.
    async fn progress_for_cards(
        &self,
        learner_id: LearnerId,
        card_ids: &[CardId],
    ) -> Result<Vec<FlashcardProgress>, StorageError>;
}

#[async_trait]
pub trait FlashcardSetRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the set cannot be stored.
    async fn insert_set(&self, set: &ValidatedSet) -> Result<FlashcardSet, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn get_set(&self, id: SetId) -> Result<Option<FlashcardSet>, StorageError>;

    /// Sets owned by `owner`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn list_sets(&self, owner: LearnerId) -> Result<Vec<FlashcardSet>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the set does not exist.
    async fn update_set(&self, set: &FlashcardSet) -> Result<(), StorageError>;

    /// Delete a set together with its cards and their progress.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the set does not exist.
    async fn delete_set(&self, id: SetId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait FlashcardRepository: Send + Sync {
    /// Append a card at the end of its set.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the set does not exist.
    async fn insert_card(&self, card: &ValidatedFlashcard) -> Result<Flashcard, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn get_card(&self, id: CardId) -> Result<Option<Flashcard>, StorageError>;

    /// Cards of a set ordered by position, then id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn list_cards(&self, set_id: SetId) -> Result<Vec<Flashcard>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the card does not exist.
    async fn update_card(&self, card: &Flashcard) -> Result<(), StorageError>;

    /// Delete a card and its progress records.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the card does not exist.
    async fn delete_card(&self, id: CardId) -> Result<(), StorageError>;

    /// Rewrite positions so `ordered[i]` sits at position `i`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` unless `ordered` is exactly the set's cards.
    async fn reorder_cards(&self, set_id: SetId, ordered: &[CardId]) -> Result<(), StorageError>;
}

#[async_trait]
pub trait ActivityRepository: Send + Sync {
    /// Mark the learner active on the UTC day of `at`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be written.
    async fn record_activity(&self, learner_id: LearnerId, at: DateTime<Utc>)
    -> Result<(), StorageError>;

    /// Most recent active days first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn recent_activity(
        &self,
        learner_id: LearnerId,
        limit: u32,
    ) -> Result<Vec<LearnerActivity>, StorageError>;
}

/// Checks that `ordered` is a permutation of `current`.
pub(crate) fn is_same_card_set(current: &[CardId], ordered: &[CardId]) -> bool {
    if current.len() != ordered.len() {
        return false;
    }
    let mut a = current.to_vec();
    let mut b = ordered.to_vec();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}

//
// ─── IN-MEMORY ADAPTER ─────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    next_set_id: u64,
    next_card_id: u64,
    sets: BTreeMap<SetId, FlashcardSet>,
    cards: BTreeMap<CardId, Flashcard>,
    progress: HashMap<(LearnerId, CardId), FlashcardProgress>,
    activity: BTreeMap<(LearnerId, NaiveDate), DateTime<Utc>>,
}

impl MemoryState {
    fn drop_card(&mut self, id: CardId) {
        self.cards.remove(&id);
        self.progress.retain(|(_, card), _| *card != id);
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Clones share the same state.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl CardLookup for InMemoryRepository {
    async fn card_exists(&self, id: CardId) -> Result<bool, StorageError> {
        Ok(self.lock()?.cards.contains_key(&id))
    }

    async fn resolve_card(&self, id: CardId) -> Result<CardHandle, StorageError> {
        self.lock()?
            .cards
            .get(&id)
            .map(Flashcard::handle)
            .ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn find_progress(
        &self,
        learner_id: LearnerId,
        card_id: CardId,
    ) -> Result<Option<FlashcardProgress>, StorageError> {
        Ok(self.lock()?.progress.get(&(learner_id, card_id)).cloned())
    }

    async fn save_progress(
        &self,
        progress: &FlashcardProgress,
    ) -> Result<FlashcardProgress, StorageError> {
        let mut guard = self.lock()?;
        if !guard.cards.contains_key(&progress.card_id()) {
            return Err(StorageError::NotFound);
        }
        let key = (progress.learner_id(), progress.card_id());
        let stored_version = guard.progress.get(&key).map_or(0, FlashcardProgress::version);
        if stored_version != progress.version() {
            return Err(StorageError::Conflict);
        }
        let committed = progress.clone().committed(stored_version + 1);
        guard.progress.insert(key, committed.clone());
        Ok(committed)
    }

    async fn progress_for_cards(
        &self,
        learner_id: LearnerId,
        card_ids: &[CardId],
    ) -> Result<Vec<FlashcardProgress>, StorageError> {
        let guard = self.lock()?;
        Ok(card_ids
            .iter()
            .filter_map(|card| guard.progress.get(&(learner_id, *card)).cloned())
            .collect())
    }
}

#[async_trait]
impl FlashcardSetRepository for InMemoryRepository {
    async fn insert_set(&self, set: &ValidatedSet) -> Result<FlashcardSet, StorageError> {
        let mut guard = self.lock()?;
        guard.next_set_id += 1;
        let stored = set.clone().assign_id(SetId::new(guard.next_set_id));
        guard.sets.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_set(&self, id: SetId) -> Result<Option<FlashcardSet>, StorageError> {
        Ok(self.lock()?.sets.get(&id).cloned())
    }

    async fn list_sets(&self, owner: LearnerId) -> Result<Vec<FlashcardSet>, StorageError> {
        let guard = self.lock()?;
        let mut sets: Vec<FlashcardSet> = guard
            .sets
            .values()
            .filter(|s| s.owner == owner)
            .cloned()
            .collect();
        sets.sort_by_key(|s| (s.created_at, s.id));
        Ok(sets)
    }

    async fn update_set(&self, set: &FlashcardSet) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let slot = guard.sets.get_mut(&set.id).ok_or(StorageError::NotFound)?;
        *slot = set.clone();
        Ok(())
    }

    async fn delete_set(&self, id: SetId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.sets.remove(&id).ok_or(StorageError::NotFound)?;
        let doomed: Vec<CardId> = guard
            .cards
            .values()
            .filter(|c| c.set_id == id)
            .map(|c| c.id)
            .collect();
        for card in doomed {
            guard.drop_card(card);
        }
        Ok(())
    }
}

#[async_trait]
impl FlashcardRepository for InMemoryRepository {
    async fn insert_card(&self, card: &ValidatedFlashcard) -> Result<Flashcard, StorageError> {
        let mut guard = self.lock()?;
        if !guard.sets.contains_key(&card.set_id) {
            return Err(StorageError::NotFound);
        }
        let position = guard
            .cards
            .values()
            .filter(|c| c.set_id == card.set_id)
            .map(|c| c.position + 1)
            .max()
            .unwrap_or(0);
        guard.next_card_id += 1;
        let stored = card
            .clone()
            .assign(CardId::new(guard.next_card_id), position);
        guard.cards.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_card(&self, id: CardId) -> Result<Option<Flashcard>, StorageError> {
        Ok(self.lock()?.cards.get(&id).cloned())
    }

    async fn list_cards(&self, set_id: SetId) -> Result<Vec<Flashcard>, StorageError> {
        let guard = self.lock()?;
        let mut cards: Vec<Flashcard> = guard
            .cards
            .values()
            .filter(|c| c.set_id == set_id)
            .cloned()
            .collect();
        cards.sort_by_key(|c| (c.position, c.id));
        Ok(cards)
    }

    async fn update_card(&self, card: &Flashcard) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let slot = guard.cards.get_mut(&card.id).ok_or(StorageError::NotFound)?;
        *slot = card.clone();
        Ok(())
    }

    async fn delete_card(&self, id: CardId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.cards.contains_key(&id) {
            return Err(StorageError::NotFound);
        }
        guard.drop_card(id);
        Ok(())
    }

    async fn reorder_cards(&self, set_id: SetId, ordered: &[CardId]) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let current: Vec<CardId> = guard
            .cards
            .values()
            .filter(|c| c.set_id == set_id)
            .map(|c| c.id)
            .collect();
        if !is_same_card_set(&current, ordered) {
            return Err(StorageError::Conflict);
        }
        for (position, id) in (0_u32..).zip(ordered) {
            if let Some(card) = guard.cards.get_mut(id) {
                card.position = position;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ActivityRepository for InMemoryRepository {
    async fn record_activity(
        &self,
        learner_id: LearnerId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let latest = guard
            .activity
            .entry((learner_id, at.date_naive()))
            .or_insert(at);
        if at > *latest {
            *latest = at;
        }
        Ok(())
    }

    async fn recent_activity(
        &self,
        learner_id: LearnerId,
        limit: u32,
    ) -> Result<Vec<LearnerActivity>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .activity
            .iter()
            .rev()
            .filter(|((learner, _), _)| *learner == learner_id)
            .take(limit as usize)
            .map(|((learner, _), at)| LearnerActivity::at(*learner, *at))
            .collect())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sets: Arc<dyn FlashcardSetRepository>,
    pub cards: Arc<dyn FlashcardRepository>,
    pub card_lookup: Arc<dyn CardLookup>,
    pub progress: Arc<dyn ProgressRepository>,
    pub activity: Arc<dyn ActivityRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            sets: Arc::new(repo.clone()),
            cards: Arc::new(repo.clone()),
            card_lookup: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            activity: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use study_core::model::{FlashcardDraft, FlashcardSetDraft, ProgressStatus};
    use study_core::time::fixed_now;

    async fn seeded() -> (InMemoryRepository, FlashcardSet, Vec<Flashcard>) {
        let repo = InMemoryRepository::new();
        let set = repo
            .insert_set(
                &FlashcardSetDraft::new(LearnerId::new(1), "Capitals")
                    .validate(fixed_now())
                    .unwrap(),
            )
            .await
            .unwrap();
        let mut cards = Vec::new();
        for (term, def) in [("France", "Paris"), ("Peru", "Lima"), ("Chad", "N'Djamena")] {
            let card = FlashcardDraft::new(set.id, term, def)
                .validate(fixed_now())
                .unwrap();
            cards.push(repo.insert_card(&card).await.unwrap());
        }
        (repo, set, cards)
    }

    #[tokio::test]
    async fn cards_are_appended_in_order() {
        let (repo, set, cards) = seeded().await;
        let positions: Vec<u32> = cards.iter().map(|c| c.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);

        let listed = repo.list_cards(set.id).await.unwrap();
        assert_eq!(listed, cards);
        assert!(repo.card_exists(cards[0].id).await.unwrap());
        assert!(!repo.card_exists(CardId::new(999)).await.unwrap());
    }

    #[tokio::test]
    async fn save_progress_rejects_stale_versions() {
        let (repo, _, cards) = seeded().await;
        let learner = LearnerId::new(5);

        let mut fresh = FlashcardProgress::new(learner, cards[0].id);
        fresh.record_review(ProgressStatus::Learning, fixed_now());
        let first = repo.save_progress(&fresh).await.unwrap();
        assert_eq!(first.version(), 1);

        // Same unpersisted record again: row now exists at version 1.
        let err = repo.save_progress(&fresh).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));

        let mut next = first.clone();
        next.record_review(ProgressStatus::Mastered, fixed_now());
        let second = repo.save_progress(&next).await.unwrap();
        assert_eq!(second.version(), 2);
        assert_eq!(second.review_count(), 2);

        let err = repo.save_progress(&next).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn deleting_a_set_cascades_to_cards_and_progress() {
        let (repo, set, cards) = seeded().await;
        let learner = LearnerId::new(5);
        let mut p = FlashcardProgress::new(learner, cards[1].id);
        p.record_review(ProgressStatus::Learning, fixed_now());
        repo.save_progress(&p).await.unwrap();

        repo.delete_set(set.id).await.unwrap();

        assert!(repo.list_cards(set.id).await.unwrap().is_empty());
        assert!(repo.find_progress(learner, cards[1].id).await.unwrap().is_none());
        assert!(matches!(
            repo.resolve_card(cards[1].id).await.unwrap_err(),
            StorageError::NotFound
        ));
    }

    #[tokio::test]
    async fn reorder_requires_exact_card_set() {
        let (repo, set, cards) = seeded().await;
        let ids: Vec<CardId> = cards.iter().map(|c| c.id).collect();

        let err = repo.reorder_cards(set.id, &ids[..2]).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));

        repo.reorder_cards(set.id, &[ids[2], ids[0], ids[1]])
            .await
            .unwrap();
        let listed: Vec<CardId> = repo
            .list_cards(set.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(listed, vec![ids[2], ids[0], ids[1]]);
    }

    #[tokio::test]
    async fn activity_keeps_one_row_per_day_with_latest_time() {
        let repo = InMemoryRepository::new();
        let learner = LearnerId::new(2);
        let t0 = fixed_now();

        repo.record_activity(learner, t0).await.unwrap();
        repo.record_activity(learner, t0 + chrono::Duration::minutes(30))
            .await
            .unwrap();
        repo.record_activity(learner, t0 - chrono::Duration::minutes(10))
            .await
            .unwrap();
        repo.record_activity(learner, t0 + chrono::Duration::days(1))
            .await
            .unwrap();
        repo.record_activity(LearnerId::new(3), t0).await.unwrap();

        let recent = repo.recent_activity(learner, 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].active_on, (t0 + chrono::Duration::days(1)).date_naive());
        assert_eq!(recent[1].last_active_at, t0 + chrono::Duration::minutes(30));
    }
}
