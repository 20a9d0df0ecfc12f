use std::sync::Arc;

use tracing::info;

use storage::repository::{FlashcardRepository, FlashcardSetRepository, StorageError};
use study_core::model::{
    CardId, Flashcard, FlashcardDraft, FlashcardSet, FlashcardSetDraft, LearnerId, SetId,
};

use crate::Clock;
use crate::error::FlashcardServiceError;

/// Authoring operations for flashcard sets and the cards inside them.
///
/// This is also the card authority `ProgressTracker` consults: a card exists
/// exactly as long as it is reachable through this service.
#[derive(Clone)]
pub struct FlashcardService {
    clock: Clock,
    sets: Arc<dyn FlashcardSetRepository>,
    cards: Arc<dyn FlashcardRepository>,
}

impl FlashcardService {
    #[must_use]
    pub fn new(
        clock: Clock,
        sets: Arc<dyn FlashcardSetRepository>,
        cards: Arc<dyn FlashcardRepository>,
    ) -> Self {
        Self { clock, sets, cards }
    }

    //
    // ─── SETS ──────────────────────────────────────────────────────────────────
    //

    /// Validate and persist a new set.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardServiceError::Flashcard` for validation failures.
    /// Returns `FlashcardServiceError::Storage` if persistence fails.
    pub async fn create_set(
        &self,
        draft: FlashcardSetDraft,
    ) -> Result<FlashcardSet, FlashcardServiceError> {
        let validated = draft.validate(self.clock.now())?;
        let set = self.sets.insert_set(&validated).await?;
        info!(set_id = %set.id, owner = %set.owner, "flashcard set created");
        Ok(set)
    }

    /// Fetch a set by ID. Returns `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardServiceError::Storage` if repository access fails.
    pub async fn get_set(
        &self,
        set_id: SetId,
    ) -> Result<Option<FlashcardSet>, FlashcardServiceError> {
        Ok(self.sets.get_set(set_id).await?)
    }

    /// # Errors
    ///
    /// Returns `FlashcardServiceError::Storage` if repository access fails.
    pub async fn list_sets(
        &self,
        owner: LearnerId,
    ) -> Result<Vec<FlashcardSet>, FlashcardServiceError> {
        Ok(self.sets.list_sets(owner).await?)
    }

    /// Replace a set's title and description.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardServiceError::SetNotFound` if the set does not exist.
    /// Returns `FlashcardServiceError::Flashcard` if validation fails.
    /// Returns `FlashcardServiceError::Storage` if repository access fails.
    pub async fn update_set(
        &self,
        set_id: SetId,
        title: &str,
        description: Option<&str>,
    ) -> Result<FlashcardSet, FlashcardServiceError> {
        let mut set = self.require_set(set_id).await?;
        set.revise(title, description, self.clock.now())?;
        self.sets
            .update_set(&set)
            .await
            .map_err(|e| set_missing(e, set_id))?;
        Ok(set)
    }

    /// Delete a set together with its cards and every learner's progress on them.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardServiceError::SetNotFound` if the set does not exist.
    /// Returns `FlashcardServiceError::Storage` if repository access fails.
    pub async fn delete_set(&self, set_id: SetId) -> Result<(), FlashcardServiceError> {
        self.sets
            .delete_set(set_id)
            .await
            .map_err(|e| set_missing(e, set_id))?;
        info!(set_id = %set_id, "flashcard set deleted");
        Ok(())
    }

    //
    // ─── CARDS ─────────────────────────────────────────────────────────────────
    //

    /// Validate a card and append it to the end of its set.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardServiceError::Flashcard` for validation failures.
    /// Returns `FlashcardServiceError::SetNotFound` if the target set does not exist.
    /// Returns `FlashcardServiceError::Storage` if persistence fails.
    pub async fn add_card(&self, draft: FlashcardDraft) -> Result<Flashcard, FlashcardServiceError> {
        let set_id = draft.set_id;
        let validated = draft.validate(self.clock.now())?;
        let card = self
            .cards
            .insert_card(&validated)
            .await
            .map_err(|e| set_missing(e, set_id))?;
        info!(card_id = %card.id, set_id = %set_id, position = card.position, "flashcard added");
        Ok(card)
    }

    /// Fetch a card by ID. Returns `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardServiceError::Storage` if repository access fails.
    pub async fn get_card(
        &self,
        card_id: CardId,
    ) -> Result<Option<Flashcard>, FlashcardServiceError> {
        Ok(self.cards.get_card(card_id).await?)
    }

    /// Cards of a set in display order.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardServiceError::SetNotFound` if the set does not exist.
    /// Returns `FlashcardServiceError::Storage` if repository access fails.
    pub async fn list_cards(&self, set_id: SetId) -> Result<Vec<Flashcard>, FlashcardServiceError> {
        self.require_set(set_id).await?;
        Ok(self.cards.list_cards(set_id).await?)
    }

    /// Replace both sides of a card.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardServiceError::CardNotFound` if the card does not exist.
    /// Returns `FlashcardServiceError::Flashcard` if validation fails.
    /// Returns `FlashcardServiceError::Storage` if repository access fails.
    pub async fn update_card(
        &self,
        card_id: CardId,
        term: &str,
        definition: &str,
    ) -> Result<Flashcard, FlashcardServiceError> {
        let mut card = self
            .cards
            .get_card(card_id)
            .await?
            .ok_or(FlashcardServiceError::CardNotFound(card_id))?;
        card.revise(term, definition, self.clock.now())?;
        self.cards
            .update_card(&card)
            .await
            .map_err(|e| card_missing(e, card_id))?;
        Ok(card)
    }

    /// Delete a card and every learner's progress on it.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardServiceError::CardNotFound` if the card does not exist.
    /// Returns `FlashcardServiceError::Storage` if repository access fails.
    pub async fn delete_card(&self, card_id: CardId) -> Result<(), FlashcardServiceError> {
        self.cards
            .delete_card(card_id)
            .await
            .map_err(|e| card_missing(e, card_id))?;
        info!(card_id = %card_id, "flashcard deleted");
        Ok(())
    }

    /// Rewrite card positions so they follow `ordered`.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardServiceError::SetNotFound` if the set does not exist.
    /// Returns `FlashcardServiceError::InvalidOrder` unless `ordered` lists every card
    /// of the set exactly once.
    /// Returns `FlashcardServiceError::Storage` if repository access fails.
    pub async fn reorder_cards(
        &self,
        set_id: SetId,
        ordered: &[CardId],
    ) -> Result<Vec<Flashcard>, FlashcardServiceError> {
        self.require_set(set_id).await?;
        self.cards
            .reorder_cards(set_id, ordered)
            .await
            .map_err(|e| match e {
                StorageError::Conflict => FlashcardServiceError::InvalidOrder(set_id),
                other => other.into(),
            })?;
        Ok(self.cards.list_cards(set_id).await?)
    }

    async fn require_set(&self, set_id: SetId) -> Result<FlashcardSet, FlashcardServiceError> {
        self.sets
            .get_set(set_id)
            .await?
            .ok_or(FlashcardServiceError::SetNotFound(set_id))
    }
}

fn set_missing(err: StorageError, set_id: SetId) -> FlashcardServiceError {
    match err {
        StorageError::NotFound => FlashcardServiceError::SetNotFound(set_id),
        other => other.into(),
    }
}

fn card_missing(err: StorageError, card_id: CardId) -> FlashcardServiceError {
    match err {
        StorageError::NotFound => FlashcardServiceError::CardNotFound(card_id),
        other => other.into(),
    }
}
