use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use storage::repository::{CardLookup, ProgressRepository, StorageError};
use study_core::model::{
    CardId, FlashcardProgress, LearnerId, ProgressLookup, ProgressStatus, ProgressView,
};

use crate::Clock;
use crate::activity_service::ActivityRecorder;
use crate::error::ProgressTrackerError;

/// Attempts made before a contended update gives up with `ConflictOnWrite`.
pub const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 16;

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Owns the mastery state of each (learner, card) pair.
///
/// Updates are read-modify-write cycles guarded by the store's version check:
/// a lost race re-reads the latest record and applies the update again, so no
/// committed review is ever overwritten.
#[derive(Clone)]
pub struct ProgressTracker {
    clock: Clock,
    cards: Arc<dyn CardLookup>,
    progress: Arc<dyn ProgressRepository>,
    activity: Arc<dyn ActivityRecorder>,
    max_write_attempts: u32,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(
        clock: Clock,
        cards: Arc<dyn CardLookup>,
        progress: Arc<dyn ProgressRepository>,
        activity: Arc<dyn ActivityRecorder>,
    ) -> Self {
        Self {
            clock,
            cards,
            progress,
            activity,
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
        }
    }

    /// Override the retry budget for conflicting writes (minimum 1).
    #[must_use]
    pub fn with_max_write_attempts(mut self, attempts: u32) -> Self {
        self.max_write_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn max_write_attempts(&self) -> u32 {
        self.max_write_attempts
    }

    async fn ensure_card(&self, card_id: CardId) -> Result<(), ProgressTrackerError> {
        if self.cards.card_exists(card_id).await? {
            Ok(())
        } else {
            Err(ProgressTrackerError::CardNotFound(card_id))
        }
    }

    /// Read the learner's progress on a card.
    ///
    /// Returns `ProgressLookup::NotStarted` when the card exists but has never been
    /// studied by this learner.
    ///
    /// # Errors
    ///
    /// Returns `ProgressTrackerError::CardNotFound` if the card does not exist.
    /// Returns `ProgressTrackerError::Storage` if either collaborator fails.
    pub async fn get_progress(
        &self,
        learner_id: LearnerId,
        card_id: CardId,
    ) -> Result<ProgressLookup, ProgressTrackerError> {
        self.ensure_card(card_id).await?;

        let lookup = match self.progress.find_progress(learner_id, card_id).await? {
            Some(record) => ProgressLookup::Studied(record.view()),
            None => ProgressLookup::NotStarted,
        };
        Ok(lookup)
    }

    /// Record that the learner studied a card and now rates it `status`.
    ///
    /// Creates the record on first use. Every call counts one review and stamps
    /// `last_reviewed_at`; `mastered_at` is stamped only on the first transition
    /// to `Mastered`. The learner-activity event is emitted after the write commits.
    ///
    /// # Errors
    ///
    /// Returns `ProgressTrackerError::CardNotFound` if the card does not exist.
    /// Returns `ProgressTrackerError::ConflictOnWrite` if every attempt lost a race.
    /// Returns `ProgressTrackerError::Storage` for any other storage failure; in that
    /// case nothing was written and no activity is recorded.
    pub async fn update_progress(
        &self,
        learner_id: LearnerId,
        card_id: CardId,
        status: ProgressStatus,
    ) -> Result<ProgressView, ProgressTrackerError> {
        self.ensure_card(card_id).await?;

        for attempt in 1..=self.max_write_attempts {
            let mut record = self
                .progress
                .find_progress(learner_id, card_id)
                .await?
                .unwrap_or_else(|| FlashcardProgress::new(learner_id, card_id));

            let now = self.clock.now();
            record.record_review(status, now);

            match self.progress.save_progress(&record).await {
                Ok(saved) => {
                    debug!(
                        learner_id = %learner_id,
                        card_id = %card_id,
                        status = %saved.status(),
                        review_count = saved.review_count(),
                        version = saved.version(),
                        "progress committed"
                    );
                    self.emit_activity(learner_id, now).await;
                    return Ok(saved.view());
                }
                Err(StorageError::Conflict) => {
                    debug!(
                        learner_id = %learner_id,
                        card_id = %card_id,
                        attempt,
                        "progress write conflicted, retrying"
                    );
                }
                // The card vanished between the existence check and the write.
                Err(StorageError::NotFound) => {
                    return Err(ProgressTrackerError::CardNotFound(card_id));
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(ProgressTrackerError::ConflictOnWrite {
            learner_id,
            card_id,
            attempts: self.max_write_attempts,
        })
    }

    /// Views for every card in `card_ids` the learner has studied, skipping the rest.
    ///
    /// # Errors
    ///
    /// Returns `ProgressTrackerError::Storage` if the progress store fails.
    pub async fn progress_for_cards(
        &self,
        learner_id: LearnerId,
        card_ids: &[CardId],
    ) -> Result<Vec<ProgressView>, ProgressTrackerError> {
        let records = self
            .progress
            .progress_for_cards(learner_id, card_ids)
            .await?;
        Ok(records.iter().map(FlashcardProgress::view).collect())
    }

    async fn emit_activity(&self, learner_id: LearnerId, at: DateTime<Utc>) {
        if let Err(err) = self.activity.record_activity(learner_id, at).await {
            warn!(learner_id = %learner_id, error = %err, "failed to record learner activity");
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
