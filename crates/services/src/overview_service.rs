use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use storage::repository::{FlashcardRepository, FlashcardSetRepository, ProgressRepository};
use study_core::model::{
    CardId, Flashcard, FlashcardSet, LearnerId, ProgressSummary, ProgressView, SetId,
};

use crate::error::OverviewError;

/// One card of a set paired with the learner's progress on it, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardProgress {
    pub card: Flashcard,
    pub progress: Option<ProgressView>,
}

/// A learner's view of one set: cards in order plus status counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetOverview {
    pub set: FlashcardSet,
    pub cards: Vec<CardProgress>,
    pub summary: ProgressSummary,
    /// Share of the set's cards currently mastered, in `[0, 1]`.
    pub mastery_ratio: f64,
}

/// Read-only join of a set's cards with one learner's progress.
#[derive(Clone)]
pub struct SetOverviewService {
    sets: Arc<dyn FlashcardSetRepository>,
    cards: Arc<dyn FlashcardRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl SetOverviewService {
    #[must_use]
    pub fn new(
        sets: Arc<dyn FlashcardSetRepository>,
        cards: Arc<dyn FlashcardRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            sets,
            cards,
            progress,
        }
    }

    /// # Errors
    ///
    /// Returns `OverviewError::SetNotFound` if the set does not exist.
    /// Returns `OverviewError::Storage` if repository access fails.
    pub async fn overview(
        &self,
        learner_id: LearnerId,
        set_id: SetId,
    ) -> Result<SetOverview, OverviewError> {
        let set = self
            .sets
            .get_set(set_id)
            .await?
            .ok_or(OverviewError::SetNotFound(set_id))?;
        let cards = self.cards.list_cards(set_id).await?;

        let ids: Vec<CardId> = cards.iter().map(|c| c.id).collect();
        let mut by_card: HashMap<CardId, ProgressView> = self
            .progress
            .progress_for_cards(learner_id, &ids)
            .await?
            .iter()
            .map(|p| (p.card_id(), p.view()))
            .collect();

        let total = u32::try_from(cards.len()).unwrap_or(u32::MAX);
        let summary = ProgressSummary::tally(total, by_card.values().map(|v| v.status));

        let cards = cards
            .into_iter()
            .map(|card| CardProgress {
                progress: by_card.remove(&card.id),
                card,
            })
            .collect();

        Ok(SetOverview {
            set,
            cards,
            mastery_ratio: summary.mastery_ratio(),
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::InMemoryRepository;
    use study_core::model::{FlashcardDraft, FlashcardProgress, FlashcardSetDraft, ProgressStatus};
    use study_core::time::fixed_now;

    #[tokio::test]
    async fn overview_pairs_cards_with_learner_progress() {
        let repo = InMemoryRepository::new();
        let set = repo
            .insert_set(
                &FlashcardSetDraft::new(LearnerId::new(1), "Verbs")
                    .validate(fixed_now())
                    .unwrap(),
            )
            .await
            .unwrap();
        let mut ids = Vec::new();
        for term in ["ser", "estar", "ir"] {
            let card = repo
                .insert_card(
                    &FlashcardDraft::new(set.id, term, "to ...")
                        .validate(fixed_now())
                        .unwrap(),
                )
                .await
                .unwrap();
            ids.push(card.id);
        }

        let learner = LearnerId::new(2);
        for (id, status) in [(ids[0], ProgressStatus::Mastered), (ids[2], ProgressStatus::Learning)] {
            let mut p = FlashcardProgress::new(learner, id);
            p.record_review(status, fixed_now());
            repo.save_progress(&p).await.unwrap();
        }
        // Another learner's progress never leaks into the overview.
        let mut other = FlashcardProgress::new(LearnerId::new(3), ids[1]);
        other.record_review(ProgressStatus::Mastered, fixed_now());
        repo.save_progress(&other).await.unwrap();

        let svc = SetOverviewService::new(
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        );
        let overview = svc.overview(learner, set.id).await.unwrap();

        assert_eq!(overview.cards.len(), 3);
        assert_eq!(
            overview.cards[0].progress.as_ref().map(|p| p.status),
            Some(ProgressStatus::Mastered)
        );
        assert!(overview.cards[1].progress.is_none());
        assert_eq!(
            overview.summary,
            ProgressSummary {
                total: 3,
                new: 1,
                learning: 1,
                mastered: 1,
            }
        );
        assert!((overview.mastery_ratio - 1.0 / 3.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn overview_of_missing_set_fails() {
        let repo = InMemoryRepository::new();
        let svc = SetOverviewService::new(
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo),
        );
        let err = svc
            .overview(LearnerId::new(1), SetId::new(77))
            .await
            .unwrap_err();
        assert!(matches!(err, OverviewError::SetNotFound(_)));
    }
}
