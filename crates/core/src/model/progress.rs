use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CardId, LearnerId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("unknown progress status: {0:?}")]
    InvalidStatus(String),

    #[error("invalid persisted progress: {0}")]
    InvalidPersistedState(String),
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Mastery state of a single card for a single learner.
///
/// Any status may follow any other; only `mastered_at` remembers the first mastery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    New,
    Learning,
    Mastered,
}

impl ProgressStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::New => "new",
            ProgressStatus::Learning => "learning",
            ProgressStatus::Mastered => "mastered",
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressStatus {
    type Err = ProgressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(Self::New),
            "learning" => Ok(Self::Learning),
            "mastered" => Ok(Self::Mastered),
            _ => Err(ProgressError::InvalidStatus(s.to_owned())),
        }
    }
}

//
// ─── PROGRESS RECORD ───────────────────────────────────────────────────────────
//

/// Per-(learner, card) study state.
///
/// `version` is the optimistic-concurrency token assigned by the store: 0 for a
/// record that has never been persisted, incremented on every committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashcardProgress {
    learner_id: LearnerId,
    card_id: CardId,
    status: ProgressStatus,
    review_count: u32,
    last_reviewed_at: Option<DateTime<Utc>>,
    mastered_at: Option<DateTime<Utc>>,
    version: u64,
}

impl FlashcardProgress {
    /// Fresh, unpersisted record with no review history.
    #[must_use]
    pub fn new(learner_id: LearnerId, card_id: CardId) -> Self {
        Self {
            learner_id,
            card_id,
            status: ProgressStatus::New,
            review_count: 0,
            last_reviewed_at: None,
            mastered_at: None,
            version: 0,
        }
    }

    /// Rehydrate a record read back from storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::InvalidPersistedState` if the stored fields contradict
    /// each other (timestamps without reviews, reviews without a timestamp, mastery
    /// recorded after the latest review, or a zero version).
    pub fn from_persisted(
        learner_id: LearnerId,
        card_id: CardId,
        status: ProgressStatus,
        review_count: u32,
        last_reviewed_at: Option<DateTime<Utc>>,
        mastered_at: Option<DateTime<Utc>>,
        version: u64,
    ) -> Result<Self, ProgressError> {
        if version == 0 {
            return Err(ProgressError::InvalidPersistedState(
                "version must be positive".into(),
            ));
        }
        match (review_count, last_reviewed_at) {
            (0, Some(_)) => {
                return Err(ProgressError::InvalidPersistedState(
                    "reviewed_at set without reviews".into(),
                ));
            }
            (n, None) if n > 0 => {
                return Err(ProgressError::InvalidPersistedState(
                    "reviews recorded without reviewed_at".into(),
                ));
            }
            _ => {}
        }
        if let Some(mastered) = mastered_at {
            match last_reviewed_at {
                Some(last) if mastered <= last => {}
                _ => {
                    return Err(ProgressError::InvalidPersistedState(
                        "mastered_at after last review".into(),
                    ));
                }
            }
        }

        Ok(Self {
            learner_id,
            card_id,
            status,
            review_count,
            last_reviewed_at,
            mastered_at,
            version,
        })
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn card_id(&self) -> CardId {
        self.card_id
    }

    #[must_use]
    pub fn status(&self) -> ProgressStatus {
        self.status
    }

    #[must_use]
    pub fn review_count(&self) -> u32 {
        self.review_count
    }

    #[must_use]
    pub fn last_reviewed_at(&self) -> Option<DateTime<Utc>> {
        self.last_reviewed_at
    }

    #[must_use]
    pub fn mastered_at(&self) -> Option<DateTime<Utc>> {
        self.mastered_at
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.version > 0
    }

    /// Apply one study update.
    ///
    /// Sets the status, stamps `last_reviewed_at`, counts the review, and stamps
    /// `mastered_at` only if this is the first time the card reaches `Mastered`.
    ///
    /// A `now` earlier than the previous review is clamped to it, so review
    /// timestamps never move backward when the wall clock does.
    pub fn record_review(&mut self, status: ProgressStatus, now: DateTime<Utc>) {
        let now = self.last_reviewed_at.map_or(now, |last| last.max(now));
        self.status = status;
        self.last_reviewed_at = Some(now);
        self.review_count = self.review_count.saturating_add(1);
        if status == ProgressStatus::Mastered && self.mastered_at.is_none() {
            self.mastered_at = Some(now);
        }
    }

    /// Returns the record as committed by a store under `version`.
    #[must_use]
    pub fn committed(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    #[must_use]
    pub fn view(&self) -> ProgressView {
        ProgressView {
            learner_id: self.learner_id,
            card_id: self.card_id,
            status: self.status,
            review_count: self.review_count,
            last_reviewed_at: self.last_reviewed_at,
            mastered_at: self.mastered_at,
        }
    }
}

//
// ─── READ MODELS ───────────────────────────────────────────────────────────────
//

/// Read-only snapshot handed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressView {
    pub learner_id: LearnerId,
    pub card_id: CardId,
    pub status: ProgressStatus,
    pub review_count: u32,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub mastered_at: Option<DateTime<Utc>>,
}

/// Result of reading progress for a card that is known to exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "progress", rename_all = "snake_case")]
pub enum ProgressLookup {
    /// The learner has studied the card at least once.
    Studied(ProgressView),
    /// The card exists but the learner has never studied it.
    NotStarted,
}

impl ProgressLookup {
    #[must_use]
    pub fn view(&self) -> Option<&ProgressView> {
        match self {
            ProgressLookup::Studied(view) => Some(view),
            ProgressLookup::NotStarted => None,
        }
    }

    #[must_use]
    pub fn into_view(self) -> Option<ProgressView> {
        match self {
            ProgressLookup::Studied(view) => Some(view),
            ProgressLookup::NotStarted => None,
        }
    }
}

/// Status counts across a group of cards for one learner.
///
/// Cards without a progress record count as `new`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub total: u32,
    pub new: u32,
    pub learning: u32,
    pub mastered: u32,
}

impl ProgressSummary {
    /// Tally `total_cards` cards given the statuses of those that have a record.
    #[must_use]
    pub fn tally(total_cards: u32, statuses: impl IntoIterator<Item = ProgressStatus>) -> Self {
        let mut learning = 0_u32;
        let mut mastered = 0_u32;
        for status in statuses {
            match status {
                ProgressStatus::New => {}
                ProgressStatus::Learning => learning += 1,
                ProgressStatus::Mastered => mastered += 1,
            }
        }
        let total = total_cards.max(learning + mastered);
        Self {
            total,
            new: total - learning - mastered,
            learning,
            mastered,
        }
    }

    /// Fraction of cards currently mastered, in `[0, 1]`.
    #[must_use]
    pub fn mastery_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.mastered) / f64::from(self.total)
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
