//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use study_core::model::{CardId, FlashcardError, LearnerId, SetId};

/// Errors emitted by `ProgressTracker`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressTrackerError {
    #[error("card {0} not found")]
    CardNotFound(CardId),
    #[error("progress for learner {learner_id} on card {card_id} kept conflicting after {attempts} attempts")]
    ConflictOnWrite {
        learner_id: LearnerId,
        card_id: CardId,
        attempts: u32,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by an `ActivityRecorder`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ActivityError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `FlashcardService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FlashcardServiceError {
    #[error(transparent)]
    Flashcard(#[from] FlashcardError),
    #[error("set {0} not found")]
    SetNotFound(SetId),
    #[error("card {0} not found")]
    CardNotFound(CardId),
    #[error("new order for set {0} must list each of its cards exactly once")]
    InvalidOrder(SetId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `SetOverviewService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OverviewError {
    #[error("set {0} not found")]
    SetNotFound(SetId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
