use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::activity_service::{ActivityRecorder, ActivityService};
use crate::error::AppServicesError;
use crate::flashcard_service::FlashcardService;
use crate::overview_service::SetOverviewService;
use crate::progress_tracker::{DEFAULT_MAX_WRITE_ATTEMPTS, ProgressTracker};

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    flashcards: Arc<FlashcardService>,
    progress: Arc<ProgressTracker>,
    activity: Arc<ActivityService>,
    overview: Arc<SetOverviewService>,
}

impl AppServices {
    /// Wire every service to the repositories in `storage`.
    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, max_write_attempts: u32) -> Self {
        let activity = Arc::new(ActivityService::new(
            clock.clone(),
            Arc::clone(&storage.activity),
        ));
        let recorder: Arc<dyn ActivityRecorder> = activity.clone();

        let progress = Arc::new(
            ProgressTracker::new(
                clock.clone(),
                Arc::clone(&storage.card_lookup),
                Arc::clone(&storage.progress),
                recorder,
            )
            .with_max_write_attempts(max_write_attempts),
        );
        let flashcards = Arc::new(FlashcardService::new(
            clock,
            Arc::clone(&storage.sets),
            Arc::clone(&storage.cards),
        ));
        let overview = Arc::new(SetOverviewService::new(
            Arc::clone(&storage.sets),
            Arc::clone(&storage.cards),
            Arc::clone(&storage.progress),
        ));

        Self {
            flashcards,
            progress,
            activity,
            overview,
        }
    }

    /// Build services over a fresh in-memory store.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(&Storage::in_memory(), clock, DEFAULT_MAX_WRITE_ATTEMPTS)
    }

    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        max_write_attempts: u32,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, max_write_attempts))
    }

    #[must_use]
    pub fn flashcards(&self) -> Arc<FlashcardService> {
        Arc::clone(&self.flashcards)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressTracker> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn activity(&self) -> Arc<ActivityService> {
        Arc::clone(&self.activity)
    }

    #[must_use]
    pub fn overview(&self) -> Arc<SetOverviewService> {
        Arc::clone(&self.overview)
    }
}
