#![forbid(unsafe_code)]

pub mod activity_service;
pub mod app_services;
pub mod error;
pub mod flashcard_service;
pub mod overview_service;
pub mod progress_tracker;

pub use study_core::Clock;

pub use activity_service::{ActivityRecorder, ActivityService, STREAK_LOOKBACK_DAYS};
pub use app_services::AppServices;
pub use error::{
    ActivityError, AppServicesError, FlashcardServiceError, OverviewError, ProgressTrackerError,
};
pub use flashcard_service::FlashcardService;
pub use overview_service::{CardProgress, SetOverview, SetOverviewService};
pub use progress_tracker::{DEFAULT_MAX_WRITE_ATTEMPTS, ProgressTracker};
