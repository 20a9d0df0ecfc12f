mod activity;
mod flashcard;
mod ids;
mod progress;

pub use ids::{CardId, LearnerId, ParseIdError, SetId};

pub use activity::{LearnerActivity, current_streak};
pub use flashcard::{
    CardHandle, Flashcard, FlashcardDraft, FlashcardError, FlashcardSet, FlashcardSetDraft,
    MAX_TEXT_CHARS, MAX_TITLE_CHARS, ValidatedFlashcard, ValidatedSet,
};
pub use progress::{
    FlashcardProgress, ProgressError, ProgressLookup, ProgressStatus, ProgressSummary,
    ProgressView,
};
