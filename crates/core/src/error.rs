use thiserror::Error;

use crate::model::{FlashcardError, ParseIdError, ProgressError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Flashcard(#[from] FlashcardError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
}
