use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CardId, LearnerId, SetId};

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_TEXT_CHARS: usize = 2000;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FlashcardError {
    #[error("set title cannot be empty")]
    EmptyTitle,

    #[error("set title exceeds 200 characters")]
    TitleTooLong,

    #[error("card term cannot be empty")]
    EmptyTerm,

    #[error("card definition cannot be empty")]
    EmptyDefinition,

    #[error("{field} exceeds 2000 characters")]
    TextTooLong { field: &'static str },
}

fn required_text(
    raw: &str,
    max_chars: usize,
    empty: FlashcardError,
    too_long: FlashcardError,
) -> Result<String, FlashcardError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(empty);
    }
    if trimmed.chars().count() > max_chars {
        return Err(too_long);
    }
    Ok(trimmed.to_owned())
}

fn optional_text(raw: Option<&str>, field: &'static str) -> Result<Option<String>, FlashcardError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) if text.chars().count() > MAX_TEXT_CHARS => {
            Err(FlashcardError::TextTooLong { field })
        }
        Some(text) => Ok(Some(text.to_owned())),
    }
}

//
// ─── SETS ──────────────────────────────────────────────────────────────────────
//

/// Unvalidated user input for a flashcard set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashcardSetDraft {
    pub owner: LearnerId,
    pub title: String,
    pub description: Option<String>,
}

impl FlashcardSetDraft {
    #[must_use]
    pub fn new(owner: LearnerId, title: impl Into<String>) -> Self {
        Self {
            owner,
            title: title.into(),
            description: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Trim and validate the draft.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardError` if the title is blank or any field is too long.
    pub fn validate(self, now: DateTime<Utc>) -> Result<ValidatedSet, FlashcardError> {
        let title = required_text(
            &self.title,
            MAX_TITLE_CHARS,
            FlashcardError::EmptyTitle,
            FlashcardError::TitleTooLong,
        )?;
        let description = optional_text(self.description.as_deref(), "description")?;

        Ok(ValidatedSet {
            owner: self.owner,
            title,
            description,
            created_at: now,
        })
    }
}

/// Set contents that passed validation but have not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSet {
    pub owner: LearnerId,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ValidatedSet {
    #[must_use]
    pub fn assign_id(self, id: SetId) -> FlashcardSet {
        FlashcardSet {
            id,
            owner: self.owner,
            title: self.title,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardSet {
    pub id: SetId,
    pub owner: LearnerId,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FlashcardSet {
    /// Replace title and description, keeping identity and creation time.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardError` if the new values fail validation.
    pub fn revise(
        &mut self,
        title: &str,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), FlashcardError> {
        let title = required_text(
            title,
            MAX_TITLE_CHARS,
            FlashcardError::EmptyTitle,
            FlashcardError::TitleTooLong,
        )?;
        let description = optional_text(description, "description")?;
        self.title = title;
        self.description = description;
        self.updated_at = now;
        Ok(())
    }
}

//
// ─── CARDS ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashcardDraft {
    pub set_id: SetId,
    pub term: String,
    pub definition: String,
}

impl FlashcardDraft {
    #[must_use]
    pub fn new(set_id: SetId, term: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            set_id,
            term: term.into(),
            definition: definition.into(),
        }
    }

    /// Trim and validate term and definition.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardError` if either side is blank or too long.
    pub fn validate(self, now: DateTime<Utc>) -> Result<ValidatedFlashcard, FlashcardError> {
        let (term, definition) = validate_sides(&self.term, &self.definition)?;
        Ok(ValidatedFlashcard {
            set_id: self.set_id,
            term,
            definition,
            created_at: now,
        })
    }
}

fn validate_sides(term: &str, definition: &str) -> Result<(String, String), FlashcardError> {
    let term = required_text(
        term,
        MAX_TEXT_CHARS,
        FlashcardError::EmptyTerm,
        FlashcardError::TextTooLong { field: "term" },
    )?;
    let definition = required_text(
        definition,
        MAX_TEXT_CHARS,
        FlashcardError::EmptyDefinition,
        FlashcardError::TextTooLong {
            field: "definition",
        },
    )?;
    Ok((term, definition))
}

/// Card contents ready to insert; the store assigns id and position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedFlashcard {
    pub set_id: SetId,
    pub term: String,
    pub definition: String,
    pub created_at: DateTime<Utc>,
}

impl ValidatedFlashcard {
    #[must_use]
    pub fn assign(self, id: CardId, position: u32) -> Flashcard {
        Flashcard {
            id,
            set_id: self.set_id,
            term: self.term,
            definition: self.definition,
            position,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: CardId,
    pub set_id: SetId,
    pub term: String,
    pub definition: String,
    /// Zero-based order within the set.
    pub position: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Flashcard {
    /// Replace term and definition.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardError` if either side fails validation.
    pub fn revise(
        &mut self,
        term: &str,
        definition: &str,
        now: DateTime<Utc>,
    ) -> Result<(), FlashcardError> {
        let (term, definition) = validate_sides(term, definition)?;
        self.term = term;
        self.definition = definition;
        self.updated_at = now;
        Ok(())
    }

    #[must_use]
    pub fn handle(&self) -> CardHandle {
        CardHandle {
            card_id: self.id,
            set_id: self.set_id,
        }
    }
}

/// Minimal identity of a card as resolved by the card lookup authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardHandle {
    pub card_id: CardId,
    pub set_id: SetId,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
