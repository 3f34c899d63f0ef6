//! Thought domain model.
//!
//! # Responsibility
//! - Define the journal record and its closed category set.
//! - Provide draft/patch shapes for create and merge-update flows.
//!
//! # Invariants
//! - `id` is stable and never reused for another thought.
//! - `text` is non-empty after trimming; enforced before persistence.
//! - `created_at` is stamped once at creation and never mutated by edits.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable identifier for a persisted thought.
///
/// Backed by a SQLite `INTEGER PRIMARY KEY AUTOINCREMENT` rowid, so ids are
/// monotonically increasing and never reused after a hard delete.
pub type ThoughtId = i64;

/// Closed category set for journal entries.
///
/// Kept as a tagged enum so invalid category strings cannot exist past the
/// persistence boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// A choice that was made and why.
    Decision,
    /// Something learned worth keeping.
    Lesson,
    /// Free-form reflection.
    Reflection,
}

/// Canonical journal record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thought {
    /// Stable id assigned by the store on creation.
    pub id: ThoughtId,
    /// Optional headline. May be empty.
    pub title: String,
    /// Body text. Non-empty after trimming.
    pub text: String,
    pub category: Category,
    /// Unix epoch milliseconds, stamped once at creation.
    pub created_at: i64,
    /// Pinned entries sort before unpinned ones.
    pub pinned: bool,
}

/// Input shape for creating a new thought.
///
/// `id` and `created_at` are deliberately absent: the store assigns both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewThought {
    pub title: String,
    pub text: String,
    pub category: Category,
}

impl NewThought {
    pub fn new(
        title: impl Into<String>,
        text: impl Into<String>,
        category: Category,
    ) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            category,
        }
    }

    /// Checks the required-text invariant before any persistence work.
    pub fn validate(&self) -> Result<(), ThoughtValidationError> {
        validate_text(&self.text)
    }
}

/// Field-wise merge patch for updating a stored thought.
///
/// `None` leaves the stored value untouched. `id` and `created_at` are not
/// representable here, which makes them immutable by construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThoughtPatch {
    pub title: Option<String>,
    pub text: Option<String>,
    pub category: Option<Category>,
    pub pinned: Option<bool>,
}

impl ThoughtPatch {
    /// Patch that only toggles the pinned flag.
    pub fn pin(pinned: bool) -> Self {
        Self {
            pinned: Some(pinned),
            ..Self::default()
        }
    }
}

/// Validation failures for thought input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThoughtValidationError {
    /// Body text is empty or whitespace-only.
    EmptyText,
}

impl Display for ThoughtValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyText => write!(f, "thought text must not be empty"),
        }
    }
}

impl Error for ThoughtValidationError {}

pub(crate) fn validate_text(text: &str) -> Result<(), ThoughtValidationError> {
    if text.trim().is_empty() {
        return Err(ThoughtValidationError::EmptyText);
    }
    Ok(())
}
