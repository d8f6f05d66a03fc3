//! Error types for contract violations detected at construction time.
//!
//! Only misuse that can be detected up front is reported here. Panics raised
//! by subscriber callbacks are not caught or converted; they unwind to
//! whoever triggered the publish.

use thiserror::Error;

/// Construction-time contract violations.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A combine signal needs at least one input.
    #[error("combine signal requires at least one input")]
    EmptyCombine,

    /// An exclusive selector needs at least two categories.
    #[error("exclusive selector requires at least two categories, got {given}")]
    TooFewCategories {
        /// Number of categories supplied.
        given: usize,
    },

    /// Category names must be unique.
    #[error("duplicate selector category `{name}`")]
    DuplicateCategory {
        /// The repeated name.
        name: String,
    },

    /// `choose` was called with a name the selector was not built with.
    #[error("unknown selector category `{name}`")]
    UnknownCategory {
        /// The unrecognised name.
        name: String,
    },

    /// The selector's own lifetime has ended.
    #[error("exclusive selector has ended")]
    SelectorEnded,
}

impl Error {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Error::EmptyCombine => "combine_empty",
            Error::TooFewCategories { .. } => "selector_too_few_categories",
            Error::DuplicateCategory { .. } => "selector_duplicate_category",
            Error::UnknownCategory { .. } => "selector_unknown_category",
            Error::SelectorEnded => "selector_ended",
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
