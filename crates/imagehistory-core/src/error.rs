//! Core error types for imagehistory-core.
//!
//! Uses `thiserror` for structured, matchable error variants. Parsing
//! serialized histories never fails (damaged input degrades to the longest
//! valid prefix), so these variants cover encoding and file access only.

use thiserror::Error;

/// Core errors produced by the imagehistory-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON encoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A floating point parameter cannot be represented in the textual form.
    #[error("parameter '{name}' of action '{action}' is not a finite number")]
    NonFiniteParameter { action: String, name: String },

    /// Reading or writing a history file failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
