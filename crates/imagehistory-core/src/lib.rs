//! Value types of the image history model.
//!
//! - [`id`]: [`HistoryImageId`], the identity of one image occurrence
//! - [`action`]: [`FilterAction`], one committed edit with its parameters
//! - [`history`]: [`DImageHistory`], the ordered entries of an image's history
//! - [`codec`]: the byte-stable textual form of a history
//! - [`error`]: [`CoreError`]

pub mod action;
pub mod codec;
pub mod error;
pub mod history;
pub mod id;

// Re-export commonly used types
pub use action::{ActionFlags, FilterAction, FilterCategory, ParamValue};
pub use error::CoreError;
pub use history::{DImageHistory, HistoryEntry};
pub use id::{fingerprint, HistoryImageId, ImageType};
