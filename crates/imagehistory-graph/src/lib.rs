//! Derived-from graphs over image histories.
//!
//! - [`graph`]: [`HistoryGraph`], a generic DAG with insertion-ordered queries
//! - [`closure`]: relation cloud, topological order, closure and reduction
//! - [`path`]: longest and shortest paths
//! - [`search`]: traversals, roots, leaves and dominated vertices
//! - [`image_graph`]: [`ImageHistoryGraph`], histories and catalog rows on top
//!   of a [`HistoryGraph`]
//! - [`observer`]: change notification
//! - [`config`]: display and load settings
//! - [`error`]: [`GraphError`]

pub mod closure;
pub mod config;
pub mod error;
pub mod graph;
pub mod image_graph;
pub mod observer;
pub mod path;
pub mod search;

// Re-export commonly used types
pub use config::{GraphConfig, LoadFlags};
pub use error::GraphError;
pub use graph::{Edge, HistoryGraph, Vertex};
pub use image_graph::{HistoryEdge, HistoryVertex, ImageCategory, ImageHistoryGraph};
pub use observer::{GraphEvent, GraphObserver, LoggingObserver, RecordingObserver};
pub use search::TraversalOrder;
