//! Change notification for [`ImageHistoryGraph`](crate::ImageHistoryGraph).
//!
//! Observers are registered with `subscribe` and are called synchronously,
//! in registration order, after each mutating operation completes.

use std::sync::{Mutex, PoisonError};

use crate::graph::Vertex;

/// Something that changed in an image history graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphEvent {
    /// A history was ingested. Carries the vertex of its most recent image,
    /// if the history named any image.
    HistoryAdded { subject: Option<Vertex> },
    /// Row relations were ingested.
    RelationsAdded { edges: usize },
    /// Vertices found to denote the same image were merged into `target`.
    VerticesMerged { target: Vertex, merged: usize },
    /// Redundant edges were removed.
    EdgesReduced { removed: usize },
    /// Vertices without a stored image were removed.
    VerticesDropped { dropped: usize },
    /// Stored rows were attached to vertices.
    Resolved { attached: usize },
    /// Rows no longer in the catalog were detached.
    RowsPruned { pruned: usize },
    Cleared,
}

/// Receives [`GraphEvent`]s.
pub trait GraphObserver: Send + Sync {
    fn on_event(&self, event: &GraphEvent);
}

/// Logs every event at debug level.
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl GraphObserver for LoggingObserver {
    fn on_event(&self, event: &GraphEvent) {
        tracing::debug!(?event, "image history graph changed");
    }
}

/// Collects events in memory, for tests and for callers that poll.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<GraphEvent>>,
}

impl RecordingObserver {
    /// Returns a copy of the collected events.
    pub fn events(&self) -> Vec<GraphEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Removes and returns the collected events.
    pub fn take_events(&self) -> Vec<GraphEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl GraphObserver for RecordingObserver {
    fn on_event(&self, event: &GraphEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_observer_collects_events() {
        let observer = RecordingObserver::default();
        observer.on_event(&GraphEvent::EdgesReduced { removed: 2 });
        observer.on_event(&GraphEvent::Cleared);

        assert_eq!(
            observer.events(),
            vec![GraphEvent::EdgesReduced { removed: 2 }, GraphEvent::Cleared]
        );
        assert_eq!(observer.take_events().len(), 2);
        assert!(observer.events().is_empty());
    }
}
