//! Events - structured progress log of a run
//!
//! Components report progress through an [`EventSink`] that is passed in
//! explicitly. Every event is appended to an in-memory log, mirrored to
//! `tracing` and broadcast to subscribers (the CLI renders progress from
//! them). Slow subscribers miss events rather than blocking the run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Severity of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    /// Detail
    Debug,
    /// Progress
    Info,
    /// Recoverable problem
    Warn,
    /// Failure
    Error,
}

/// One progress event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Reporting component (`orchestrator`, `sensemaker`, `info_seeker`, ...)
    pub component: String,
    /// Severity
    pub level: EventLevel,
    /// Human-readable message
    pub message: String,
    /// When the event was emitted
    pub at: DateTime<Utc>,
}

/// Append-only event log with broadcast fan-out
#[derive(Debug, Clone)]
pub struct EventSink {
    log: Arc<Mutex<Vec<Event>>>,
    sender: broadcast::Sender<Event>,
}

impl EventSink {
    /// Create a sink whose subscribers buffer up to `capacity` events
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            sender,
        }
    }

    /// Subscribe to future events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Emit an event
    pub fn emit(&self, component: &str, level: EventLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            EventLevel::Debug => debug!(component, "{}", message),
            EventLevel::Info => info!(component, "{}", message),
            EventLevel::Warn => warn!(component, "{}", message),
            EventLevel::Error => error!(component, "{}", message),
        }

        let event = Event {
            component: component.to_string(),
            level,
            message,
            at: Utc::now(),
        };
        self.log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
        // no subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Emit a debug event
    pub fn debug(&self, component: &str, message: impl Into<String>) {
        self.emit(component, EventLevel::Debug, message);
    }

    /// Emit an info event
    pub fn info(&self, component: &str, message: impl Into<String>) {
        self.emit(component, EventLevel::Info, message);
    }

    /// Emit a warning event
    pub fn warn(&self, component: &str, message: impl Into<String>) {
        self.emit(component, EventLevel::Warn, message);
    }

    /// Emit an error event
    pub fn error(&self, component: &str, message: impl Into<String>) {
        self.emit(component, EventLevel::Error, message);
    }

    /// Snapshot of every event so far
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of events so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether nothing was emitted yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_are_logged_in_order() {
        let sink = EventSink::default();
        assert!(sink.is_empty());
        sink.info("orchestrator", "Planning");
        sink.warn("info_seeker", "Attempt 1 failed");

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].component, "orchestrator");
        assert_eq!(events[1].level, EventLevel::Warn);
        assert!(events[0].at <= events[1].at);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let sink = EventSink::new(8);
        let mut rx = sink.subscribe();
        let clone = sink.clone();
        clone.error("sandbox", "timed out");

        let event = rx.recv().await.unwrap();
        assert_eq!(event.message, "timed out");
        assert_eq!(sink.len(), 1);
    }
}
