//! Progress and warning reporting
//!
//! The acquisition engine never writes to a console itself. Callers hand it a
//! [`Reporter`] and decide how events surface: [`TracingReporter`] turns them
//! into log records, [`EventReporter`] broadcasts them to any number of
//! subscribers.

use crate::types::Event;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Sink for acquisition progress and warnings
pub trait Reporter: Send + Sync {
    /// Report a progress event
    fn report_progress(&self, event: &Event);

    /// Report a non-fatal warning
    fn report_warning(&self, message: &str);
}

/// Shared reporter handle
pub type SharedReporter = Arc<dyn Reporter>;

/// Reporter that logs through `tracing`
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report_progress(&self, event: &Event) {
        match event {
            Event::NameResolved { raw, canonical } => {
                tracing::info!(raw = %raw, canonical = %canonical, "scientific name resolved");
            }
            Event::PageFetched {
                offset,
                limit,
                records,
            } => {
                tracing::info!(offset, limit, records, "fetched occurrence page");
            }
            Event::AssetSaved {
                key,
                accepted,
                requested,
            } => {
                tracing::debug!(record_key = %key, accepted, requested, "image saved");
            }
            Event::AssetFailed { key, status, error } => {
                tracing::debug!(record_key = %key, ?status, error = %error, "image not saved");
            }
            Event::TargetReached { accepted } => {
                tracing::info!(accepted, "requested number of images reached");
            }
            Event::InsufficientResults {
                accepted,
                requested,
            } => {
                tracing::warn!(accepted, requested, "upstream exhausted before target");
            }
            Event::Pruned { removed } => {
                tracing::info!(removed = removed.len(), "pruned surplus images");
            }
            Event::Warning { message } => {
                tracing::warn!("{}", message);
            }
        }
    }

    fn report_warning(&self, message: &str) {
        tracing::warn!("{}", message);
    }
}

/// Reporter that broadcasts events to subscribers
///
/// Sending never blocks; events are dropped when nobody is subscribed.
#[derive(Clone, Debug)]
pub struct EventReporter {
    tx: broadcast::Sender<Event>,
}

impl EventReporter {
    /// Create a reporter with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventReporter {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl Reporter for EventReporter {
    fn report_progress(&self, event: &Event) {
        self.tx.send(event.clone()).ok();
    }

    fn report_warning(&self, message: &str) {
        self.tx
            .send(Event::Warning {
                message: message.to_string(),
            })
            .ok();
    }
}
