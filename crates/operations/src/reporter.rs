use std::sync::Arc;

use keeper_events::{Event, EventSink, EventSource, EventType};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;

/// Consecutive-failure counter that lets one report through every `frequency`
/// failures.
#[derive(Debug)]
pub struct FailureReporter {
    count: Mutex<u64>,
    frequency: u64,
}

impl FailureReporter {
    /// Creates a counter reporting every `frequency` failures (at least 1).
    #[must_use]
    pub fn new(frequency: u64) -> Self {
        Self {
            count: Mutex::new(0),
            frequency: frequency.max(1),
        }
    }

    /// Counts one failure. Returns whether this failure should be reported.
    pub fn record_failure(&self) -> bool {
        let mut count = self.count.lock();
        let report = *count % self.frequency == 0;
        *count += 1;
        report
    }

    /// Resets the streak after a success.
    pub fn reset(&self) {
        *self.count.lock() = 0;
    }

    /// Current streak length.
    #[must_use]
    pub fn count(&self) -> u64 {
        *self.count.lock()
    }
}

/// Builds and sends events about the agent's pod.
#[derive(Clone)]
pub struct EventEmitter {
    sink: Arc<dyn EventSink>,
    source: EventSource,
}

impl EventEmitter {
    /// Creates an emitter stamping events with `source`.
    #[must_use]
    pub fn new(sink: Arc<dyn EventSink>, source: EventSource) -> Self {
        Self { sink, source }
    }

    /// Sends an event with `data` as its message.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be built or delivered.
    pub async fn emit<T: Serialize + Sync>(
        &self,
        reason: &str,
        event_type: EventType,
        data: &T,
    ) -> Result<()> {
        let event = Event::new(&self.source, reason, event_type, data)?;
        self.sink.send(event).await?;
        Ok(())
    }

    /// Sends an event, logging instead of failing.
    pub async fn emit_or_log<T: Serialize + Sync>(&self, reason: &str, event_type: EventType, data: &T) {
        match self.emit(reason, event_type, data).await {
            Ok(()) => info!(reason, "event sent"),
            Err(e) => warn!(reason, "failed to send event: {}", e),
        }
    }
}
