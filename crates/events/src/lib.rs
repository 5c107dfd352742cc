//! Event records and the sinks that deliver them.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod event;

pub use error::Error;
pub use event::{Event, EventSource, EventType, ObjectReference};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{info, warn};

/// Destination for events.
#[async_trait]
pub trait EventSink
where
    Self: Send + Sync + 'static,
{
    /// Delivers one event.
    async fn send(&self, event: Event) -> Result<(), Error>;
}

/// Writes events to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn send(&self, event: Event) -> Result<(), Error> {
        match event.event_type {
            EventType::Normal => info!(
                reason = %event.reason,
                pod = %event.involved_object.name,
                "event: {}",
                event.message
            ),
            EventType::Warning => warn!(
                reason = %event.reason,
                pod = %event.involved_object.name,
                "event: {}",
                event.message
            ),
        }

        Ok(())
    }
}

/// Default bound on one event post.
pub const DEFAULT_POST_TIMEOUT: Duration = Duration::from_secs(5);

/// Posts events as JSON to an HTTP endpoint.
#[derive(Clone, Debug)]
pub struct HttpEventSink {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpEventSink {
    /// Creates a sink posting to `endpoint`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            timeout: DEFAULT_POST_TIMEOUT,
        }
    }

    /// Bounds each post by `timeout`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl EventSink for HttpEventSink {
    async fn send(&self, event: Event) -> Result<(), Error> {
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&event)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Rejected(response.status().as_u16()));
        }

        Ok(())
    }
}

/// Keeps events in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryEventSink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl MemoryEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event received, in order.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Events with the given reason.
    #[must_use]
    pub fn with_reason(&self, reason: &str) -> Vec<Event> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.reason == reason)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for MemoryEventSink {
    async fn send(&self, event: Event) -> Result<(), Error> {
        self.events.lock().push(event);
        Ok(())
    }
}
