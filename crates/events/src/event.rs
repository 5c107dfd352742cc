use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// Severity of an event.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum EventType {
    /// Expected transition.
    #[default]
    Normal,

    /// Something an operator should look at.
    Warning,
}

/// Object an event is about.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    /// Object kind. Always `Pod` for this agent.
    pub kind: String,

    /// Object name.
    pub name: String,

    /// Object namespace.
    pub namespace: String,
}

/// Identity stamped on every event this agent emits.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EventSource {
    /// Pod the agent runs in.
    pub pod_name: String,

    /// Namespace of the pod.
    pub namespace: String,

    /// Reporting component.
    pub component: String,
}

/// Structured event record.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique event id.
    pub id: Uuid,

    /// Machine-readable reason.
    pub reason: String,

    /// Object the event is about.
    pub involved_object: ObjectReference,

    /// JSON-encoded event data.
    pub message: String,

    /// Severity.
    #[serde(rename = "type")]
    pub event_type: EventType,

    /// Reporting component.
    pub source: String,

    /// First occurrence.
    pub first_timestamp: DateTime<Utc>,

    /// Last occurrence.
    pub last_timestamp: DateTime<Utc>,

    /// Number of occurrences.
    pub count: u32,
}

impl Event {
    /// Builds an event about the agent's pod with `data` encoded as the message.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` cannot be encoded as JSON.
    pub fn new<T: Serialize>(
        source: &EventSource,
        reason: impl Into<String>,
        event_type: EventType,
        data: &T,
    ) -> Result<Self, Error> {
        let now = Utc::now();

        Ok(Self {
            id: Uuid::new_v4(),
            reason: reason.into(),
            involved_object: ObjectReference {
                kind: "Pod".to_string(),
                name: source.pod_name.clone(),
                namespace: source.namespace.clone(),
            },
            message: serde_json::to_string(data)?,
            event_type,
            source: source.component.clone(),
            first_timestamp: now,
            last_timestamp: now,
            count: 1,
        })
    }

    /// Decodes the message back into JSON.
    #[must_use]
    pub fn message_json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.message).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_new_event() {
        let source = EventSource {
            pod_name: "pg-0".to_string(),
            namespace: "default".to_string(),
            component: "keeper".to_string(),
        };

        let event = Event::new(
            &source,
            "checkrole",
            EventType::Normal,
            &json!({ "role": "primary" }),
        )
        .unwrap();

        assert_eq!(event.involved_object.kind, "Pod");
        assert_eq!(event.involved_object.name, "pg-0");
        assert_eq!(event.message_json(), Some(json!({ "role": "primary" })));
        assert_eq!(event.first_timestamp, event.last_timestamp);

        let wire = serde_json::to_value(&event).unwrap();
        assert_eq!(wire["type"], "Normal");
        assert_eq!(wire["involvedObject"]["namespace"], "default");
    }
}
