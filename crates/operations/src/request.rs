use std::collections::{BTreeMap, HashMap};
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outcome marker carried in a response's `event` key.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum OpsEvent {
    /// The operation did what it was asked.
    Success,

    /// The operation ran but the outcome is a failure.
    Failed,
}

impl fmt::Display for OpsEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "Success"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Inbound request: a parameter bag plus an optional opaque payload.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct OpsRequest {
    /// Arbitrary parameters.
    #[serde(default)]
    pub parameters: HashMap<String, Value>,

    /// Opaque payload, base64 on the wire.
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
}

impl OpsRequest {
    /// Creates a request from `(key, value)` pairs.
    #[must_use]
    pub fn with_parameters<I, K, V>(parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            parameters: parameters
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            data: None,
        }
    }

    /// A string parameter. Empty strings count as absent.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Result bag plus transport metadata.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct OpsResponse {
    /// Result entries.
    pub data: Map<String, Value>,

    /// Transport-level annotations.
    pub metadata: BTreeMap<String, String>,
}

impl OpsResponse {
    /// Creates a response whose `event` is `event`.
    #[must_use]
    pub fn new(event: OpsEvent) -> Self {
        let mut response = Self::default();
        response
            .data
            .insert("event".to_string(), Value::String(event.to_string()));
        response
    }

    /// Adds one result entry.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    /// The `event` entry, if present and valid.
    #[must_use]
    pub fn event(&self) -> Option<OpsEvent> {
        match self.data.get("event").and_then(Value::as_str) {
            Some("Success") => Some(OpsEvent::Success),
            Some("Failed") => Some(OpsEvent::Failed),
            _ => None,
        }
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(data: &Option<Bytes>, serializer: S) -> Result<S::Ok, S::Error> {
        match data {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Bytes>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|text| {
                STANDARD
                    .decode(text)
                    .map(Bytes::from)
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
    }
}
