//! Volume watermark protection.

mod stats;

pub use stats::{
    HttpsVolumeStatsRequester, PodReference, PodStats, Summary, VolumeStats, VolumeStatsRequester,
};

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use keeper_events::EventType;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::operation::{InitContext, Operation, OperationBase};
use crate::ops::VOLUME_PROTECTION;
use crate::request::{OpsRequest, OpsResponse};
use crate::settings::VolumeProtectionSettings;

/// Reason of the event sent when the instance is locked.
pub const REASON_LOCK: &str = "HighVolumeWatermark";

/// Reason of the event sent when the instance is unlocked.
pub const REASON_UNLOCK: &str = "LowVolumeWatermark";

const LOCK_REASON: &str = "disk full";

#[derive(Clone, Debug, Default)]
struct VolumeState {
    high_watermark: i64,
    used_bytes: Option<u64>,
    capacity_bytes: Option<u64>,
}

impl VolumeState {
    /// Whether usage reached the watermark. Unknown stats, a zero watermark or
    /// a zero capacity never count.
    fn is_over(&self) -> bool {
        let (Some(used), Some(capacity)) = (self.used_bytes, self.capacity_bytes) else {
            return false;
        };
        if self.high_watermark <= 0 || capacity == 0 {
            return false;
        }
        let watermark = u64::try_from(self.high_watermark).unwrap_or(0);
        used >= capacity / 100 * watermark
    }

    fn usage(&self) -> Option<u64> {
        match (self.used_bytes, self.capacity_bytes) {
            (Some(used), Some(capacity)) if capacity > 0 => Some(used.saturating_mul(100) / capacity),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    volumes: BTreeMap<String, VolumeState>,
    readonly: bool,
}

/// Watermarks outside `[0, 100]` fall back to `default`.
fn normalize_watermark(watermark: Option<i64>, default: i64) -> i64 {
    match watermark {
        Some(w) if (0..=100).contains(&w) => w,
        _ => default,
    }
}

/// Locks the instance read-only when a watched volume fills past its watermark
/// and unlocks it once every watched volume is back under.
pub struct VolumeProtection {
    base: OperationBase,
    pod: String,
    high_watermark: i64,
    requester: Option<Arc<dyn VolumeStatsRequester>>,
    state: Mutex<State>,
}

impl VolumeProtection {
    /// Creates the operation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: OperationBase::new(VOLUME_PROTECTION),
            pod: String::new(),
            high_watermark: 0,
            requester: None,
            state: Mutex::new(State::default()),
        }
    }

    fn load_settings(&mut self, pod: &str, settings: &VolumeProtectionSettings) {
        self.pod = pod.to_string();
        self.high_watermark = normalize_watermark(Some(settings.high_watermark), 0);

        let volumes = settings
            .volumes
            .iter()
            .map(|spec| {
                let state = VolumeState {
                    high_watermark: normalize_watermark(spec.high_watermark, self.high_watermark),
                    ..VolumeState::default()
                };
                (spec.name.clone(), state)
            })
            .collect();
        self.state.get_mut().volumes = volumes;
    }

    fn disabled(pod: &str, state: &State) -> bool {
        pod.is_empty()
            || !state
                .volumes
                .values()
                .any(|v| v.high_watermark > 0 && v.high_watermark <= 100)
    }

    /// Whether the instance is currently held read-only by this controller.
    pub async fn is_readonly_locked(&self) -> bool {
        self.state.lock().await.readonly
    }

    fn usage_message(high_watermark: i64, state: &State) -> Value {
        let volumes: Vec<Value> = state
            .volumes
            .iter()
            .map(|(name, volume)| {
                let mut usage = Map::new();
                if volume.high_watermark != high_watermark {
                    usage.insert(
                        "highWatermark".to_string(),
                        Value::String(volume.high_watermark.to_string()),
                    );
                }
                let percent = volume
                    .usage()
                    .map_or_else(|| "<nil>".to_string(), |p| format!("{p}%"));
                usage.insert(name.clone(), Value::String(percent));
                Value::Object(usage)
            })
            .collect();

        json!({
            "highWatermark": high_watermark.to_string(),
            "volumes": volumes,
        })
    }

    fn merge_stats(&self, state: &mut State, summary: &Summary) {
        let Some(stats) = summary.volumes_of(&self.pod) else {
            warn!(pod = %self.pod, "pod missing from stats summary");
            return;
        };

        for stat in stats {
            if let Some(volume) = state.volumes.get_mut(&stat.name) {
                volume.used_bytes = stat.used_bytes;
                volume.capacity_bytes = stat.capacity_bytes;
            }
        }
    }

    async fn lock_instance(&self, state: &mut State, message: &Value) -> Result<()> {
        if let Err(e) = self.base.engine()?.lock(LOCK_REASON).await {
            error!(volumes = %message, "set instance to read-only error: {}", e);
            return Err(e.into());
        }
        info!(volumes = %message, "set instance to read-only");
        state.readonly = true;

        self.base
            .events()?
            .emit(REASON_LOCK, EventType::Normal, message)
            .await
    }

    async fn unlock_instance(&self, state: &mut State, message: &Value) -> Result<()> {
        if let Err(e) = self.base.engine()?.unlock().await {
            error!(volumes = %message, "reset instance to read-write error: {}", e);
            return Err(e.into());
        }
        info!(volumes = %message, "reset instance to read-write");
        state.readonly = false;

        self.base
            .events()?
            .emit(REASON_UNLOCK, EventType::Normal, message)
            .await
    }
}

impl Default for VolumeProtection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Operation for VolumeProtection {
    fn base(&self) -> &OperationBase {
        &self.base
    }

    async fn init(&mut self, ctx: &InitContext) -> Result<()> {
        self.base.bind_with_engine(ctx)?;
        self.load_settings(&ctx.settings.pod_name, &ctx.settings.volume_protection);

        let disabled = Self::disabled(&self.pod, self.state.get_mut());
        self.requester = match &ctx.volume_stats {
            Some(requester) => Some(requester.clone()),
            None if !disabled => Some(Arc::new(HttpsVolumeStatsRequester::new(&ctx.settings)?)),
            None => None,
        };

        let message = Self::usage_message(self.high_watermark, self.state.get_mut());
        info!(pod = %self.pod, disabled, usage = %message, "volume protection initialized");
        Ok(())
    }

    async fn run(&self, _request: OpsRequest) -> Result<Option<OpsResponse>> {
        let mut state = self.state.lock().await;
        if Self::disabled(&self.pod, &state) {
            return Ok(None);
        }

        let requester = self
            .requester
            .as_ref()
            .ok_or(Error::NotInitialized(VOLUME_PROTECTION))?;
        let payload = requester.request().await.inspect_err(|e| {
            error!("request stats summary error: {}", e);
        })?;
        let summary = Summary::parse(&payload)?;
        self.merge_stats(&mut state, &summary);

        let over = state.volumes.values().filter(|v| v.is_over()).count();
        let message = Self::usage_message(self.high_watermark, &state);

        if !state.readonly && over > 0 {
            self.lock_instance(&mut state, &message).await?;
        } else if state.readonly && over == 0 {
            self.unlock_instance(&mut state, &message).await?;
        }

        let mut response = OpsResponse::default();
        response
            .data
            .insert("protect".to_string(), Value::String(message.to_string()));
        Ok(Some(response))
    }
}
