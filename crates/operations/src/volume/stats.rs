use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::settings::Settings;

/// Source of the node's stats summary.
#[async_trait]
pub trait VolumeStatsRequester
where
    Self: Send + Sync + 'static,
{
    /// Fetches the raw summary document.
    async fn request(&self) -> Result<Bytes>;
}

/// Fetches the summary from the kubelet over HTTPS with the pod's service
/// account identity.
#[derive(Debug)]
pub struct HttpsVolumeStatsRequester {
    client: reqwest::Client,
    url: String,
    token_file: PathBuf,
}

impl HttpsVolumeStatsRequester {
    /// Builds a requester trusting the configured CA bundle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSetting`] if the CA bundle cannot be loaded.
    pub fn new(settings: &Settings) -> Result<Self> {
        let kubelet = &settings.kubelet;

        let pem = std::fs::read(&kubelet.ca_file).map_err(|e| {
            Error::InvalidSetting(format!("reading {}: {e}", kubelet.ca_file.display()))
        })?;
        let certificate = reqwest::Certificate::from_pem(&pem)
            .map_err(|e| Error::InvalidSetting(format!("parsing CA bundle: {e}")))?;
        let client = reqwest::Client::builder()
            .add_root_certificate(certificate)
            .build()
            .map_err(|e| Error::InvalidSetting(format!("building kubelet client: {e}")))?;

        Ok(Self {
            client,
            url: format!("https://{}:{}/stats/summary", settings.host_ip, kubelet.port),
            token_file: kubelet.token_file.clone(),
        })
    }

    /// Endpoint the summary is read from.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl VolumeStatsRequester for HttpsVolumeStatsRequester {
    async fn request(&self) -> Result<Bytes> {
        // The token is rotated on disk, so it is read on every request.
        let token = tokio::fs::read_to_string(&self.token_file)
            .await
            .map_err(|e| Error::VolumeStats(format!("reading token: {e}")))?;

        let mut request = self.client.get(&self.url);
        let token = token.trim();
        if !token.is_empty() {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::VolumeStats(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::VolumeStats(format!(
                "kubelet responded {}",
                response.status()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::VolumeStats(e.to_string()))?;
        debug!("received {} bytes of stats summary", body.len());

        Ok(body)
    }
}

/// Stats summary document, reduced to what volume protection reads.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Summary {
    /// Per-pod stats.
    #[serde(default)]
    pub pods: Vec<PodStats>,
}

/// Stats of one pod.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStats {
    /// Pod identity.
    pub pod_ref: PodReference,

    /// Per-volume filesystem stats.
    #[serde(default, rename = "volume")]
    pub volumes: Vec<VolumeStats>,
}

/// Pod identity in a summary.
#[derive(Clone, Debug, Deserialize)]
pub struct PodReference {
    /// Pod name.
    pub name: String,

    /// Pod namespace.
    #[serde(default)]
    pub namespace: String,
}

/// Filesystem stats of one volume.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VolumeStats {
    /// Volume name in the pod spec.
    pub name: String,

    /// Bytes used.
    #[serde(default)]
    pub used_bytes: Option<u64>,

    /// Filesystem capacity in bytes.
    #[serde(default)]
    pub capacity_bytes: Option<u64>,
}

impl Summary {
    /// Parses a summary document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VolumeStats`] on malformed JSON.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(|e| Error::VolumeStats(format!("malformed summary: {e}")))
    }

    /// Volume stats of `pod`, if the pod is present.
    #[must_use]
    pub fn volumes_of(&self, pod: &str) -> Option<&[VolumeStats]> {
        self.pods
            .iter()
            .find(|p| p.pod_ref.name == pod)
            .map(|p| p.volumes.as_slice())
    }
}
