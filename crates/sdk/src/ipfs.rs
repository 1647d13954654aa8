//! Pinning-service upload and gateway addressing.

use crate::error::{MarketError, Result};
use crate::http::HttpFetcher;
use crate::metadata::FileBlob;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use std::future::Future;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

/// Name browsers give an unnamed blob in a multipart body.
pub const FALLBACK_FILENAME: &str = "blob";

#[derive(Debug, Deserialize)]
struct PinResponse {
    value: PinnedValue,
}

#[derive(Debug, Deserialize)]
struct PinnedValue {
    cid: String,
}

/// Public gateway location for `filename` inside directory `cid`.
pub fn gateway_location(gateway: &str, cid: &str, filename: &str) -> String {
    let filename = if filename.is_empty() {
        FALLBACK_FILENAME
    } else {
        filename
    };
    format!("{}/{}/{}", gateway.trim_end_matches('/'), cid, filename)
}

/// Outcome of waiting for outstanding repin requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepinReport {
    pub succeeded: usize,
    pub failed: usize,
}

impl RepinReport {
    fn record(&mut self, joined: std::result::Result<bool, JoinError>) {
        match joined {
            Ok(true) => self.succeeded += 1,
            Ok(false) => self.failed += 1,
            Err(err) => {
                warn!(error = %err, "repin task aborted");
                self.failed += 1;
            }
        }
    }
}

/// Running repin tasks plus the tally of the ones already reaped.
#[derive(Debug, Default)]
struct RepinTasks {
    running: JoinSet<bool>,
    finished: RepinReport,
}

impl RepinTasks {
    fn reap(&mut self) {
        while let Some(joined) = self.running.try_join_next() {
            self.finished.record(joined);
        }
    }
}

/// Uploads blobs to the pinning service and mirrors each pin to the repin endpoint.
#[derive(Clone, Debug)]
pub struct PinningClient {
    endpoint: String,
    token: Option<String>,
    repin_endpoint: String,
    gateway: String,
    fetcher: HttpFetcher,
    repins: Arc<Mutex<RepinTasks>>,
}

impl PinningClient {
    pub fn new(
        endpoint: impl Into<String>,
        token: Option<String>,
        repin_endpoint: impl Into<String>,
        gateway: impl Into<String>,
        fetcher: HttpFetcher,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            token,
            repin_endpoint: repin_endpoint.into(),
            gateway: gateway.into(),
            fetcher,
            repins: Arc::new(Mutex::new(RepinTasks::default())),
        }
    }

    /// Pin `blob` and return its gateway location. A repin request is
    /// spawned in the background; see [`PinningClient::drain_repins`].
    pub async fn upload_file(&self, blob: &FileBlob) -> Result<String> {
        let filename = if blob.name.is_empty() {
            FALLBACK_FILENAME
        } else {
            blob.name.as_str()
        };
        let part = Part::bytes(blob.bytes.clone())
            .file_name(filename.to_string())
            .mime_str(&blob.mime_type)?;
        let form = Form::new().part("file", part);

        let mut request = self.fetcher.client().post(&self.endpoint).multipart(form);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        debug!(endpoint = %self.endpoint, filename, bytes = blob.len(), "pinning file");
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MarketError::UploadFailed(format!(
                "pinning service returned {status}: {body}"
            )));
        }
        let pinned: PinResponse = response
            .json()
            .await
            .map_err(|err| MarketError::UploadFailed(format!("unexpected pin response: {err}")))?;

        self.spawn_repin(pinned.value.cid.clone()).await;

        let location = gateway_location(&self.gateway, &pinned.value.cid, &blob.name);
        info!(cid = %pinned.value.cid, %location, "file pinned");
        Ok(location)
    }

    async fn spawn_repin(&self, cid: String) {
        let client = self.fetcher.client().clone();
        let endpoint = self.repin_endpoint.clone();
        self.track(async move {
            let outcome = client
                .post(&endpoint)
                .json(&json!({ "cid": cid }))
                .send()
                .await
                .and_then(|response| response.error_for_status());
            match outcome {
                Ok(_) => {
                    debug!(%cid, "repin accepted");
                    true
                }
                Err(err) => {
                    warn!(%cid, error = %err, "repin failed");
                    false
                }
            }
        })
        .await;
    }

    /// Spawn a repin task, first tallying any that already finished.
    async fn track<F>(&self, repin: F)
    where
        F: Future<Output = bool> + Send + 'static,
    {
        let mut repins = self.repins.lock().await;
        repins.reap();
        repins.running.spawn(repin);
    }

    /// Wait for every outstanding repin request. The lock is released
    /// before waiting, so uploads may keep spawning repins meanwhile.
    pub async fn drain_repins(&self) -> RepinReport {
        let (mut running, mut report) = {
            let mut repins = self.repins.lock().await;
            (
                std::mem::take(&mut repins.running),
                std::mem::take(&mut repins.finished),
            )
        };
        while let Some(joined) = running.join_next().await {
            report.record(joined);
        }
        report
    }
}
