use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{CraftingService, OrderBatch};
use crate::config::CraftingConfig;
use crate::error::{Result, WranglerError};

/// Consecutive `/status` failures tolerated while waiting on an order.
const MAX_STATUS_FAILURES: u32 = 3;

/// Idle polls required before an order that was never seen running counts
/// as finished.
const IDLE_POLLS_WITHOUT_START: u32 = 2;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunnerStatus {
    pub state: String,
    pub is_executing: bool,
    pub has_pending_order: bool,
    pub has_incomplete_orders: bool,
    pub current_file: String,
    pub api_status: String,
    pub bot_running: bool,
    pub character_name: String,
    pub world_name: String,
    pub runtime_seconds: u64,
}

impl RunnerStatus {
    pub fn is_busy(&self) -> bool {
        self.is_executing || self.has_pending_order
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerResponse {
    pub success: bool,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl RunnerResponse {
    pub fn text(&self) -> &str {
        self.message
            .as_deref()
            .or(self.error.as_deref())
            .unwrap_or("Unknown response")
    }
}

// ---------------------------------------------------------------------------
// HttpCraftingService
// ---------------------------------------------------------------------------

/// [`CraftingService`] backed by a remote order runner's control API.
///
/// `submit_order` posts the order JSON to `/run`, then polls `/status` until
/// the runner goes idle. Dropping the returned future stops the polling but
/// leaves the remote order running; call [`HttpCraftingService::stop_gently`]
/// to halt it.
pub struct HttpCraftingService {
    client: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
}

impl HttpCraftingService {
    pub fn new(config: &CraftingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            poll_interval: config.poll_interval(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `GET /health`; the runner answers with the literal body `ok`.
    pub async fn health(&self) -> bool {
        match self.client.get(self.url("/health")).send().await {
            Ok(resp) if resp.status().is_success() => resp
                .text()
                .await
                .map(|body| body.trim() == "ok")
                .unwrap_or(false),
            Ok(resp) => {
                debug!(status = %resp.status(), "health check returned non-success");
                false
            }
            Err(e) => {
                debug!(error = %e, "health check failed");
                false
            }
        }
    }

    pub async fn status(&self) -> Result<RunnerStatus> {
        let resp = self
            .client
            .get(self.url("/status"))
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json::<RunnerStatus>().await?)
    }

    /// `POST /run` with the order JSON inline.
    pub async fn run(&self, batch: &OrderBatch) -> Result<RunnerResponse> {
        let payload = serde_json::json!({ "json": batch.to_wire()? });
        self.command("/run", Some(payload)).await
    }

    /// `POST /run` naming an order file already on the runner's machine.
    pub async fn run_path(&self, path: &str) -> Result<RunnerResponse> {
        if path.trim().is_empty() {
            return Err(WranglerError::Runner("order file path is empty".into()));
        }
        self.command("/run", Some(serde_json::json!({ "jsonPath": path })))
            .await
    }

    /// Ask the runner to finish its current step and stop.
    pub async fn stop_gently(&self) -> Result<RunnerResponse> {
        self.command("/stop", None).await
    }

    /// Pick up orders the runner left incomplete.
    pub async fn resume(&self) -> Result<RunnerResponse> {
        self.command("/resume", None).await
    }

    /// Send the character to the runner's configured home location.
    pub async fn go_home(&self) -> Result<RunnerResponse> {
        self.command("/gohome", None).await
    }

    async fn command(
        &self,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<RunnerResponse> {
        let mut req = self.client.post(self.url(path));
        if let Some(body) = &body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        let response = resp.json::<RunnerResponse>().await?;
        debug!(path, success = response.success, message = response.text(), "runner command");
        Ok(response)
    }

    async fn wait_until_idle(&self) -> IdleOutcome {
        let mut seen_busy = false;
        let mut idle_polls = 0u32;
        let mut failures = 0u32;

        loop {
            tokio::time::sleep(self.poll_interval).await;
            match self.status().await {
                Ok(status) => {
                    failures = 0;
                    if status.is_busy() {
                        seen_busy = true;
                        idle_polls = 0;
                        continue;
                    }
                    idle_polls += 1;
                    if seen_busy {
                        debug!(state = %status.state, "order runner idle");
                        return IdleOutcome::Finished;
                    }
                    if idle_polls >= IDLE_POLLS_WITHOUT_START {
                        warn!(
                            state = %status.state,
                            current_file = %status.current_file,
                            idle_polls,
                            "order runner never reported busy; assuming the order finished between polls"
                        );
                        return IdleOutcome::NeverSeenBusy;
                    }
                }
                Err(e) => {
                    failures += 1;
                    warn!(error = %e, failures, "order runner status poll failed");
                    if failures >= MAX_STATUS_FAILURES {
                        return IdleOutcome::Unreachable;
                    }
                }
            }
        }
    }
}

/// How a wait for the runner to go idle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdleOutcome {
    Finished,
    /// Idle on every poll. Either the order ran entirely between two polls
    /// or the runner dropped it silently.
    NeverSeenBusy,
    Unreachable,
}

impl IdleOutcome {
    fn completed(self) -> bool {
        !matches!(self, IdleOutcome::Unreachable)
    }
}

#[async_trait]
impl CraftingService for HttpCraftingService {
    async fn submit_order(&self, batch: &OrderBatch) -> bool {
        if batch.is_empty() {
            warn!("refusing to submit an empty order batch");
            return false;
        }
        match self.run(batch).await {
            Ok(resp) if resp.success => {
                info!(orders = %batch.summary(), message = resp.text(), "order accepted");
            }
            Ok(resp) => {
                warn!(orders = %batch.summary(), message = resp.text(), "order rejected");
                return false;
            }
            Err(e) => {
                warn!(orders = %batch.summary(), error = %e, "order submission failed");
                return false;
            }
        }
        self.wait_until_idle().await.completed()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
