//! Outbound status for observers (UI panels, remote status endpoints, logs).
//!
//! Single writer, many readers. The latest [`StatusSnapshot`] lives in a
//! `watch` channel so readers always see the newest state without locking;
//! free-form log lines go out on a `broadcast` channel and are dropped when
//! nobody listens.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

use crate::types::ClassJob;

const LOG_CAPACITY: usize = 256;

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusSnapshot {
    pub run_id: Option<Uuid>,
    pub directive: String,
    pub detail: String,
    pub levels: BTreeMap<ClassJob, u32>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct StatusBus {
    inner: Arc<Inner>,
}

struct Inner {
    snapshot: watch::Sender<StatusSnapshot>,
    log_tx: broadcast::Sender<String>,
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBus {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(StatusSnapshot::default());
        let (log_tx, _) = broadcast::channel(LOG_CAPACITY);
        Self {
            inner: Arc::new(Inner { snapshot, log_tx }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.inner.snapshot.subscribe()
    }

    pub fn subscribe_log(&self) -> broadcast::Receiver<String> {
        self.inner.log_tx.subscribe()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn set_run_id(&self, run_id: Uuid) {
        self.inner.snapshot.send_modify(|s| {
            s.run_id = Some(run_id);
            s.updated_at = Some(Utc::now());
        });
    }

    pub fn publish_directive(&self, text: impl Into<String>, detail: impl Into<String>) {
        let (text, detail) = (text.into(), detail.into());
        tracing::info!(directive = %text, detail = %detail, "directive");
        self.inner.snapshot.send_modify(|s| {
            s.directive = text;
            s.detail = detail;
            s.updated_at = Some(Utc::now());
        });
    }

    pub fn publish_levels(&self, levels: BTreeMap<ClassJob, u32>) {
        self.inner.snapshot.send_modify(|s| {
            s.levels = levels;
            s.updated_at = Some(Utc::now());
        });
    }

    pub fn log(&self, message: impl Into<String>) {
        // No receivers is fine: fire-and-forget.
        let _ = self.inner.log_tx.send(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let bus = StatusBus::new();
        bus.publish_directive("Unlocking", "Miner");
        bus.log("nobody listens");
        let snap = bus.snapshot();
        assert_eq!(snap.directive, "Unlocking");
        assert_eq!(snap.detail, "Miner");
        assert!(snap.updated_at.is_some());
    }

    #[tokio::test]
    async fn subscribers_see_latest_snapshot() {
        let bus = StatusBus::new();
        let mut rx = bus.subscribe();
        bus.publish_directive("Leveling", "Miner 3 -> 20");
        let mut levels = BTreeMap::new();
        levels.insert(ClassJob::Miner, 3);
        bus.publish_levels(levels);

        rx.changed().await.unwrap();
        let snap = rx.borrow_and_update().clone();
        assert_eq!(snap.directive, "Leveling");
        assert_eq!(snap.levels.get(&ClassJob::Miner), Some(&3));
    }

    #[tokio::test]
    async fn log_lines_are_broadcast() {
        let bus = StatusBus::new();
        let mut a = bus.subscribe_log();
        let mut b = bus.subscribe_log();
        bus.log("hello");
        assert_eq!(a.recv().await.unwrap(), "hello");
        assert_eq!(b.recv().await.unwrap(), "hello");
    }
}
