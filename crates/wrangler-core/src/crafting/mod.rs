//! Crafting / gathering orders and the service that executes them.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{ClassJob, ItemId};

pub use http::{HttpCraftingService, RunnerResponse, RunnerStatus};

// ---------------------------------------------------------------------------
// OrderSpec
// ---------------------------------------------------------------------------

/// One order in the runner's wire format. Field names and the lowercase JSON
/// booleans must stay as they are for compatibility with existing order files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderSpec {
    #[serde(default = "default_id")]
    pub id: u32,
    #[serde(default = "default_id")]
    pub group: u32,
    pub item: ItemId,
    pub amount: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(default)]
    pub quick_synth: bool,
    #[serde(default)]
    pub suborder_quick_synth: bool,
    #[serde(default)]
    pub hq: bool,
    #[serde(default)]
    pub food: u32,
    #[serde(default = "default_true")]
    pub primary: bool,
    #[serde(default)]
    pub manual: u32,
    #[serde(default)]
    pub medicine: u32,
}

fn default_id() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl OrderSpec {
    pub fn new(item: ItemId, amount: u32, producer: ClassJob) -> Self {
        Self {
            id: default_id(),
            group: default_id(),
            item,
            amount,
            enabled: true,
            kind: producer.order_type().to_string(),
            quick_synth: false,
            suborder_quick_synth: false,
            hq: false,
            food: 0,
            primary: true,
            manual: 0,
            medicine: 0,
        }
    }

    pub fn with_hq(mut self, hq: bool) -> Self {
        self.hq = hq;
        self
    }

    pub fn with_quick_synth(mut self, quick_synth: bool) -> Self {
        self.quick_synth = quick_synth;
        self
    }
}

// ---------------------------------------------------------------------------
// OrderBatch
// ---------------------------------------------------------------------------

/// What a single `submit_order` call hands to the runner: always a JSON array
/// on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderBatch(pub Vec<OrderSpec>);

impl OrderBatch {
    pub fn single(order: OrderSpec) -> Self {
        Self(vec![order])
    }

    /// Accepts either one order object or an array of them.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let batch = if value.is_array() {
            serde_json::from_value(value)?
        } else {
            OrderBatch(vec![serde_json::from_value(value)?])
        };
        Ok(batch)
    }

    pub fn to_wire(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn orders(&self) -> &[OrderSpec] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `item xamount` pairs, for log lines.
    pub fn summary(&self) -> String {
        self.0
            .iter()
            .map(|o| format!("{} x{}", o.item, o.amount))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// ---------------------------------------------------------------------------
// CraftingService
// ---------------------------------------------------------------------------

/// Executes orders to completion. Callers never have more than one order in
/// flight.
#[async_trait]
pub trait CraftingService: Send + Sync {
    async fn submit_order(&self, batch: &OrderBatch) -> bool;
}
