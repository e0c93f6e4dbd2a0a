//! Actor interactions: walk to an NPC, click through whatever it shows, stop
//! when the journal says the goal is reached.

mod machine;

pub use machine::InteractionStateMachine;

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::cancel::CancellationSignal;
use crate::config::TimingConfig;
use crate::types::{ActorId, ObjectiveId, Position, ZoneId};
use crate::world::{DialogKind, QuestLedger, Services};

// ---------------------------------------------------------------------------
// InteractionKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InteractionKind {
    /// Goal: the objective is held.
    Acquire,
    /// Goal: the objective is completed. Handles item handover.
    Deliver,
    /// Goal: the objective is completed, or dialog was seen and then closed
    /// with nothing left to answer.
    Dialog,
}

impl InteractionKind {
    pub fn name(self) -> &'static str {
        match self {
            InteractionKind::Acquire => "ObjectiveAcquire",
            InteractionKind::Deliver => "ObjectiveDeliver",
            InteractionKind::Dialog => "ActorDialog",
        }
    }

    pub fn goal_met(self, ledger: &dyn QuestLedger, objective: ObjectiveId) -> bool {
        match self {
            InteractionKind::Acquire => ledger.has_objective(objective),
            InteractionKind::Deliver | InteractionKind::Dialog => {
                ledger.is_objective_completed(objective)
            }
        }
    }

    /// Dialog windows this kind answers, highest priority first.
    pub fn handlers(self) -> &'static [DialogKind] {
        use DialogKind::*;
        match self {
            InteractionKind::Acquire => &[Talk, SelectYesNo, SelectString, JournalAccept],
            InteractionKind::Dialog => &[
                Talk,
                SelectYesNo,
                SelectString,
                JournalAccept,
                JournalResult,
            ],
            InteractionKind::Deliver => &[
                Talk,
                SelectYesNo,
                SelectString,
                JournalAccept,
                JournalResult,
                Request,
            ],
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Request / outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct InteractionRequest {
    pub actor: ActorId,
    pub objective: ObjectiveId,
    pub zone: ZoneId,
    pub location: Position,
    pub timeout: Duration,
    /// Index picked in `SelectString` windows. Defaults to the first option.
    pub dialog_option: Option<u32>,
}

impl InteractionRequest {
    pub fn new(
        actor: ActorId,
        objective: ObjectiveId,
        zone: ZoneId,
        location: Position,
        timeout: Duration,
    ) -> Self {
        Self {
            actor,
            objective,
            zone,
            location,
            timeout,
            dialog_option: None,
        }
    }

    pub fn with_option(mut self, option: u32) -> Self {
        self.dialog_option = Some(option);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionOutcome {
    Succeeded,
    TimedOut,
    NavigationFailed,
    Cancelled,
}

impl InteractionOutcome {
    pub fn is_success(self) -> bool {
        self == InteractionOutcome::Succeeded
    }
}

// ---------------------------------------------------------------------------
// Interactor
// ---------------------------------------------------------------------------

/// Builds and runs interaction machines with shared services and timing.
#[derive(Clone)]
pub struct Interactor {
    services: Services,
    timing: TimingConfig,
}

impl Interactor {
    pub fn new(services: Services, timing: TimingConfig) -> Self {
        Self { services, timing }
    }

    /// Request with the configured default timeout.
    pub fn request(
        &self,
        actor: ActorId,
        objective: ObjectiveId,
        zone: ZoneId,
        location: Position,
    ) -> InteractionRequest {
        InteractionRequest::new(
            actor,
            objective,
            zone,
            location,
            self.timing.interaction_timeout(),
        )
    }

    pub async fn run(
        &self,
        kind: InteractionKind,
        request: InteractionRequest,
        cancel: &CancellationSignal,
    ) -> InteractionOutcome {
        InteractionStateMachine::new(kind, request, &self.services, self.timing.tick_interval())
            .run(cancel)
            .await
    }

    pub async fn acquire(
        &self,
        request: InteractionRequest,
        cancel: &CancellationSignal,
    ) -> InteractionOutcome {
        self.run(InteractionKind::Acquire, request, cancel).await
    }

    pub async fn deliver(
        &self,
        request: InteractionRequest,
        cancel: &CancellationSignal,
    ) -> InteractionOutcome {
        self.run(InteractionKind::Deliver, request, cancel).await
    }

    pub async fn dialog(
        &self,
        request: InteractionRequest,
        cancel: &CancellationSignal,
    ) -> InteractionOutcome {
        self.run(InteractionKind::Dialog, request, cancel).await
    }
}
