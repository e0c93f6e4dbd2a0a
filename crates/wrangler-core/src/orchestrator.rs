//! Top-level phase sequencer.
//!
//! UnlockAll -> LevelGatherersToThreshold -> LevelCraftersToThreshold ->
//! LevelToCap. Unlock failures abort the run; a class that cannot be leveled
//! is recorded in the [`RunSummary`] and the phase moves on to the next class.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cancel::CancellationSignal;
use crate::config::Config;
use crate::crafting::{OrderBatch, OrderSpec};
use crate::error::{Result, WranglerError};
use crate::interaction::{InteractionOutcome, Interactor};
use crate::status::StatusBus;
use crate::switch::ClassSwitcher;
use crate::tables::{ObjectiveSpec, ProgressionTables};
use crate::types::{ClassJob, ItemQuality};
use crate::unlock::{ClassUnlocker, UnlockReport};
use crate::world::Services;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    UnlockAll,
    LevelGatherersToThreshold,
    LevelCraftersToThreshold,
    LevelToCap,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::UnlockAll,
        Phase::LevelGatherersToThreshold,
        Phase::LevelCraftersToThreshold,
        Phase::LevelToCap,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::UnlockAll => "unlock all",
            Phase::LevelGatherersToThreshold => "level gatherers",
            Phase::LevelCraftersToThreshold => "level crafters",
            Phase::LevelToCap => "level to cap",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseOutcome {
    Completed,
    Unimplemented,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressionTarget {
    pub class: ClassJob,
    pub current_level: u32,
    pub target_level: u32,
}

impl ProgressionTarget {
    pub fn is_reached(&self) -> bool {
        self.current_level >= self.target_level
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LevelingOutcome {
    Reached { level: u32 },
    /// An iteration ran without the level moving.
    Stalled { level: u32 },
    OrderFailed { item: u32, amount: u32 },
    /// Neither an objective nor a grind entry applies at this level.
    NoProgressPossible { level: u32 },
    SwitchFailed,
    NotUnlocked,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassRun {
    pub class: ClassJob,
    pub phase: Phase,
    pub start_level: u32,
    pub end_level: u32,
    pub iterations: u32,
    pub outcome: LevelingOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub phases: Vec<(Phase, PhaseOutcome)>,
    pub unlocked: Vec<UnlockReport>,
    pub classes: Vec<ClassRun>,
}

// ---------------------------------------------------------------------------
// ProgressionOrchestrator
// ---------------------------------------------------------------------------

pub struct ProgressionOrchestrator {
    services: Services,
    tables: Arc<ProgressionTables>,
    config: Config,
    status: StatusBus,
    unlocker: ClassUnlocker,
    interactor: Interactor,
    switcher: ClassSwitcher,
    targets: BTreeMap<ClassJob, ProgressionTarget>,
}

impl ProgressionOrchestrator {
    pub fn new(
        services: Services,
        tables: Arc<ProgressionTables>,
        config: Config,
        status: StatusBus,
    ) -> Self {
        let timing = config.timing.clone();
        Self {
            unlocker: ClassUnlocker::new(services.clone(), timing.clone()),
            interactor: Interactor::new(services.clone(), timing.clone()),
            switcher: ClassSwitcher::new(&services, timing),
            services,
            tables,
            config,
            status,
            targets: BTreeMap::new(),
        }
    }

    pub fn targets(&self) -> &BTreeMap<ClassJob, ProgressionTarget> {
        &self.targets
    }

    fn target_level(&self, class: ClassJob) -> u32 {
        if class.is_gatherer() {
            self.config.progression.gatherer_target_level
        } else {
            self.config.progression.crafter_target_level
        }
    }

    /// Re-read every class level and publish it.
    pub fn refresh_targets(&mut self) {
        let levels = self.services.levels();
        for (&class, &level) in &levels {
            let target = ProgressionTarget {
                class,
                current_level: level,
                target_level: self.target_level(class),
            };
            self.targets.insert(class, target);
        }
        self.status.publish_levels(levels);
    }

    fn level(&self, class: ClassJob) -> u32 {
        self.services.character.level(class)
    }

    pub async fn run(&mut self, cancel: &CancellationSignal) -> Result<RunSummary> {
        let mut summary = RunSummary {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            phases: Vec::new(),
            unlocked: Vec::new(),
            classes: Vec::new(),
        };
        self.status.set_run_id(summary.run_id);
        info!(run_id = %summary.run_id, "progression started");
        self.refresh_targets();

        for phase in Phase::ALL {
            cancel.check()?;
            self.status.publish_directive(phase.as_str(), "");
            let outcome = self.run_phase(phase, &mut summary, cancel).await?;
            info!(phase = %phase, outcome = ?outcome, "phase finished");
            summary.phases.push((phase, outcome));
        }

        summary.finished_at = Some(Utc::now());
        self.status.publish_directive("Done", "");
        info!(
            run_id = %summary.run_id,
            unlocked = summary.unlocked.len(),
            classes = summary.classes.len(),
            "progression finished"
        );
        Ok(summary)
    }

    pub async fn run_phase(
        &mut self,
        phase: Phase,
        summary: &mut RunSummary,
        cancel: &CancellationSignal,
    ) -> Result<PhaseOutcome> {
        match phase {
            Phase::UnlockAll => {
                self.unlock_all(summary, cancel).await?;
                Ok(PhaseOutcome::Completed)
            }
            Phase::LevelGatherersToThreshold => {
                self.level_group(phase, ClassJob::gatherers(), summary, cancel)
                    .await?;
                Ok(PhaseOutcome::Completed)
            }
            Phase::LevelCraftersToThreshold => {
                self.level_group(phase, ClassJob::crafters(), summary, cancel)
                    .await?;
                Ok(PhaseOutcome::Completed)
            }
            Phase::LevelToCap => {
                warn!(
                    level_cap = self.config.progression.level_cap,
                    "level-to-cap phase is not implemented, skipping"
                );
                Ok(PhaseOutcome::Unimplemented)
            }
        }
    }

    async fn unlock_all(
        &mut self,
        summary: &mut RunSummary,
        cancel: &CancellationSignal,
    ) -> Result<()> {
        let tables = Arc::clone(&self.tables);
        for spec in tables.unlocks() {
            cancel.check()?;
            let class = spec.class;
            if self.config.progression.is_skipped(class) {
                debug!(class = %class, "skipped by configuration");
                continue;
            }
            if self.level(class) > 0 {
                debug!(class = %class, "already unlocked");
                continue;
            }
            self.status.publish_directive("Unlocking", class.display_name());
            let report = self.unlocker.unlock(spec, cancel).await?;
            self.refresh_targets();
            summary.unlocked.push(report);
        }
        Ok(())
    }

    async fn level_group(
        &mut self,
        phase: Phase,
        classes: &[ClassJob],
        summary: &mut RunSummary,
        cancel: &CancellationSignal,
    ) -> Result<()> {
        for &class in classes {
            cancel.check()?;
            if self.config.progression.is_skipped(class) {
                continue;
            }
            let run = self.level_class(phase, class, cancel).await?;
            match run.outcome {
                LevelingOutcome::Reached { .. } => {}
                other => warn!(class = %class, outcome = ?other, "class not leveled to target"),
            }
            summary.classes.push(run);
        }
        Ok(())
    }

    /// Per-class loop: objective, grind, stall check, until the target level.
    pub async fn level_class(
        &mut self,
        phase: Phase,
        class: ClassJob,
        cancel: &CancellationSignal,
    ) -> Result<ClassRun> {
        let start_level = self.level(class);
        let target = self.target_level(class);
        let mut run = ClassRun {
            class,
            phase,
            start_level,
            end_level: start_level,
            iterations: 0,
            outcome: LevelingOutcome::Reached { level: start_level },
        };

        if start_level == 0 {
            run.outcome = LevelingOutcome::NotUnlocked;
            return Ok(run);
        }
        if start_level >= target {
            return Ok(run);
        }

        self.status.publish_directive(
            "Leveling",
            format!("{} {start_level} -> {target}", class.display_name()),
        );
        if !self.switcher.switch_and_equip(class, cancel).await? {
            run.outcome = LevelingOutcome::SwitchFailed;
            return Ok(run);
        }

        run.outcome = loop {
            cancel.check()?;
            let before = self.level(class);
            if before >= target {
                break LevelingOutcome::Reached { level: before };
            }
            run.iterations += 1;

            let objective = self
                .tables
                .next_objective(class, before, self.services.ledger.as_ref())
                .cloned();
            let grind = self.tables.best_grind(class, before).cloned();
            if objective.is_none() && grind.is_none() {
                warn!(class = %class, level = before, "no objective or grind entry applies");
                break LevelingOutcome::NoProgressPossible { level: before };
            }

            if let Some(objective) = &objective {
                self.pursue_objective(class, objective, cancel).await?;
            }

            if let Some(grind) = &grind {
                self.status.publish_directive(
                    "Grinding",
                    format!("{} x{} for {}", grind.item, grind.amount, class.display_name()),
                );
                let batch = OrderBatch::single(OrderSpec::new(grind.item, grind.amount, class));
                if !cancel.guard(self.services.crafting.submit_order(&batch)).await? {
                    warn!(class = %class, item = grind.item, amount = grind.amount, "grind order failed");
                    break LevelingOutcome::OrderFailed {
                        item: grind.item,
                        amount: grind.amount,
                    };
                }
            }

            self.refresh_targets();
            let after = self.level(class);
            if after == before {
                warn!(class = %class, level = after, "no level progress, stopping");
                break LevelingOutcome::Stalled { level: after };
            }
            info!(class = %class, from = before, to = after, "level up");
        };

        run.end_level = self.level(class);
        Ok(run)
    }

    /// Craft any missing deliverable, then pick up and turn in the objective.
    /// Failures are logged and swallowed; only cancellation propagates.
    async fn pursue_objective(
        &self,
        class: ClassJob,
        objective: &ObjectiveSpec,
        cancel: &CancellationSignal,
    ) -> Result<()> {
        let id = objective.objective;
        self.status.publish_directive(
            "Objective",
            format!("{id} for {}", class.display_name()),
        );

        if objective.has_deliverable() {
            let have = self
                .services
                .inventory
                .item_count(objective.deliverable, ItemQuality::Any);
            if have < objective.deliverable_count {
                let missing = objective.deliverable_count - have;
                let batch =
                    OrderBatch::single(OrderSpec::new(objective.deliverable, missing, class));
                if !cancel.guard(self.services.crafting.submit_order(&batch)).await? {
                    warn!(
                        objective = id,
                        item = objective.deliverable,
                        amount = missing,
                        "deliverable order failed"
                    );
                    return Ok(());
                }
            }
        }

        let ledger = &self.services.ledger;
        if !ledger.has_objective(id) {
            let req = self.interactor.request(
                objective.actor,
                id,
                objective.zone,
                objective.location,
            );
            match self.interactor.acquire(req, cancel).await {
                InteractionOutcome::Succeeded => {}
                InteractionOutcome::Cancelled => return Err(WranglerError::Cancelled),
                other => {
                    warn!(objective = id, actor = objective.actor, outcome = ?other, "could not acquire objective");
                    return Ok(());
                }
            }
        }

        let req = self
            .interactor
            .request(objective.actor, id, objective.zone, objective.location);
        match self.interactor.deliver(req, cancel).await {
            InteractionOutcome::Succeeded => {
                info!(objective = id, class = %class, "objective completed");
                Ok(())
            }
            InteractionOutcome::Cancelled => Err(WranglerError::Cancelled),
            other => {
                warn!(objective = id, actor = objective.actor, outcome = ?other, "could not deliver objective");
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
