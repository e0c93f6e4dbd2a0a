//! Class unlock protocol.
//!
//! Each step is guarded by journal state, so a partially unlocked class picks
//! up where it left off:
//!
//! 1. prerequisite not completed: talk it through with the pickup actor
//! 2. unlock objective neither completed nor held: acquire it
//! 3. unlock objective held: deliver it to the turn-in actor
//! 4. unlock objective completed and class not active: switch and equip

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use crate::cancel::CancellationSignal;
use crate::config::TimingConfig;
use crate::error::{Result, WranglerError};
use crate::interaction::{InteractionOutcome, Interactor};
use crate::switch::ClassSwitcher;
use crate::tables::UnlockSpec;
use crate::types::ClassJob;
use crate::world::Services;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnlockStep {
    PrerequisiteDialog,
    AcquireUnlock,
    DeliverUnlock,
    SwitchClass,
}

impl UnlockStep {
    pub fn as_str(self) -> &'static str {
        match self {
            UnlockStep::PrerequisiteDialog => "prerequisite dialog",
            UnlockStep::AcquireUnlock => "acquire unlock objective",
            UnlockStep::DeliverUnlock => "deliver unlock objective",
            UnlockStep::SwitchClass => "switch class",
        }
    }
}

impl fmt::Display for UnlockStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnlockReport {
    pub class: ClassJob,
    pub steps: Vec<UnlockStep>,
    pub level: u32,
}

pub struct ClassUnlocker {
    services: Services,
    interactor: Interactor,
    switcher: ClassSwitcher,
    timing: TimingConfig,
}

impl ClassUnlocker {
    pub fn new(services: Services, timing: TimingConfig) -> Self {
        Self {
            interactor: Interactor::new(services.clone(), timing.clone()),
            switcher: ClassSwitcher::new(&services, timing.clone()),
            services,
            timing,
        }
    }

    pub async fn unlock(
        &self,
        spec: &UnlockSpec,
        cancel: &CancellationSignal,
    ) -> Result<UnlockReport> {
        let class = spec.class;
        let ledger = &self.services.ledger;
        let mut steps = Vec::new();

        info!(
            class = %class,
            prereq = spec.prereq_objective,
            objective = spec.unlock_objective,
            "unlocking class"
        );

        if spec.prereq_objective != 0 && !ledger.is_objective_completed(spec.prereq_objective) {
            steps.push(UnlockStep::PrerequisiteDialog);
            let req = self.interactor.request(
                spec.pickup_actor,
                spec.prereq_objective,
                spec.zone,
                spec.pickup_location,
            );
            let outcome = self.interactor.dialog(req, cancel).await;
            self.require(class, UnlockStep::PrerequisiteDialog, outcome)?;
            cancel.sleep(self.timing.settle_delay()).await?;
        }

        let unlock = spec.unlock_objective;
        if !ledger.is_objective_completed(unlock) && !ledger.has_objective(unlock) {
            steps.push(UnlockStep::AcquireUnlock);
            let req = self.interactor.request(
                spec.pickup_actor,
                unlock,
                spec.zone,
                spec.pickup_location,
            );
            let outcome = self.interactor.acquire(req, cancel).await;
            self.require(class, UnlockStep::AcquireUnlock, outcome)?;
        }

        if ledger.has_objective(unlock) {
            steps.push(UnlockStep::DeliverUnlock);
            let req = self.interactor.request(
                spec.turn_in_actor,
                unlock,
                spec.zone,
                spec.turn_in_location,
            );
            let outcome = self.interactor.deliver(req, cancel).await;
            self.require(class, UnlockStep::DeliverUnlock, outcome)?;
            cancel.sleep(self.timing.settle_delay()).await?;
        }

        let character = &self.services.character;
        if ledger.is_objective_completed(unlock) && character.current_class() != Some(class) {
            steps.push(UnlockStep::SwitchClass);
            if !self.switcher.switch_and_equip(class, cancel).await? {
                return Err(step_failure(
                    class,
                    UnlockStep::SwitchClass,
                    "class change not confirmed",
                ));
            }
        }

        let level = character.level(class);
        if level == 0 && !ledger.is_objective_completed(unlock) {
            warn!(class = %class, objective = unlock, "unlock did not take effect");
            return Err(WranglerError::UnlockStep {
                class: class.to_string(),
                step: "verify".into(),
                reason: "class still locked".into(),
            });
        }

        info!(class = %class, level, steps = steps.len(), "class unlocked");
        Ok(UnlockReport {
            class,
            steps,
            level,
        })
    }

    fn require(&self, class: ClassJob, step: UnlockStep, outcome: InteractionOutcome) -> Result<()> {
        match outcome {
            InteractionOutcome::Succeeded => Ok(()),
            InteractionOutcome::Cancelled => Err(WranglerError::Cancelled),
            InteractionOutcome::TimedOut => Err(step_failure(class, step, "interaction timed out")),
            InteractionOutcome::NavigationFailed => {
                Err(step_failure(class, step, "navigation failed"))
            }
        }
    }
}

fn step_failure(class: ClassJob, step: UnlockStep, reason: &str) -> WranglerError {
    warn!(class = %class, step = %step, reason, "unlock step failed");
    WranglerError::UnlockStep {
        class: class.to_string(),
        step: step.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{Call, Effect, FakeWorld, Trigger};
    use crate::types::Position;
    use crate::world::DialogKind;

    const PICKUP: u32 = 1_002_298;
    const TURN_IN: u32 = 1_002_282;
    const PREREQ: u32 = 65_990;
    const UNLOCK: u32 = 66_133;

    fn spec() -> UnlockSpec {
        UnlockSpec {
            class: ClassJob::Miner,
            zone: 131,
            prereq_objective: PREREQ,
            unlock_objective: UNLOCK,
            pickup_actor: PICKUP,
            pickup_location: Position::new(-18.0, 6.2, 157.6),
            turn_in_actor: TURN_IN,
            turn_in_location: Position::new(1.5, 7.6, 153.2),
        }
    }

    fn script_unlock(world: &Arc<FakeWorld>) {
        world.update(|s| {
            s.on(Trigger::Interact(PICKUP), vec![Effect::Open(DialogKind::JournalAccept)]);
            s.on(
                Trigger::Advance(DialogKind::JournalAccept),
                vec![Effect::Grant(UNLOCK)],
            );
            s.on(Trigger::Interact(TURN_IN), vec![Effect::Open(DialogKind::Talk)]);
            s.on(
                Trigger::Advance(DialogKind::Talk),
                vec![
                    Effect::Complete(UNLOCK),
                    Effect::SetLevel(ClassJob::Miner, 1),
                ],
            );
        });
    }

    fn unlocker(world: &Arc<FakeWorld>) -> ClassUnlocker {
        ClassUnlocker::new(world.services(), TimingConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_unlock_runs_acquire_deliver_switch() {
        let world = FakeWorld::new();
        world.update(|s| s.completed.insert(PREREQ));
        script_unlock(&world);

        let cancel = CancellationSignal::new();
        let report = unlocker(&world).unlock(&spec(), &cancel).await.unwrap();

        assert_eq!(
            report.steps,
            vec![
                UnlockStep::AcquireUnlock,
                UnlockStep::DeliverUnlock,
                UnlockStep::SwitchClass
            ]
        );
        assert!(report.level > 0);
        assert!(world.calls().contains(&Call::ChangeClass(ClassJob::Miner)));
        assert!(world.calls().contains(&Call::Equip));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_prerequisite_is_talked_through_first() {
        let world = FakeWorld::new();
        world.update(|s| {
            s.on(Trigger::Interact(PICKUP), vec![Effect::Complete(PREREQ)]);
        });
        script_unlock(&world);

        let cancel = CancellationSignal::new();
        let report = unlocker(&world).unlock(&spec(), &cancel).await.unwrap();
        assert_eq!(report.steps[0], UnlockStep::PrerequisiteDialog);
        assert_eq!(report.steps.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn held_objective_skips_acquire() {
        let world = FakeWorld::new();
        world.update(|s| {
            s.completed.insert(PREREQ);
            s.held.insert(UNLOCK);
        });
        script_unlock(&world);

        let cancel = CancellationSignal::new();
        let report = unlocker(&world).unlock(&spec(), &cancel).await.unwrap();
        assert_eq!(
            report.steps,
            vec![UnlockStep::DeliverUnlock, UnlockStep::SwitchClass]
        );
        assert_eq!(world.count(|c| *c == Call::Interact(PICKUP)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn completed_and_active_class_does_nothing() {
        let world = FakeWorld::new();
        world.update(|s| {
            s.completed.insert(PREREQ);
            s.completed.insert(UNLOCK);
            s.levels.insert(ClassJob::Miner, 5);
            s.current_class = Some(ClassJob::Miner);
        });
        let cancel = CancellationSignal::new();
        let report = unlocker(&world).unlock(&spec(), &cancel).await.unwrap();
        assert!(report.steps.is_empty());
        assert_eq!(report.level, 5);
        assert!(world.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_step_aborts_the_unlock() {
        let world = FakeWorld::new();
        world.update(|s| {
            s.completed.insert(PREREQ);
            s.nav_ok = false;
        });
        let cancel = CancellationSignal::new();
        let err = unlocker(&world).unlock(&spec(), &cancel).await.unwrap_err();
        match err {
            WranglerError::UnlockStep { class, step, .. } => {
                assert_eq!(class, "Miner");
                assert_eq!(step, UnlockStep::AcquireUnlock.as_str());
            }
            other => panic!("unexpected error: {other}"),
        }
        // never reached the turn-in actor
        assert_eq!(world.count(|c| matches!(c, Call::Interact(_))), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_propagates_as_cancelled() {
        let world = FakeWorld::new();
        let cancel = CancellationSignal::new();
        world.update(|s| {
            s.completed.insert(PREREQ);
            s.cancel_on_interact = Some(cancel.clone());
        });
        script_unlock(&world);
        let err = unlocker(&world).unlock(&spec(), &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(world.count(|c| *c == Call::Interact(TURN_IN)), 0);
    }
}
