use std::time::Duration;

use tracing::{debug, info, warn};

use super::{InteractionKind, InteractionOutcome, InteractionRequest};
use crate::cancel::{deadline_after, is_past, CancellationSignal};
use crate::world::{DialogKind, Services};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InteractionState {
    NotStarted,
    Navigating,
    Interacting,
    DialogHandling,
}

/// Polling automaton for one actor interaction.
///
/// Each tick checks cancellation, then the goal, then the deadline, and only
/// then does at most one piece of work before sleeping for the tick interval.
/// Navigation and the tick sleep are raced against the cancellation signal.
pub struct InteractionStateMachine<'a> {
    kind: InteractionKind,
    request: InteractionRequest,
    services: &'a Services,
    tick: Duration,
    state: InteractionState,
    interacted_this_round: bool,
    dialog_seen: bool,
}

impl<'a> InteractionStateMachine<'a> {
    pub fn new(
        kind: InteractionKind,
        request: InteractionRequest,
        services: &'a Services,
        tick: Duration,
    ) -> Self {
        Self {
            kind,
            request,
            services,
            tick,
            state: InteractionState::NotStarted,
            interacted_this_round: false,
            dialog_seen: false,
        }
    }

    fn goal_met(&self) -> bool {
        self.kind
            .goal_met(self.services.ledger.as_ref(), self.request.objective)
    }

    pub async fn run(mut self, cancel: &CancellationSignal) -> InteractionOutcome {
        let req = &self.request;
        info!(
            kind = %self.kind,
            actor = req.actor,
            objective = req.objective,
            zone = req.zone,
            "interaction started"
        );
        let deadline = deadline_after(req.timeout);

        loop {
            if cancel.is_cancelled() {
                debug!(kind = %self.kind, objective = self.request.objective, "interaction cancelled");
                return InteractionOutcome::Cancelled;
            }
            if self.goal_met() {
                info!(kind = %self.kind, objective = self.request.objective, "interaction goal reached");
                return InteractionOutcome::Succeeded;
            }
            if is_past(deadline) {
                return self.expire();
            }

            if let Some(outcome) = self.tick(cancel).await {
                return outcome;
            }

            if cancel.sleep(self.tick).await.is_err() {
                return InteractionOutcome::Cancelled;
            }
        }
    }

    fn expire(&self) -> InteractionOutcome {
        if self.goal_met() {
            return InteractionOutcome::Succeeded;
        }
        warn!(
            kind = %self.kind,
            actor = self.request.actor,
            objective = self.request.objective,
            state = ?self.state,
            "interaction timed out"
        );
        InteractionOutcome::TimedOut
    }

    async fn tick(&mut self, cancel: &CancellationSignal) -> Option<InteractionOutcome> {
        match self.state {
            InteractionState::NotStarted => {
                self.state = InteractionState::Navigating;
                let travel = self
                    .services
                    .navigation
                    .go_to(self.request.zone, self.request.location);
                match cancel.guard(travel).await {
                    Err(_) => Some(InteractionOutcome::Cancelled),
                    Ok(false) => {
                        warn!(
                            zone = self.request.zone,
                            location = %self.request.location,
                            actor = self.request.actor,
                            "navigation failed"
                        );
                        Some(InteractionOutcome::NavigationFailed)
                    }
                    Ok(true) => None,
                }
            }
            InteractionState::Navigating => {
                let Some(actor) = self.services.actors.find_actor_by_id(self.request.actor) else {
                    debug!(actor = self.request.actor, "actor not visible yet");
                    return None;
                };
                if !actor.within_interact_range {
                    let approach = self.services.navigation.move_into_interact_range(&actor);
                    if cancel.guard(approach).await.is_err() {
                        return Some(InteractionOutcome::Cancelled);
                    }
                }
                self.state = InteractionState::Interacting;
                None
            }
            InteractionState::Interacting | InteractionState::DialogHandling => {
                self.handle_dialogs()
            }
        }
    }

    fn handle_dialogs(&mut self) -> Option<InteractionOutcome> {
        let surface = &self.services.surface;
        if let Some(&open) = self.kind.handlers().iter().find(|&&k| surface.is_open(k)) {
            self.dialog_seen = true;
            self.state = InteractionState::DialogHandling;
            self.respond(open);
            return None;
        }

        if self.state == InteractionState::DialogHandling {
            if self.kind == InteractionKind::Dialog && self.dialog_seen {
                info!(actor = self.request.actor, "dialog finished");
                return Some(InteractionOutcome::Succeeded);
            }
            // Windows closed without reaching the goal: start a new round.
            debug!(objective = self.request.objective, "dialogs closed early, re-engaging");
            self.state = InteractionState::Interacting;
            self.interacted_this_round = false;
        }

        if !self.interacted_this_round {
            surface.interact(self.request.actor);
            self.interacted_this_round = true;
        }
        None
    }

    fn respond(&self, kind: DialogKind) {
        let surface = &self.services.surface;
        debug!(dialog = %kind, actor = self.request.actor, "answering dialog");
        match kind {
            DialogKind::SelectYesNo => surface.choose(kind, 0),
            DialogKind::SelectString => surface.choose(kind, self.request.dialog_option.unwrap_or(0)),
            DialogKind::Talk
            | DialogKind::JournalAccept
            | DialogKind::JournalResult
            | DialogKind::Request => surface.advance(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;
    use tokio::time::Instant;
    use crate::testing::{Call, Effect, FakeWorld, Trigger};
    use crate::types::Position;
    use crate::world::QuestLedger;

    const ACTOR: u32 = 1_000_100;
    const OBJECTIVE: u32 = 65_000;
    const TICK: Duration = Duration::from_millis(250);

    fn request(timeout_secs: u64) -> InteractionRequest {
        InteractionRequest::new(
            ACTOR,
            OBJECTIVE,
            132,
            Position::new(10.0, 0.0, -5.0),
            Duration::from_secs(timeout_secs),
        )
    }

    async fn run(world: &Arc<FakeWorld>, kind: InteractionKind, req: InteractionRequest) -> InteractionOutcome {
        let services = world.services();
        let cancel = CancellationSignal::new();
        InteractionStateMachine::new(kind, req, &services, TICK)
            .run(&cancel)
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn goal_already_met_succeeds_without_navigation() {
        let world = FakeWorld::new();
        world.update(|s| s.held.insert(OBJECTIVE));
        let start = Instant::now();
        let out = run(&world, InteractionKind::Acquire, request(90)).await;
        assert_eq!(out, InteractionOutcome::Succeeded);
        assert!(world.calls().is_empty());
        assert!(start.elapsed() <= TICK);
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_walks_through_journal_accept() {
        let world = FakeWorld::new();
        world.update(|s| {
            s.on(Trigger::Interact(ACTOR), vec![Effect::Open(DialogKind::Talk)]);
            s.on(
                Trigger::Advance(DialogKind::Talk),
                vec![Effect::Open(DialogKind::JournalAccept)],
            );
            s.on(
                Trigger::Advance(DialogKind::JournalAccept),
                vec![Effect::Grant(OBJECTIVE)],
            );
        });
        let out = run(&world, InteractionKind::Acquire, request(90)).await;
        assert_eq!(out, InteractionOutcome::Succeeded);
        assert_eq!(
            world.calls(),
            vec![
                Call::GoTo(132),
                Call::Interact(ACTOR),
                Call::Advance(DialogKind::Talk),
                Call::Advance(DialogKind::JournalAccept),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn deliver_hands_over_items_and_claims_reward() {
        let world = FakeWorld::new();
        world.update(|s| {
            s.held.insert(OBJECTIVE);
            s.on(Trigger::Interact(ACTOR), vec![Effect::Open(DialogKind::Request)]);
            s.on(
                Trigger::Advance(DialogKind::Request),
                vec![Effect::Open(DialogKind::JournalResult)],
            );
            s.on(
                Trigger::Advance(DialogKind::JournalResult),
                vec![Effect::Complete(OBJECTIVE)],
            );
        });
        let out = run(&world, InteractionKind::Deliver, request(90)).await;
        assert_eq!(out, InteractionOutcome::Succeeded);
        assert_eq!(world.count(|c| matches!(c, Call::Advance(DialogKind::Request))), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn select_string_uses_requested_option() {
        let world = FakeWorld::new();
        world.update(|s| {
            s.on(Trigger::Interact(ACTOR), vec![Effect::Open(DialogKind::SelectString)]);
            s.on(
                Trigger::Choose(DialogKind::SelectString, 2),
                vec![Effect::Grant(OBJECTIVE)],
            );
        });
        let out = run(&world, InteractionKind::Acquire, request(90).with_option(2)).await;
        assert_eq!(out, InteractionOutcome::Succeeded);
        assert!(world.calls().contains(&Call::Choose(DialogKind::SelectString, 2)));
    }

    #[tokio::test(start_paused = true)]
    async fn dialog_seen_then_closed_counts_as_success() {
        let world = FakeWorld::new();
        world.update(|s| s.on(Trigger::Interact(ACTOR), vec![Effect::Open(DialogKind::Talk)]));
        let out = run(&world, InteractionKind::Dialog, request(90)).await;
        assert_eq!(out, InteractionOutcome::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_dialog_without_goal_starts_new_round() {
        let world = FakeWorld::new();
        world.update(|s| {
            s.on(Trigger::Interact(ACTOR), vec![Effect::Open(DialogKind::Talk)]);
            // second round hands over the objective
            s.on(Trigger::Interact(ACTOR), vec![Effect::Grant(OBJECTIVE)]);
        });
        let out = run(&world, InteractionKind::Acquire, request(90)).await;
        assert_eq!(out, InteractionOutcome::Succeeded);
        assert_eq!(world.count(|c| *c == Call::Interact(ACTOR)), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_failure_is_terminal() {
        let world = FakeWorld::new();
        world.update(|s| s.nav_ok = false);
        let out = run(&world, InteractionKind::Acquire, request(90)).await;
        assert_eq!(out, InteractionOutcome::NavigationFailed);
        assert_eq!(world.calls(), vec![Call::GoTo(132)]);
    }

    #[tokio::test(start_paused = true)]
    async fn moves_into_range_when_actor_is_far() {
        let world = FakeWorld::new();
        world.update(|s| {
            s.actors.insert(
                ACTOR,
                crate::world::ActorRef {
                    id: ACTOR,
                    location: Position::new(1.0, 2.0, 3.0),
                    within_interact_range: false,
                },
            );
            s.on(Trigger::Interact(ACTOR), vec![Effect::Grant(OBJECTIVE)]);
        });
        let out = run(&world, InteractionKind::Acquire, request(90)).await;
        assert_eq!(out, InteractionOutcome::Succeeded);
        assert!(world.calls().contains(&Call::MoveIntoRange(ACTOR)));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_when_actor_never_appears() {
        let world = FakeWorld::new();
        world.update(|s| s.hidden_actors.insert(ACTOR));
        let start = Instant::now();
        let out = run(&world, InteractionKind::Acquire, request(5)).await;
        assert_eq!(out, InteractionOutcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(6));
        assert_eq!(world.count(|c| matches!(c, Call::Interact(_))), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_interaction_stops_within_one_tick() {
        let world = FakeWorld::new();
        let services = world.services();
        let cancel = CancellationSignal::new();
        world.update(|s| {
            s.cancel_on_interact = Some(cancel.clone());
            // would grant the objective if the machine kept going
            s.on(Trigger::Interact(ACTOR), vec![Effect::Open(DialogKind::Talk)]);
        });
        let start = Instant::now();
        let out = InteractionStateMachine::new(InteractionKind::Acquire, request(90), &services, TICK)
            .run(&cancel)
            .await;
        assert_eq!(out, InteractionOutcome::Cancelled);
        assert!(start.elapsed() <= TICK * 3);
        let calls = world.calls();
        assert_eq!(calls.last(), Some(&Call::Interact(ACTOR)));
        assert_eq!(world.count(|c| matches!(c, Call::Advance(_))), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_slow_navigation() {
        let world = FakeWorld::new();
        world.update(|s| s.nav_delay = Duration::from_secs(600));
        let services = world.services();
        let cancel = CancellationSignal::new();
        let remote = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            remote.cancel();
        });
        let start = Instant::now();
        let out = InteractionStateMachine::new(InteractionKind::Deliver, request(900), &services, TICK)
            .run(&cancel)
            .await;
        assert_eq!(out, InteractionOutcome::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_timeout_means_no_deadline() {
        let world = FakeWorld::new();
        world.update(|s| s.on(Trigger::Interact(ACTOR), vec![Effect::Grant(OBJECTIVE)]));
        let req = InteractionRequest::new(
            ACTOR,
            OBJECTIVE,
            132,
            Position::default(),
            Duration::from_secs(u64::MAX),
        );
        let out = run(&world, InteractionKind::Acquire, req).await;
        assert_eq!(out, InteractionOutcome::Succeeded);
    }

    /// Holds the objective from the second query made at or after `at`.
    struct LateLedger {
        at: Instant,
        seen_at_deadline: AtomicBool,
    }

    impl QuestLedger for LateLedger {
        fn has_objective(&self, _id: u32) -> bool {
            if Instant::now() < self.at {
                return false;
            }
            self.seen_at_deadline.swap(true, Ordering::SeqCst)
        }

        fn is_objective_completed(&self, _id: u32) -> bool {
            false
        }

        fn objective_step(&self, _id: u32) -> u32 {
            0
        }
    }

    #[tokio::test(start_paused = true)]
    async fn goal_reached_at_the_deadline_counts_as_success() {
        let world = FakeWorld::new();
        world.update(|s| s.hidden_actors.insert(ACTOR));
        let start = Instant::now();
        let mut services = world.services();
        services.ledger = Arc::new(LateLedger {
            at: start + Duration::from_secs(5),
            seen_at_deadline: AtomicBool::new(false),
        });
        let cancel = CancellationSignal::new();
        let out = InteractionStateMachine::new(InteractionKind::Acquire, request(5), &services, TICK)
            .run(&cancel)
            .await;
        assert_eq!(out, InteractionOutcome::Succeeded);
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }
}
