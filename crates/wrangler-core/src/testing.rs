//! Scripted in-memory world used by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::cancel::CancellationSignal;
use crate::crafting::{CraftingService, OrderBatch};
use crate::types::{ActorId, ClassJob, ItemId, ItemQuality, ObjectiveId, Position, ZoneId};
use crate::world::{
    ActorDirectory, ActorRef, Character, DialogKind, InteractionSurface, Inventory,
    NavigationService, QuestLedger, Services,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    GoTo(ZoneId),
    MoveIntoRange(ActorId),
    Interact(ActorId),
    Advance(DialogKind),
    Choose(DialogKind, u32),
    ChangeClass(ClassJob),
    Equip,
    Order(ItemId, u32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trigger {
    Interact(ActorId),
    Advance(DialogKind),
    Choose(DialogKind, u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Open(DialogKind),
    Grant(ObjectiveId),
    Complete(ObjectiveId),
    SetLevel(ClassJob, u32),
}

pub struct WorldState {
    pub completed: HashSet<ObjectiveId>,
    pub held: HashSet<ObjectiveId>,
    pub steps: HashMap<ObjectiveId, u32>,
    nq_items: HashMap<ItemId, u32>,
    hq_items: HashMap<ItemId, u32>,
    pub levels: HashMap<ClassJob, u32>,
    pub current_class: Option<ClassJob>,
    pub open: HashSet<DialogKind>,
    /// Actors not listed here are visible and already in range.
    pub actors: HashMap<ActorId, ActorRef>,
    pub hidden_actors: HashSet<ActorId>,
    pub nav_ok: bool,
    pub nav_delay: Duration,
    pub order_ok: bool,
    /// How long an order runs before its result lands.
    pub order_delay: Duration,
    /// Levels gained by the current class per successful order.
    pub order_level_gain: u32,
    /// When false, class change requests are ignored.
    pub class_change_applies: bool,
    /// When true, a class change opens a yes/no prompt that must be confirmed.
    pub class_change_prompt: bool,
    pending_class: Option<ClassJob>,
    /// One-shot reactions, consumed in order of first match.
    reactions: Vec<(Trigger, Vec<Effect>)>,
    pub cancel_on_interact: Option<CancellationSignal>,
}

impl Default for WorldState {
    fn default() -> Self {
        Self {
            completed: HashSet::new(),
            held: HashSet::new(),
            steps: HashMap::new(),
            nq_items: HashMap::new(),
            hq_items: HashMap::new(),
            levels: HashMap::new(),
            current_class: None,
            open: HashSet::new(),
            actors: HashMap::new(),
            hidden_actors: HashSet::new(),
            nav_ok: true,
            nav_delay: Duration::ZERO,
            order_ok: true,
            order_delay: Duration::ZERO,
            order_level_gain: 0,
            class_change_applies: true,
            class_change_prompt: false,
            pending_class: None,
            reactions: Vec::new(),
            cancel_on_interact: None,
        }
    }
}

impl WorldState {
    pub fn set_items(&mut self, item: ItemId, nq: u32, hq: u32) {
        self.nq_items.insert(item, nq);
        self.hq_items.insert(item, hq);
    }

    pub fn on(&mut self, trigger: Trigger, effects: Vec<Effect>) {
        self.reactions.push((trigger, effects));
    }

    fn fire(&mut self, trigger: Trigger) {
        let Some(idx) = self.reactions.iter().position(|(t, _)| *t == trigger) else {
            return;
        };
        let (_, effects) = self.reactions.remove(idx);
        for effect in effects {
            match effect {
                Effect::Open(kind) => {
                    self.open.insert(kind);
                }
                Effect::Grant(id) => {
                    self.held.insert(id);
                }
                Effect::Complete(id) => {
                    self.held.remove(&id);
                    self.completed.insert(id);
                }
                Effect::SetLevel(class, level) => {
                    self.levels.insert(class, level);
                }
            }
        }
    }
}

pub struct FakeWorld {
    state: Mutex<WorldState>,
    calls: Mutex<Vec<Call>>,
}

impl FakeWorld {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(WorldState::default()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut WorldState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn services(self: &Arc<Self>) -> Services {
        Services {
            navigation: self.clone(),
            actors: self.clone(),
            surface: self.clone(),
            ledger: self.clone(),
            inventory: self.clone(),
            character: self.clone(),
            crafting: self.clone(),
        }
    }
}

#[async_trait]
impl NavigationService for FakeWorld {
    async fn go_to(&self, zone: ZoneId, _position: Position) -> bool {
        self.record(Call::GoTo(zone));
        let (delay, ok) = self.update(|s| (s.nav_delay, s.nav_ok));
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        ok
    }

    async fn move_into_interact_range(&self, actor: &ActorRef) {
        self.record(Call::MoveIntoRange(actor.id));
        self.update(|s| {
            if let Some(a) = s.actors.get_mut(&actor.id) {
                a.within_interact_range = true;
            }
        });
    }
}

impl ActorDirectory for FakeWorld {
    fn find_actor_by_id(&self, id: ActorId) -> Option<ActorRef> {
        self.update(|s| {
            if s.hidden_actors.contains(&id) {
                return None;
            }
            Some(s.actors.get(&id).cloned().unwrap_or(ActorRef {
                id,
                location: Position::default(),
                within_interact_range: true,
            }))
        })
    }
}

impl InteractionSurface for FakeWorld {
    fn is_open(&self, kind: DialogKind) -> bool {
        self.update(|s| s.open.contains(&kind))
    }

    fn advance(&self, kind: DialogKind) {
        self.record(Call::Advance(kind));
        self.update(|s| {
            s.open.remove(&kind);
            s.fire(Trigger::Advance(kind));
        });
    }

    fn choose(&self, kind: DialogKind, index: u32) {
        self.record(Call::Choose(kind, index));
        self.update(|s| {
            s.open.remove(&kind);
            if kind == DialogKind::SelectYesNo && index == 0 {
                if let Some(class) = s.pending_class.take() {
                    s.current_class = Some(class);
                }
            }
            s.fire(Trigger::Choose(kind, index));
        });
    }

    fn interact(&self, actor: ActorId) {
        self.record(Call::Interact(actor));
        self.update(|s| {
            if let Some(signal) = &s.cancel_on_interact {
                signal.cancel();
            }
            s.fire(Trigger::Interact(actor));
        });
    }
}

impl QuestLedger for FakeWorld {
    fn has_objective(&self, id: ObjectiveId) -> bool {
        self.update(|s| s.held.contains(&id))
    }

    fn is_objective_completed(&self, id: ObjectiveId) -> bool {
        self.update(|s| s.completed.contains(&id))
    }

    fn objective_step(&self, id: ObjectiveId) -> u32 {
        self.update(|s| s.steps.get(&id).copied().unwrap_or(0))
    }
}

impl Inventory for FakeWorld {
    fn item_count(&self, item: ItemId, quality: ItemQuality) -> u32 {
        self.update(|s| {
            let nq = s.nq_items.get(&item).copied().unwrap_or(0);
            let hq = s.hq_items.get(&item).copied().unwrap_or(0);
            match quality {
                ItemQuality::Any => nq + hq,
                ItemQuality::High => hq,
                ItemQuality::Normal => nq,
            }
        })
    }
}

impl Character for FakeWorld {
    fn current_class(&self) -> Option<ClassJob> {
        self.update(|s| s.current_class)
    }

    fn level(&self, class: ClassJob) -> u32 {
        self.update(|s| s.levels.get(&class).copied().unwrap_or(0))
    }

    fn request_class_change(&self, class: ClassJob) {
        self.record(Call::ChangeClass(class));
        self.update(|s| {
            if !s.class_change_applies {
                return;
            }
            if s.class_change_prompt {
                s.pending_class = Some(class);
                s.open.insert(DialogKind::SelectYesNo);
            } else {
                s.current_class = Some(class);
            }
        });
    }

    fn equip_recommended(&self) {
        self.record(Call::Equip);
    }
}

#[async_trait]
impl CraftingService for FakeWorld {
    async fn submit_order(&self, batch: &OrderBatch) -> bool {
        for order in batch.orders() {
            self.record(Call::Order(order.item, order.amount));
        }
        let delay = self.update(|s| s.order_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.update(|s| {
            if !s.order_ok {
                return false;
            }
            for order in batch.orders() {
                *s.nq_items.entry(order.item).or_insert(0) += order.amount;
            }
            if let Some(class) = s.current_class {
                *s.levels.entry(class).or_insert(0) += s.order_level_gain;
            }
            true
        })
    }
}
