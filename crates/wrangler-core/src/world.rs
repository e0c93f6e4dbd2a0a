//! Capability interfaces for everything outside the core.
//!
//! The core never talks to the game host directly. Navigation, actor lookup,
//! dialog windows, the quest journal, the inventory and the active character
//! are injected as trait objects bundled in [`Services`]. Read-only queries are
//! synchronous; anything that moves the character or waits on the host is
//! `async` so callers can race it against cancellation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::crafting::CraftingService;
use crate::types::{ActorId, ClassJob, ItemId, ItemQuality, ObjectiveId, Position, ZoneId};

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

#[async_trait]
pub trait NavigationService: Send + Sync {
    /// Travel to `position` in `zone`. `false` means the attempt is over.
    async fn go_to(&self, zone: ZoneId, position: Position) -> bool;

    async fn move_into_interact_range(&self, actor: &ActorRef);
}

// ---------------------------------------------------------------------------
// Actors
// ---------------------------------------------------------------------------

/// Snapshot of an actor as seen at lookup time.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorRef {
    pub id: ActorId,
    pub location: Position,
    pub within_interact_range: bool,
}

pub trait ActorDirectory: Send + Sync {
    fn find_actor_by_id(&self, id: ActorId) -> Option<ActorRef>;
}

// ---------------------------------------------------------------------------
// Dialog surface
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogKind {
    /// Plain conversation text waiting for a click.
    Talk,
    SelectYesNo,
    /// A list of options; the caller picks an index.
    SelectString,
    JournalAccept,
    /// Completion window with the reward claim button.
    JournalResult,
    /// Item handover window.
    Request,
}

impl DialogKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DialogKind::Talk => "talk",
            DialogKind::SelectYesNo => "select_yes_no",
            DialogKind::SelectString => "select_string",
            DialogKind::JournalAccept => "journal_accept",
            DialogKind::JournalResult => "journal_result",
            DialogKind::Request => "request",
        }
    }
}

impl fmt::Display for DialogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait InteractionSurface: Send + Sync {
    fn is_open(&self, kind: DialogKind) -> bool;

    /// Click through / confirm the window of `kind`.
    fn advance(&self, kind: DialogKind);

    /// Pick option `index` in the window of `kind` (0 = yes for yes/no).
    fn choose(&self, kind: DialogKind, index: u32);

    fn interact(&self, actor: ActorId);
}

// ---------------------------------------------------------------------------
// Journal, inventory, character
// ---------------------------------------------------------------------------

pub trait QuestLedger: Send + Sync {
    fn has_objective(&self, id: ObjectiveId) -> bool;
    fn is_objective_completed(&self, id: ObjectiveId) -> bool;
    fn objective_step(&self, id: ObjectiveId) -> u32;
}

pub trait Inventory: Send + Sync {
    fn item_count(&self, item: ItemId, quality: ItemQuality) -> u32;
}

pub trait Character: Send + Sync {
    fn current_class(&self) -> Option<ClassJob>;

    /// 0 means the class is not unlocked.
    fn level(&self, class: ClassJob) -> u32;

    /// Issue the class change command. Completion is observed through
    /// [`Character::current_class`].
    fn request_class_change(&self, class: ClassJob);

    fn equip_recommended(&self);
}

// ---------------------------------------------------------------------------
// Services
// ---------------------------------------------------------------------------

/// Every collaborator the core needs, injected once at construction.
#[derive(Clone)]
pub struct Services {
    pub navigation: Arc<dyn NavigationService>,
    pub actors: Arc<dyn ActorDirectory>,
    pub surface: Arc<dyn InteractionSurface>,
    pub ledger: Arc<dyn QuestLedger>,
    pub inventory: Arc<dyn Inventory>,
    pub character: Arc<dyn Character>,
    pub crafting: Arc<dyn CraftingService>,
}

impl Services {
    pub fn levels(&self) -> BTreeMap<ClassJob, u32> {
        ClassJob::all()
            .iter()
            .map(|&c| (c, self.character.level(c)))
            .collect()
    }
}
