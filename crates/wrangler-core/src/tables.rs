//! Static progression tables: how each class is unlocked, which objectives
//! advance it, and what to produce when no objective is available.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::ConfigWarning;
use crate::error::{Result, WranglerError};
use crate::types::{ActorId, ClassJob, ItemId, ObjectiveId, Position, ZoneId};
use crate::world::QuestLedger;

// ---------------------------------------------------------------------------
// UnlockSpec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnlockSpec {
    pub class: ClassJob,
    pub zone: ZoneId,
    pub prereq_objective: ObjectiveId,
    pub unlock_objective: ObjectiveId,
    pub pickup_actor: ActorId,
    pub pickup_location: Position,
    pub turn_in_actor: ActorId,
    pub turn_in_location: Position,
}

// ---------------------------------------------------------------------------
// GrindSpec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrindSpec {
    pub class: ClassJob,
    pub min_level: u32,
    pub item: ItemId,
    pub amount: u32,
}

/// The entry with the highest `min_level <= level`. `specs` must be sorted by
/// `min_level`, which [`ProgressionTables::validate`] enforces.
pub fn select_best_grind(specs: &[&GrindSpec], level: u32) -> Option<usize> {
    specs
        .iter()
        .enumerate()
        .filter(|(_, s)| s.min_level <= level)
        .max_by_key(|(_, s)| s.min_level)
        .map(|(i, _)| i)
}

// ---------------------------------------------------------------------------
// ObjectiveSpec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveSpec {
    pub objective: ObjectiveId,
    /// 0 = no prerequisite.
    #[serde(default)]
    pub prerequisite: ObjectiveId,
    pub required_level: u32,
    pub actor: ActorId,
    pub zone: ZoneId,
    pub location: Position,
    /// 0 = nothing to hand over.
    #[serde(default)]
    pub deliverable: ItemId,
    #[serde(default)]
    pub deliverable_count: u32,
}

impl ObjectiveSpec {
    pub fn has_deliverable(&self) -> bool {
        self.deliverable != 0 && self.deliverable_count > 0
    }

    pub fn is_eligible(&self, level: u32, ledger: &dyn QuestLedger) -> bool {
        level >= self.required_level
            && !ledger.is_objective_completed(self.objective)
            && !ledger.has_objective(self.objective)
            && (self.prerequisite == 0 || ledger.is_objective_completed(self.prerequisite))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TablesFile {
    #[serde(default)]
    unlocks: Vec<UnlockSpec>,
    #[serde(default)]
    grinds: Vec<GrindSpec>,
    #[serde(default)]
    objectives: BTreeMap<ClassJob, Vec<ObjectiveSpec>>,
}

// ---------------------------------------------------------------------------
// ProgressionTables
// ---------------------------------------------------------------------------

/// Immutable once loaded; share behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct ProgressionTables {
    unlocks: Vec<UnlockSpec>,
    grinds: Vec<GrindSpec>,
    objectives: BTreeMap<ClassJob, Vec<ObjectiveSpec>>,
}

impl ProgressionTables {
    /// Build and validate.
    pub fn new(
        unlocks: Vec<UnlockSpec>,
        grinds: Vec<GrindSpec>,
        objectives: BTreeMap<ClassJob, Vec<ObjectiveSpec>>,
    ) -> Result<Self> {
        let tables = Self {
            unlocks,
            grinds,
            objectives,
        };
        tables.validate()?;
        Ok(tables)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&data)
    }

    pub fn from_yaml_str(data: &str) -> Result<Self> {
        let file: TablesFile = serde_yaml::from_str(data)?;
        Self::new(file.unlocks, file.grinds, file.objectives)
    }

    pub fn to_yaml(&self) -> Result<String> {
        let file = TablesFile {
            unlocks: self.unlocks.clone(),
            grinds: self.grinds.clone(),
            objectives: self.objectives.clone(),
        };
        Ok(serde_yaml::to_string(&file)?)
    }

    /// Hard invariants: one unlock spec per class, strictly increasing grind
    /// thresholds within a class.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for spec in &self.unlocks {
            if !seen.insert(spec.class) {
                return Err(WranglerError::InvalidTables(format!(
                    "duplicate unlock spec for {}",
                    spec.class
                )));
            }
        }

        let mut last: BTreeMap<ClassJob, u32> = BTreeMap::new();
        for spec in &self.grinds {
            if let Some(&prev) = last.get(&spec.class) {
                if spec.min_level <= prev {
                    return Err(WranglerError::InvalidTables(format!(
                        "grind thresholds for {} must strictly increase ({} after {})",
                        spec.class, spec.min_level, prev
                    )));
                }
            }
            last.insert(spec.class, spec.min_level);
        }

        for (class, specs) in &self.objectives {
            let mut ids = HashSet::new();
            for spec in specs {
                if !ids.insert(spec.objective) {
                    return Err(WranglerError::InvalidTables(format!(
                        "objective {} listed twice for {}",
                        spec.objective, class
                    )));
                }
            }
        }
        Ok(())
    }

    /// Soft findings that do not stop a run.
    pub fn warnings(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let known: HashSet<ObjectiveId> = self
            .objectives
            .values()
            .flatten()
            .map(|o| o.objective)
            .chain(self.unlocks.iter().map(|u| u.unlock_objective))
            .chain(self.unlocks.iter().map(|u| u.prereq_objective))
            .collect();

        for (class, specs) in &self.objectives {
            for spec in specs {
                if spec.prerequisite != 0 && !known.contains(&spec.prerequisite) {
                    warnings.push(ConfigWarning::warning(format!(
                        "{class} objective {} depends on {} which no table lists",
                        spec.objective, spec.prerequisite
                    )));
                }
                if spec.deliverable != 0 && spec.deliverable_count == 0 {
                    warnings.push(ConfigWarning::warning(format!(
                        "{class} objective {} names deliverable {} with count 0",
                        spec.objective, spec.deliverable
                    )));
                }
            }
        }

        for class in self.unlockable_classes() {
            if !self.grinds.iter().any(|g| g.class == class) {
                warnings.push(ConfigWarning::warning(format!(
                    "{class} can be unlocked but has no grind entries"
                )));
            }
        }
        warnings
    }

    pub fn unlocks(&self) -> &[UnlockSpec] {
        &self.unlocks
    }

    pub fn unlock_for(&self, class: ClassJob) -> Option<&UnlockSpec> {
        self.unlocks.iter().find(|u| u.class == class)
    }

    /// Classes with an unlock spec, in table order.
    pub fn unlockable_classes(&self) -> Vec<ClassJob> {
        self.unlocks.iter().map(|u| u.class).collect()
    }

    /// Every class the tables mention.
    pub fn classes(&self) -> Vec<ClassJob> {
        ClassJob::all()
            .iter()
            .copied()
            .filter(|c| {
                self.unlock_for(*c).is_some()
                    || self.grinds.iter().any(|g| g.class == *c)
                    || self.objectives.contains_key(c)
            })
            .collect()
    }

    pub fn grinds_for(&self, class: ClassJob) -> Vec<&GrindSpec> {
        self.grinds.iter().filter(|g| g.class == class).collect()
    }

    pub fn best_grind(&self, class: ClassJob, level: u32) -> Option<&GrindSpec> {
        let specs = self.grinds_for(class);
        select_best_grind(&specs, level).map(|i| specs[i])
    }

    pub fn objectives_for(&self, class: ClassJob) -> &[ObjectiveSpec] {
        self.objectives
            .get(&class)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// First eligible objective in table order.
    pub fn next_objective(
        &self,
        class: ClassJob,
        level: u32,
        ledger: &dyn QuestLedger,
    ) -> Option<&ObjectiveSpec> {
        self.objectives_for(class)
            .iter()
            .find(|o| o.is_eligible(level, ledger))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Default)]
    struct Ledger {
        held: HashSet<ObjectiveId>,
        completed: HashSet<ObjectiveId>,
    }

    impl QuestLedger for Ledger {
        fn has_objective(&self, id: ObjectiveId) -> bool {
            self.held.contains(&id)
        }
        fn is_objective_completed(&self, id: ObjectiveId) -> bool {
            self.completed.contains(&id)
        }
        fn objective_step(&self, _id: ObjectiveId) -> u32 {
            0
        }
    }

    fn grind(class: ClassJob, min_level: u32, item: ItemId) -> GrindSpec {
        GrindSpec {
            class,
            min_level,
            item,
            amount: 10,
        }
    }

    fn objective(id: ObjectiveId, prerequisite: ObjectiveId, required_level: u32) -> ObjectiveSpec {
        ObjectiveSpec {
            objective: id,
            prerequisite,
            required_level,
            actor: 1000,
            zone: 132,
            location: Position::default(),
            deliverable: 0,
            deliverable_count: 0,
        }
    }

    fn miner_tables() -> ProgressionTables {
        let mut objectives = BTreeMap::new();
        objectives.insert(
            ClassJob::Miner,
            vec![objective(10, 0, 1), objective(11, 10, 5), objective(12, 0, 10)],
        );
        ProgressionTables::new(
            vec![],
            vec![
                grind(ClassJob::Miner, 1, 100),
                grind(ClassJob::Miner, 5, 200),
                grind(ClassJob::Miner, 10, 300),
            ],
            objectives,
        )
        .unwrap()
    }

    #[test]
    fn grind_selection_picks_highest_qualifying_threshold() {
        let tables = miner_tables();
        assert_eq!(tables.best_grind(ClassJob::Miner, 7).unwrap().item, 200);
        assert_eq!(tables.best_grind(ClassJob::Miner, 5).unwrap().item, 200);
        assert_eq!(tables.best_grind(ClassJob::Miner, 1).unwrap().item, 100);
        assert_eq!(tables.best_grind(ClassJob::Miner, 90).unwrap().item, 300);
    }

    #[test]
    fn grind_selection_below_all_thresholds_is_none() {
        let tables = miner_tables();
        assert!(tables.best_grind(ClassJob::Miner, 0).is_none());
        assert!(tables.best_grind(ClassJob::Botanist, 50).is_none());
    }

    #[test]
    fn thresholds_must_strictly_increase() {
        let err = ProgressionTables::new(
            vec![],
            vec![grind(ClassJob::Miner, 5, 1), grind(ClassJob::Miner, 5, 2)],
            BTreeMap::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("strictly increase"));
    }

    #[test]
    fn duplicate_unlock_spec_is_rejected() {
        let spec = UnlockSpec {
            class: ClassJob::Weaver,
            zone: 131,
            prereq_objective: 1,
            unlock_objective: 2,
            pickup_actor: 3,
            pickup_location: Position::default(),
            turn_in_actor: 4,
            turn_in_location: Position::default(),
        };
        let err = ProgressionTables::new(vec![spec.clone(), spec], vec![], BTreeMap::new())
            .unwrap_err();
        assert!(err.to_string().contains("duplicate unlock spec"));
    }

    #[test]
    fn eligibility_requires_level_prerequisite_and_fresh_objective() {
        let tables = miner_tables();
        let mut ledger = Ledger::default();

        assert_eq!(tables.next_objective(ClassJob::Miner, 1, &ledger).unwrap().objective, 10);

        ledger.held.insert(10);
        assert!(tables.next_objective(ClassJob::Miner, 4, &ledger).is_none());

        // prerequisite 10 held but not completed: 11 stays ineligible
        assert!(!tables.objectives_for(ClassJob::Miner)[1].is_eligible(5, &ledger));

        ledger.held.remove(&10);
        ledger.completed.insert(10);
        assert_eq!(tables.next_objective(ClassJob::Miner, 5, &ledger).unwrap().objective, 11);
    }

    #[test]
    fn yaml_roundtrip_and_warnings() {
        let yaml = r#"
unlocks:
  - class: miner
    zone: 131
    prereq_objective: 65720
    unlock_objective: 65721
    pickup_actor: 1002298
    pickup_location: { x: 1.0, y: 2.0, z: 3.0 }
    turn_in_actor: 1002298
    turn_in_location: { x: 1.0, y: 2.0, z: 3.0 }
grinds:
  - { class: miner, min_level: 1, item: 5106, amount: 20 }
objectives:
  miner:
    - { objective: 65722, prerequisite: 99999, required_level: 5, actor: 1, zone: 131,
        location: { x: 0.0, y: 0.0, z: 0.0 }, deliverable: 5106, deliverable_count: 0 }
"#;
        let tables = ProgressionTables::from_yaml_str(yaml).unwrap();
        assert_eq!(tables.unlockable_classes(), vec![ClassJob::Miner]);
        assert_eq!(tables.classes(), vec![ClassJob::Miner]);
        let warnings = tables.warnings();
        assert_eq!(warnings.len(), 2);

        let again = ProgressionTables::from_yaml_str(&tables.to_yaml().unwrap()).unwrap();
        assert_eq!(again.unlocks(), tables.unlocks());
    }

    // ---- generated tables ---------------------------------------------------

    fn objectives_strategy() -> impl Strategy<Value = Vec<ObjectiveSpec>> {
        proptest::collection::btree_set(1u32..20, 0..8).prop_flat_map(|ids| {
            let n = ids.len();
            (
                Just(ids),
                proptest::collection::vec((0u32..20, 0u32..50), n),
            )
                .prop_map(|(ids, attrs)| {
                    ids.into_iter()
                        .zip(attrs)
                        .map(|(id, (prereq, level))| objective(id, prereq, level))
                        .collect()
                })
        })
    }

    proptest! {
        #[test]
        fn grind_selection_is_maximal(
            thresholds in proptest::collection::btree_set(0u32..100, 1..8),
            level in 0u32..120,
        ) {
            let grinds: Vec<GrindSpec> = thresholds
                .iter()
                .map(|&t| grind(ClassJob::Miner, t, 1000 + t))
                .collect();
            let tables = ProgressionTables::new(vec![], grinds, BTreeMap::new()).unwrap();

            let expected = thresholds.iter().copied().filter(|&t| t <= level).max();
            let picked = tables.best_grind(ClassJob::Miner, level);
            prop_assert_eq!(picked.map(|g| g.min_level), expected);
            if let Some(g) = picked {
                prop_assert_eq!(g.item, 1000 + g.min_level);
            }
        }

        #[test]
        fn eligibility_is_monotonic_in_level(
            specs in objectives_strategy(),
            held in proptest::collection::hash_set(1u32..20, 0..6),
            completed in proptest::collection::hash_set(1u32..20, 0..6),
            level in 0u32..60,
            gain in 0u32..30,
        ) {
            let ledger = Ledger { held, completed };
            for spec in &specs {
                if spec.is_eligible(level, &ledger) {
                    prop_assert!(
                        spec.is_eligible(level + gain, &ledger),
                        "objective {} eligible at {} but not at {}",
                        spec.objective, level, level + gain
                    );
                }
            }

            let mut objectives = BTreeMap::new();
            objectives.insert(ClassJob::Miner, specs);
            let tables = ProgressionTables::new(vec![], vec![], objectives).unwrap();
            if tables.next_objective(ClassJob::Miner, level, &ledger).is_some() {
                prop_assert!(tables.next_objective(ClassJob::Miner, level + gain, &ledger).is_some());
            }
        }
    }
}
