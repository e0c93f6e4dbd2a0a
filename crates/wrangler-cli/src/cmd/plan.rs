use crate::output::{print_json, print_table};
use anyhow::Context;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use wrangler_core::tables::{GrindSpec, ObjectiveSpec, ProgressionTables, UnlockSpec};
use wrangler_core::types::ObjectiveId;
use wrangler_core::world::QuestLedger;
use wrangler_core::ClassJob;

/// Offline journal: a fixed set of completed objectives, nothing held.
struct CompletedSet(HashSet<ObjectiveId>);

impl QuestLedger for CompletedSet {
    fn has_objective(&self, _id: ObjectiveId) -> bool {
        false
    }

    fn is_objective_completed(&self, id: ObjectiveId) -> bool {
        self.0.contains(&id)
    }

    fn objective_step(&self, _id: ObjectiveId) -> u32 {
        0
    }
}

#[derive(Serialize)]
struct Plan<'a> {
    class: ClassJob,
    level: u32,
    target_level: u32,
    unlock: Option<&'a UnlockSpec>,
    grind: Option<&'a GrindSpec>,
    next_objective: Option<&'a ObjectiveSpec>,
    eligible_objectives: Vec<&'a ObjectiveSpec>,
}

pub fn run(
    config_path: &Path,
    tables_path: &Path,
    class: &str,
    level: u32,
    completed: &[u32],
    json: bool,
) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let tables = ProgressionTables::load(tables_path)
        .with_context(|| format!("failed to load tables from {}", tables_path.display()))?;
    let class: ClassJob = class.parse()?;
    let ledger = CompletedSet(completed.iter().copied().collect());

    let target_level = if class.is_gatherer() {
        config.progression.gatherer_target_level
    } else {
        config.progression.crafter_target_level
    };
    let eligible: Vec<&ObjectiveSpec> = tables
        .objectives_for(class)
        .iter()
        .filter(|o| o.is_eligible(level, &ledger))
        .collect();
    let plan = Plan {
        class,
        level,
        target_level,
        unlock: tables.unlock_for(class),
        grind: tables.best_grind(class, level),
        next_objective: eligible.first().copied(),
        eligible_objectives: eligible,
    };

    if json {
        return print_json(&plan);
    }

    println!("{class} at level {level} (target {target_level})");
    if level >= target_level {
        println!("Target already reached; the leveling loop would not run.");
    }
    match plan.grind {
        Some(g) => println!(
            "Grind: item {} x{} (entry for level {}+)",
            g.item, g.amount, g.min_level
        ),
        None => println!("Grind: none applies at this level"),
    }
    if plan.eligible_objectives.is_empty() {
        println!("Objectives: none eligible");
    } else {
        println!();
        let rows = plan
            .eligible_objectives
            .iter()
            .map(|o| {
                vec![
                    o.objective.to_string(),
                    o.required_level.to_string(),
                    o.actor.to_string(),
                    o.zone.to_string(),
                    if o.has_deliverable() {
                        format!("{} x{}", o.deliverable, o.deliverable_count)
                    } else {
                        "-".into()
                    },
                ]
            })
            .collect();
        print_table(&["OBJECTIVE", "LEVEL", "ACTOR", "ZONE", "DELIVER"], rows);
    }
    if plan.grind.is_none() && plan.next_objective.is_none() && level < target_level {
        println!();
        println!("No progress possible: the loop would stop immediately.");
    }
    Ok(())
}
