//! Step programs: declarative markup describing what to do, in order.

mod entity;
mod interpreter;
mod markup;
mod node;
mod step;

pub use entity::expand_entities;
pub use interpreter::{RunReport, StepInterpreter};
pub use markup::{decode_text, parse_markup};
pub use node::StepNode;
pub use step::Step;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;
use crate::predicate::parse_condition;

/// A parsed program. Sub-programs referenced by `LoadProfile` are not loaded
/// until they run.
#[derive(Debug, Clone)]
pub struct Program {
    pub name: Option<String>,
    pub path: Option<PathBuf>,
    /// Directory relative sub-program paths resolve against.
    pub base_dir: PathBuf,
    pub root: StepNode,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub line: usize,
    pub tag: String,
    pub message: String,
}

pub fn load_program(path: &Path) -> Result<Program> {
    let text = std::fs::read_to_string(path)?;
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let mut program = parse_program(&text, &path.display().to_string(), base_dir)?;
    program.path = Some(path.to_path_buf());
    Ok(program)
}

pub fn parse_program(text: &str, source_name: &str, base_dir: PathBuf) -> Result<Program> {
    let expanded = expand_entities(text, source_name)?;
    let root = parse_markup(&expanded, source_name)?;
    let steps = Step::program_body(&root);
    let name = steps.iter().find_map(|s| match s {
        Step::Name(n) if !n.is_empty() => Some(n.clone()),
        _ => None,
    });
    Ok(Program {
        name,
        path: None,
        base_dir,
        root,
        steps,
    })
}

impl Program {
    /// Unknown tags, malformed leaves and conditions that will fall back to
    /// `true` at run time.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        for node in &self.root.children {
            lint(node, &mut out);
        }
        out
    }

    /// How many elements of each tag the program contains, root excluded.
    pub fn tag_counts(&self) -> BTreeMap<String, usize> {
        fn walk(node: &StepNode, counts: &mut BTreeMap<String, usize>) {
            *counts.entry(node.tag.clone()).or_insert(0) += 1;
            node.children.iter().for_each(|c| walk(c, counts));
        }
        let mut counts = BTreeMap::new();
        self.root.children.iter().for_each(|c| walk(c, &mut counts));
        counts
    }

    /// Relative `LoadProfile` paths, in document order.
    pub fn includes(&self) -> Vec<PathBuf> {
        fn walk(steps: &[Step], base: &Path, out: &mut Vec<PathBuf>) {
            for step in steps {
                if let Step::LoadProfile { path } = step {
                    out.push(base.join(path));
                }
                walk(step.children(), base, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.steps, &self.base_dir, &mut out);
        out
    }
}

fn lint(node: &StepNode, out: &mut Vec<Diagnostic>) {
    let diag = |message: String| Diagnostic {
        line: node.line,
        tag: node.tag.clone(),
        message,
    };
    match Step::from_node(node) {
        Step::Unknown { .. } => out.push(diag("unknown tag, will be skipped".into())),
        Step::Invalid { reason, .. } => out.push(diag(reason)),
        Step::If { condition, .. } | Step::While { condition, .. } => {
            for unknown in parse_condition(&condition).unknowns() {
                out.push(diag(format!(
                    "unrecognized condition '{unknown}' evaluates to true"
                )));
            }
        }
        Step::Craft { json } => {
            if let Err(e) = crate::crafting::OrderBatch::from_json(&json) {
                out.push(diag(format!("order JSON does not parse: {e}")));
            }
        }
        _ => {}
    }
    for child in &node.children {
        lint(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<!DOCTYPE Profile [ <!ENTITY Ore "5106"> ]>
<Profile>
  <Name>Copper run</Name>
  <Order>
    <While Condition="not NqHasAtLeast(&Ore;, 20) and Mystery()">
      <Craft Json='{"Item": &Ore;, "Amount": 20, "Type": "Gather"}'/>
    </While>
    <Sparkle/>
    <Craft Json="{broken"/>
    <LoadProfile Path="sub/next.xml"/>
  </Order>
</Profile>"#;

    #[test]
    fn parse_program_collects_name_and_steps() {
        let program = parse_program(SAMPLE, "copper.xml", PathBuf::from("/profiles")).unwrap();
        assert_eq!(program.name.as_deref(), Some("Copper run"));
        assert_eq!(program.steps.len(), 2);
        assert_eq!(
            program.includes(),
            vec![PathBuf::from("/profiles/sub/next.xml")]
        );
        let counts = program.tag_counts();
        assert_eq!(counts.get("Craft"), Some(&2));
        assert_eq!(counts.get("Order"), Some(&1));
    }

    #[test]
    fn diagnostics_flag_unknowns_and_bad_json() {
        let program = parse_program(SAMPLE, "copper.xml", PathBuf::new()).unwrap();
        let diags = program.diagnostics();
        let tags: Vec<&str> = diags.iter().map(|d| d.tag.as_str()).collect();
        assert_eq!(tags, vec!["While", "Sparkle", "Craft"]);
        assert!(diags[0].message.contains("Mystery()"));
        assert_eq!(diags[1].line, 9);
    }

    #[test]
    fn bracketed_entity_values_survive_the_doctype() {
        let src = "<!DOCTYPE P [<!ENTITY lvl \"Levels[Miner] &lt; 5\">]>\n\
                   <Profile><If Condition=\"&lvl;\"/><Wait Seconds=\"1e30\"/></Profile>";
        let program = parse_program(src, "p.xml", PathBuf::new()).unwrap();
        match &program.steps[0] {
            Step::If { condition, .. } => assert_eq!(condition, "Levels[Miner] < 5"),
            other => panic!("expected If, got {other:?}"),
        }
        assert!(matches!(program.steps[1], Step::Invalid { .. }));
    }

    #[test]
    fn load_program_resolves_base_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("main.xml");
        std::fs::write(&path, "<Profile><Log Message=\"hi\"/></Profile>").unwrap();
        let program = load_program(&path).unwrap();
        assert_eq!(program.base_dir, dir.path());
        assert_eq!(program.path.as_deref(), Some(path.as_path()));
        assert!(program.name.is_none());
    }
}
