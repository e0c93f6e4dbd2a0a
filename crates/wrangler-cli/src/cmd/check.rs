use crate::output::{print_json, print_table};
use anyhow::Context;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use wrangler_core::config::InterpreterConfig;
use wrangler_core::program::{load_program, Diagnostic, Program};

#[derive(Serialize)]
struct ProgramReport {
    path: String,
    name: Option<String>,
    depth: usize,
    steps: usize,
    tags: BTreeMap<String, usize>,
    diagnostics: Vec<Diagnostic>,
    error: Option<String>,
}

pub fn run(path: &Path, follow: bool, json: bool) -> anyhow::Result<()> {
    let program =
        load_program(path).with_context(|| format!("failed to load {}", path.display()))?;

    let mut reports = vec![report(path, 0, &program)];
    if follow {
        let limit = InterpreterConfig::default().max_include_depth;
        let mut seen = HashSet::new();
        seen.insert(path.to_path_buf());
        walk_includes(&program, 1, limit, &mut seen, &mut reports);
    }

    if json {
        print_json(&reports)?;
    } else {
        print_human(&reports);
    }

    let broken = reports.iter().filter(|r| r.error.is_some()).count();
    if broken > 0 {
        anyhow::bail!("{broken} included program(s) failed to load");
    }
    Ok(())
}

fn report(path: &Path, depth: usize, program: &Program) -> ProgramReport {
    ProgramReport {
        path: path.display().to_string(),
        name: program.name.clone(),
        depth,
        steps: program.steps.len(),
        tags: program.tag_counts(),
        diagnostics: program.diagnostics(),
        error: None,
    }
}

fn walk_includes(
    program: &Program,
    depth: usize,
    limit: usize,
    seen: &mut HashSet<PathBuf>,
    out: &mut Vec<ProgramReport>,
) {
    for include in program.includes() {
        if !seen.insert(include.clone()) {
            continue;
        }
        if depth > limit {
            out.push(failed(&include, depth, format!("include depth exceeds {limit}")));
            continue;
        }
        match load_program(&include) {
            Ok(child) => {
                out.push(report(&include, depth, &child));
                walk_includes(&child, depth + 1, limit, seen, out);
            }
            Err(e) => out.push(failed(&include, depth, e.to_string())),
        }
    }
}

fn failed(path: &Path, depth: usize, error: String) -> ProgramReport {
    ProgramReport {
        path: path.display().to_string(),
        name: None,
        depth,
        steps: 0,
        tags: BTreeMap::new(),
        diagnostics: Vec::new(),
        error: Some(error),
    }
}

fn print_human(reports: &[ProgramReport]) {
    for r in reports {
        let indent = "  ".repeat(r.depth);
        if let Some(err) = &r.error {
            println!("{indent}{}: error: {err}", r.path);
            continue;
        }
        let name = r.name.as_deref().unwrap_or("(unnamed)");
        println!("{indent}{} [{name}]: {} top-level steps", r.path, r.steps);
        if r.depth == 0 && !r.tags.is_empty() {
            println!();
            let rows = r
                .tags
                .iter()
                .map(|(tag, n)| vec![tag.clone(), n.to_string()])
                .collect();
            print_table(&["TAG", "COUNT"], rows);
            println!();
        }
        for d in &r.diagnostics {
            println!("{indent}  line {}: <{}> {}", d.line, d.tag, d.message);
        }
    }
}
