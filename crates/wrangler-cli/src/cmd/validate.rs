use crate::output::print_json;
use serde::Serialize;
use std::path::Path;
use wrangler_core::config::{ConfigWarning, WarnLevel};
use wrangler_core::tables::ProgressionTables;

#[derive(Serialize)]
struct ValidationReport {
    warnings: Vec<ConfigWarning>,
}

pub fn run(config_path: &Path, tables: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let mut warnings = config.validate();

    if let Some(path) = tables {
        // Structural errors come back from load; the rest are advisory.
        match ProgressionTables::load(path) {
            Ok(t) => warnings.extend(t.warnings()),
            Err(e) => warnings.push(ConfigWarning::error(format!(
                "tables {}: {e}",
                path.display()
            ))),
        }
    }

    let has_errors = warnings.iter().any(|w| w.level == WarnLevel::Error);

    if json {
        print_json(&ValidationReport { warnings })?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            println!("[{}] {}", super::level_label(&w.level), w.message);
        }
    }

    if has_errors {
        anyhow::bail!("validation failed");
    }
    Ok(())
}
