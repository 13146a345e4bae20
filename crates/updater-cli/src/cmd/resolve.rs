//! Dry run of both resolver passes against a local checkout.

use crate::output::print_json;
use anyhow::Context;
use serde::Serialize;
use std::path::Path;
use updater_core::config::UpdateConfig;
use updater_core::github::ChangeRecord;
use updater_core::resolver::{resolve, Task};

#[derive(Serialize)]
struct DryRun {
    tasks: Vec<Task>,
    errors: Vec<String>,
}

pub fn run(config_path: &Path, dir: &Path, paths: &[String], json: bool) -> anyhow::Result<()> {
    let config = UpdateConfig::load(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    // Target tasks carry absolute paths, as they would inside a real workspace.
    let dir = dir
        .canonicalize()
        .with_context(|| format!("cannot open checkout {}", dir.display()))?;

    let changes: Vec<ChangeRecord> = paths.iter().map(ChangeRecord::new).collect();
    let (tasks, errors) = resolve(&config, &changes, &dir);

    if json {
        return print_json(&DryRun {
            tasks,
            errors: errors.iter().map(ToString::to_string).collect(),
        });
    }

    if tasks.is_empty() && errors.is_empty() {
        println!("Nothing to do.");
        return Ok(());
    }
    for task in &tasks {
        println!("$ {task}");
    }
    for err in &errors {
        println!("[error] {err}");
    }
    Ok(())
}
