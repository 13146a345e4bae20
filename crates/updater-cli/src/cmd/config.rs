use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use std::path::Path;
use updater_core::config::{UpdateConfig, WarnLevel};

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Validate the config for common mistakes
    Validate {
        /// Output as JSON
        #[arg(long, short = 'j')]
        json: bool,
    },

    /// Print the config as loaded, defaults filled in
    Show {
        /// Output as JSON
        #[arg(long, short = 'j')]
        json: bool,
    },
}

pub fn run(path: &Path, subcmd: ConfigSubcommand) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Validate { json } => validate(path, json),
        ConfigSubcommand::Show { json } => show(path, json),
    }
}

fn load(path: &Path) -> anyhow::Result<UpdateConfig> {
    UpdateConfig::load(path).with_context(|| format!("failed to load {}", path.display()))
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(path: &Path, json: bool) -> anyhow::Result<()> {
    let config = load(path)?;
    let warnings = config.validate();

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!(
            "Config is valid: {} target(s), {} matcher(s).",
            config.targets.len(),
            config.matchers.len()
        );
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config has errors");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(path: &Path, json: bool) -> anyhow::Result<()> {
    let config = load(path)?;
    if json {
        return print_json(&config);
    }

    println!("make:    {}", config.make);
    match config.task_timeout() {
        Some(limit) => println!("timeout: {limit:?} per task"),
        None => println!("timeout: none"),
    }
    println!("targets:");
    for target in &config.targets {
        println!("  {target}");
    }
    println!("matchers:");
    for m in &config.matchers {
        println!("  {} -> {}", m.regex.as_str(), m.target);
    }
    Ok(())
}
