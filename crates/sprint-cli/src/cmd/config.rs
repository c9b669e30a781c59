use crate::output::print_json;
use crate::tracker;
use anyhow::Context;
use clap::Subcommand;
use sprint_core::config::{BoardConfig, ConfigWarning, WarnLevel};
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Validate board.yaml and sprints.yaml for common mistakes
    Validate,
}

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Validate => validate(root, json),
    }
}

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let board = BoardConfig::load(root).context("failed to load board config")?;
    let sprints = tracker::load_sprints(root)?;

    let mut warnings: Vec<(&str, ConfigWarning)> = Vec::new();
    warnings.extend(board.validate().into_iter().map(|w| ("board", w)));
    warnings.extend(sprints.validate().into_iter().map(|w| ("sprints", w)));

    if json {
        let value = serde_json::json!({
            "warnings": warnings
                .iter()
                .map(|(file, w)| serde_json::json!({ "file": file, "level": w.level, "message": w.message }))
                .collect::<Vec<_>>(),
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for (file, w) in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {file}: {}", w.message);
        }
    }

    if warnings.iter().any(|(_, w)| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
