use anyhow::Context;
use sprint_core::{
    config::{BoardConfig, SprintConfig},
    io, paths,
};
use std::path::Path;

const GITIGNORE: &str = "session.yaml\n";

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing sprint in: {}", root.display());

    for dir in [paths::SPRINT_DIR, paths::REPORTS_DIR] {
        let p = root.join(dir);
        std::fs::create_dir_all(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    if paths::board_path(root).exists() {
        println!("  exists:  {}", paths::BOARD_FILE);
    } else {
        BoardConfig::template()
            .save(root)
            .context("failed to write board.yaml")?;
        println!("  created: {}", paths::BOARD_FILE);
    }

    if paths::sprints_path(root).exists() {
        println!("  exists:  {}", paths::SPRINTS_FILE);
    } else {
        SprintConfig::template()
            .save(root)
            .context("failed to write sprints.yaml")?;
        println!("  created: {}", paths::SPRINTS_FILE);
    }

    io::write_if_missing(
        &paths::sprint_dir(root).join(".gitignore"),
        GITIGNORE.as_bytes(),
    )?;

    println!("\nFill in the project ids in {}, then:", paths::BOARD_FILE);
    println!("  sprint config validate");
    println!("  sprint status 1");
    Ok(())
}
