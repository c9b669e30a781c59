use anyhow::Context;
use sprint_core::config::{BoardConfig, SprintConfig};
use sprint_core::github::GitHubStore;
use sprint_core::memory::MemoryStore;
use sprint_core::store::IssueStore;
use sprint_core::validation::ShellValidator;
use sprint_core::worker::{ManualWorker, ShellWorker, TaskWorker};
use std::path::{Path, PathBuf};

/// Points the CLI at a YAML fixture instead of the live tracker.
pub const OFFLINE_ENV: &str = "SPRINT_OFFLINE_STORE";

fn offline_path() -> Option<PathBuf> {
    std::env::var_os(OFFLINE_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Run `f` against the configured tracker.
///
/// With `SPRINT_OFFLINE_STORE` set, the fixture is loaded, handed to `f`, and
/// written back afterwards even when `f` fails, so writes made before the
/// failure persist the same way they would on the real tracker.
pub fn with_store<T>(
    root: &Path,
    f: impl FnOnce(&dyn IssueStore) -> anyhow::Result<T>,
) -> anyhow::Result<T> {
    if let Some(path) = offline_path() {
        let store = MemoryStore::load(&path)
            .with_context(|| format!("failed to load offline store {}", path.display()))?;
        tracing::debug!(path = %path.display(), "using offline store");
        let result = f(&store);
        store
            .save(&path)
            .with_context(|| format!("failed to save offline store {}", path.display()))?;
        return result;
    }

    let board = BoardConfig::load(root).context("failed to load board config")?;
    let store = GitHubStore::from_config(&board)?;
    f(&store)
}

pub fn load_sprints(root: &Path) -> anyhow::Result<SprintConfig> {
    SprintConfig::load(root).context("failed to load sprint config")
}

pub fn validator(root: &Path, config: &SprintConfig) -> ShellValidator {
    ShellValidator::new(root, config.validation.clone())
}

pub fn worker(root: &Path, config: &SprintConfig) -> Box<dyn TaskWorker> {
    match &config.work_command {
        Some(command) if !command.trim().is_empty() => Box::new(ShellWorker::new(root, command)),
        _ => Box::new(ManualWorker),
    }
}
