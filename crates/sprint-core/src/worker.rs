use crate::error::Result;
use crate::validation::run_shell;
use serde::Serialize;
use std::path::PathBuf;

/// What the lifecycle controller knows about the task it is driving.
#[derive(Debug, Clone, Serialize)]
pub struct WorkItem<'a> {
    pub issue: u64,
    pub task: &'a str,
    pub title: &'a str,
    pub item: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum WorkResult {
    Completed,
    /// Work happens elsewhere (a person, an agent session); come back later.
    Pending,
    Failed { reason: String },
}

/// Performs the unit of work behind one checklist item.
pub trait TaskWorker {
    fn perform(&mut self, work: &WorkItem<'_>) -> Result<WorkResult>;
}

/// Leaves every item to someone outside the engine, who checks items off
/// with `sprint checklist check`.
#[derive(Debug, Default)]
pub struct ManualWorker;

impl TaskWorker for ManualWorker {
    fn perform(&mut self, _work: &WorkItem<'_>) -> Result<WorkResult> {
        Ok(WorkResult::Pending)
    }
}

/// Runs `work_command` once per item with `SPRINT_ISSUE`, `SPRINT_TASK`,
/// `SPRINT_TITLE` and `SPRINT_ITEM` in the environment.
pub struct ShellWorker {
    cwd: PathBuf,
    command: String,
}

impl ShellWorker {
    pub fn new(cwd: impl Into<PathBuf>, command: impl Into<String>) -> Self {
        Self {
            cwd: cwd.into(),
            command: command.into(),
        }
    }
}

impl TaskWorker for ShellWorker {
    fn perform(&mut self, work: &WorkItem<'_>) -> Result<WorkResult> {
        let env = [
            ("SPRINT_ISSUE", work.issue.to_string()),
            ("SPRINT_TASK", work.task.to_string()),
            ("SPRINT_TITLE", work.title.to_string()),
            ("SPRINT_ITEM", work.item.to_string()),
        ];
        let (passed, output) = run_shell(&self.command, &self.cwd, &env, None);
        if passed {
            Ok(WorkResult::Completed)
        } else {
            Ok(WorkResult::Failed { reason: output })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> WorkItem<'static> {
        WorkItem {
            issue: 35,
            task: "Sprint1.2",
            title: "Sprint1.2: Auth form",
            item: "Create directory structure",
        }
    }

    #[test]
    fn manual_worker_is_always_pending() {
        assert_eq!(ManualWorker.perform(&item()).unwrap(), WorkResult::Pending);
    }

    #[test]
    fn shell_worker_sees_item_env() {
        let mut w = ShellWorker::new("/tmp", "test \"$SPRINT_ITEM\" = 'Create directory structure'");
        assert_eq!(w.perform(&item()).unwrap(), WorkResult::Completed);
    }

    #[test]
    fn shell_worker_failure_carries_output() {
        let mut w = ShellWorker::new("/tmp", "echo 'agent crashed'; exit 3");
        assert_eq!(
            w.perform(&item()).unwrap(),
            WorkResult::Failed {
                reason: "agent crashed".to_string()
            }
        );
    }
}
