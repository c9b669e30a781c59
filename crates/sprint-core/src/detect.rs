//! Sprint state detection.
//!
//! Builds a [`Snapshot`] of every task in a sprint straight from the tracker.
//! The snapshot is never stored; it is recomputed on every sprint start and
//! on every `verify`, which is what lets a run resume after a crash or after
//! someone edits issues by hand.

use crate::config::{SprintConfig, SprintDef};
use crate::error::Result;
use crate::store::{IssueState, IssueStore};
use crate::types::{BoardStatus, Progress, TaskId};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use tracing::debug;

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Done,
    InProgress,
    NotStarted,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Done => "done",
            Category::InProgress => "in_progress",
            Category::NotStarted => "not_started",
        }
    }
}

/// Classify one task from its raw board label and checklist progress.
///
/// `Review` with every item checked counts as done even though a human has
/// not moved the card yet; `Review` with items left is still in progress.
/// Labels the engine does not know (a custom `Blocked` column, say) count as
/// in progress.
pub fn classify(status: Option<&str>, progress: Progress) -> Category {
    let label = status.map(str::trim).filter(|s| !s.is_empty());
    let Some(label) = label else {
        return Category::NotStarted;
    };
    match BoardStatus::from_label(label) {
        Some(BoardStatus::Todo) => Category::NotStarted,
        Some(BoardStatus::Done) => Category::Done,
        Some(BoardStatus::Review) if progress.unchecked() == 0 => Category::Done,
        Some(BoardStatus::Review | BoardStatus::InProgress | BoardStatus::Testing) => {
            Category::InProgress
        }
        None => Category::InProgress,
    }
}

fn is_untouched_status(status: Option<&str>) -> bool {
    match status.map(str::trim).filter(|s| !s.is_empty()) {
        None => true,
        Some(label) => BoardStatus::from_label(label) == Some(BoardStatus::Todo),
    }
}

// ---------------------------------------------------------------------------
// TaskView / Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    pub issue: u64,
    pub task_id: Option<TaskId>,
    pub title: String,
    /// Raw board label; `None` when the issue is not on the board.
    pub status: Option<String>,
    pub progress: Progress,
    pub unchecked: Vec<String>,
    pub category: Category,
    pub is_gate: bool,
    pub closed: bool,
    pub url: String,
}

impl TaskView {
    /// `Sprint<N>.<id>` when the title carries one, else `#<issue>`.
    pub fn label(&self) -> String {
        self.task_id
            .as_ref()
            .map(|t| t.to_string())
            .unwrap_or_else(|| format!("#{}", self.issue))
    }

    pub fn board_status(&self) -> Option<BoardStatus> {
        self.status.as_deref().and_then(BoardStatus::from_label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub sprint: u32,
    pub name: String,
    pub milestone: u64,
    pub tasks: Vec<TaskView>,
    /// First in-progress task in tracker order.
    pub current: Option<u64>,
    pub has_progress: bool,
}

impl Snapshot {
    fn in_category(&self, category: Category) -> Vec<&TaskView> {
        self.tasks.iter().filter(|t| t.category == category).collect()
    }

    pub fn done(&self) -> Vec<&TaskView> {
        self.in_category(Category::Done)
    }

    pub fn in_progress(&self) -> Vec<&TaskView> {
        self.in_category(Category::InProgress)
    }

    pub fn not_started(&self) -> Vec<&TaskView> {
        self.in_category(Category::NotStarted)
    }

    /// Done tasks that still carry unchecked items.
    pub fn incomplete(&self) -> Vec<&TaskView> {
        self.tasks
            .iter()
            .filter(|t| t.category == Category::Done && t.progress.unchecked() > 0)
            .collect()
    }

    pub fn task(&self, issue: u64) -> Option<&TaskView> {
        self.tasks.iter().find(|t| t.issue == issue)
    }

    pub fn current_task(&self) -> Option<&TaskView> {
        self.current.and_then(|n| self.task(n))
    }

    pub fn gate(&self) -> Option<&TaskView> {
        self.tasks.iter().find(|t| t.is_gate)
    }

    /// Work tasks (everything but the gate), tracker order.
    pub fn work_tasks(&self) -> impl Iterator<Item = &TaskView> {
        self.tasks.iter().filter(|t| !t.is_gate)
    }

    /// Work tasks not yet done, tracker order.
    pub fn pending_work(&self) -> Vec<&TaskView> {
        self.work_tasks()
            .filter(|t| t.category != Category::Done)
            .collect()
    }

    pub fn next_not_started(&self) -> Option<&TaskView> {
        self.work_tasks()
            .find(|t| t.category == Category::NotStarted)
    }

    /// The gate opens once every other task's checklist is fully checked.
    pub fn gate_eligible(&self) -> bool {
        self.work_tasks().all(|t| t.progress.is_complete())
    }

    /// Work tasks that keep the gate closed.
    pub fn gate_blockers(&self) -> Vec<&TaskView> {
        self.work_tasks()
            .filter(|t| !t.progress.is_complete())
            .collect()
    }

    pub fn work_done_count(&self) -> usize {
        self.work_tasks()
            .filter(|t| t.category == Category::Done)
            .count()
    }
}

// ---------------------------------------------------------------------------
// SprintDetector
// ---------------------------------------------------------------------------

static GATE_RE: OnceLock<Regex> = OnceLock::new();

fn gate_re() -> &'static Regex {
    GATE_RE.get_or_init(|| Regex::new(r"(?i)\bgate\b").unwrap())
}

fn is_gate(def: &SprintDef, issue: u64, title: &str) -> bool {
    match def.gate {
        Some(gate) => gate == issue,
        None => gate_re().is_match(title),
    }
}

pub struct SprintDetector<'a, S: IssueStore + ?Sized> {
    store: &'a S,
    config: &'a SprintConfig,
}

impl<'a, S: IssueStore + ?Sized> SprintDetector<'a, S> {
    pub fn new(store: &'a S, config: &'a SprintConfig) -> Self {
        Self { store, config }
    }

    pub fn detect(&self, sprint: u32) -> Result<Snapshot> {
        let def = self.config.sprint(sprint)?;
        let milestone = self.store.resolve_milestone(&def.milestone)?;
        let issues = self.store.list_by_milestone(milestone)?;

        let mut tasks = Vec::with_capacity(issues.len());
        for issue in issues {
            let checklist = issue.checklist();
            let progress = checklist.progress();
            let status = self.store.board_status(issue.number)?;
            let category = classify(status.as_deref(), progress);
            tasks.push(TaskView {
                issue: issue.number,
                task_id: issue.task_id(),
                is_gate: is_gate(def, issue.number, &issue.title),
                closed: issue.state == IssueState::Closed,
                url: self.store.issue_url(issue.number),
                unchecked: checklist.unchecked(),
                title: issue.title,
                status,
                progress,
                category,
            });
        }

        let current = tasks
            .iter()
            .find(|t| t.category == Category::InProgress)
            .map(|t| t.issue);
        let has_progress = tasks
            .iter()
            .any(|t| t.progress.checked > 0 || !is_untouched_status(t.status.as_deref()));

        debug!(
            sprint,
            milestone,
            tasks = tasks.len(),
            ?current,
            has_progress,
            "sprint state detected"
        );

        Ok(Snapshot {
            sprint,
            name: def.name.clone(),
            milestone,
            tasks,
            current,
            has_progress,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
