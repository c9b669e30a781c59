//! Single-task lifecycle: `Todo → In Progress → Testing | Validating → Review`.
//!
//! `Review → Done` belongs to a human. The controller reads that transition
//! but has no code path that writes it; [`TaskController::write_status`]
//! rejects `Done` outright.

use crate::checklist;
use crate::error::{Result, SprintError};
use crate::store::IssueStore;
use crate::sync::{ChecklistSync, ToggleOutcome};
use crate::types::{BoardStatus, TaskPhase};
use crate::validation::{ValidationReport, Validator};
use crate::verify::{StatusVerifier, Verification};
use crate::worker::{TaskWorker, WorkItem, WorkResult};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// Status is Review and reads back as Review. A human takes it from here.
    ReadyForReview { issue: u64 },
    /// The human already moved the card to Done.
    AlreadyDone { issue: u64 },
    /// Items remain and the worker left them to someone else.
    AwaitingWork { issue: u64, remaining: Vec<String> },
    WorkFailed {
        issue: u64,
        item: String,
        reason: String,
    },
    /// A completed item could not be found in the body any more.
    Drift { issue: u64, item: String },
    /// The checklist repeats item text, so a toggle could hit the wrong
    /// line. Nothing was started or performed.
    DuplicateItems { issue: u64, items: Vec<String> },
    /// Task stays at Testing | Validating.
    ValidationFailed {
        issue: u64,
        report: ValidationReport,
    },
    StatusMismatch {
        issue: u64,
        expected: BoardStatus,
        actual: Option<String>,
    },
}

pub struct TaskController<'a, S, V, W>
where
    S: IssueStore + ?Sized,
    V: Validator + ?Sized,
    W: TaskWorker + ?Sized,
{
    store: &'a S,
    validator: &'a V,
    worker: &'a mut W,
}

impl<'a, S, V, W> TaskController<'a, S, V, W>
where
    S: IssueStore + ?Sized,
    V: Validator + ?Sized,
    W: TaskWorker + ?Sized,
{
    pub fn new(store: &'a S, validator: &'a V, worker: &'a mut W) -> Self {
        Self {
            store,
            validator,
            worker,
        }
    }

    /// Board column as a lifecycle state. A label the engine does not know
    /// (a custom `Blocked` column) reads as In Progress, the same way the
    /// sprint detector classifies it, so it is never started a second time.
    fn status(&self, issue: u64) -> Result<Option<BoardStatus>> {
        let label = self.store.board_status(issue)?;
        Ok(label
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| BoardStatus::from_label(l).unwrap_or(BoardStatus::InProgress)))
    }

    pub fn phase(&self, issue: u64) -> Result<TaskPhase> {
        Ok(TaskPhase::from_status(self.status(issue)?))
    }

    fn write_status(&self, issue: u64, to: BoardStatus) -> Result<()> {
        if to == BoardStatus::Done {
            return Err(SprintError::IllegalTransition {
                issue,
                to: to.label().to_string(),
                reason: "Review → Done is performed by a human reviewer".to_string(),
            });
        }
        self.store.set_board_status(issue, to)
    }

    /// Todo → In Progress. Posts the start marker only on the real
    /// transition, so repeating it is harmless.
    pub fn start(&self, issue: u64) -> Result<TaskPhase> {
        match self.status(issue)? {
            None | Some(BoardStatus::Todo) => {
                let title = self.store.get_issue(issue)?.title;
                self.write_status(issue, BoardStatus::InProgress)?;
                self.store
                    .comment(issue, &format!("Started: {title}\n\nStatus: In Progress"))?;
                info!(issue, "task started");
                Ok(TaskPhase::InProgress)
            }
            Some(other) => Ok(TaskPhase::from_status(Some(other))),
        }
    }

    /// Work through every unchecked item, checking each one off as soon as
    /// its work completes, then validate and hand the task to review.
    pub fn drive(&mut self, issue: u64) -> Result<TaskOutcome> {
        let status = self.status(issue)?;
        let issue_data = self.store.get_issue(issue)?;
        match status {
            Some(BoardStatus::Done) => return Ok(TaskOutcome::AlreadyDone { issue }),
            Some(BoardStatus::Review) if issue_data.checklist().is_complete() => {
                return Ok(TaskOutcome::ReadyForReview { issue })
            }
            _ => {}
        }

        let items = checklist::duplicates(&issue_data.body);
        if !items.is_empty() {
            warn!(issue, ?items, "checklist repeats item text");
            return Ok(TaskOutcome::DuplicateItems { issue, items });
        }
        if matches!(status, None | Some(BoardStatus::Todo)) {
            self.start(issue)?;
        }

        let task_label = issue_data
            .task_id()
            .map(|t| t.to_string())
            .unwrap_or_else(|| format!("#{issue}"));
        let sync = ChecklistSync::new(self.store);
        let mut last: Option<String> = None;
        loop {
            let remaining = sync.unchecked_items(issue)?;
            let Some(item) = remaining.first().cloned() else {
                break;
            };
            if last.as_deref() == Some(item.as_str()) {
                return Ok(TaskOutcome::Drift { issue, item });
            }

            let work = WorkItem {
                issue,
                task: &task_label,
                title: &issue_data.title,
                item: &item,
            };
            match self.worker.perform(&work)? {
                WorkResult::Completed => {}
                WorkResult::Pending => return Ok(TaskOutcome::AwaitingWork { issue, remaining }),
                WorkResult::Failed { reason } => {
                    return Ok(TaskOutcome::WorkFailed {
                        issue,
                        item,
                        reason,
                    })
                }
            }

            match sync.toggle_item(issue, &item, true)? {
                ToggleOutcome::Applied | ToggleOutcome::Unchanged => {}
                ToggleOutcome::Drift => return Ok(TaskOutcome::Drift { issue, item }),
            }
            last = Some(item);
        }

        self.validate_and_submit(issue)
    }

    /// Re-run validation (or resume unfinished items) after a fix.
    pub fn retry_validation(&mut self, issue: u64) -> Result<TaskOutcome> {
        self.drive(issue)
    }

    fn validate_and_submit(&self, issue: u64) -> Result<TaskOutcome> {
        let status = self.status(issue)?;
        if !matches!(status, Some(BoardStatus::Testing | BoardStatus::Review)) {
            self.write_status(issue, BoardStatus::Testing)?;
        }

        let report = self.validator.validate(issue);
        if let Some(failure) = report.first_failure() {
            self.store.comment(
                issue,
                &format!(
                    "Validation failed: `{}`\n\n```\n{}\n```\n\nReply `retry` after fixing, or `skip <reason>` to override.",
                    failure.command, failure.output
                ),
            )?;
            info!(issue, command = %failure.command, "validation failed");
            return Ok(TaskOutcome::ValidationFailed { issue, report });
        }

        self.submit(issue)
    }

    /// Testing → Review without passing validation. The justification is
    /// recorded on the issue.
    pub fn skip_validation(&self, issue: u64, reason: &str) -> Result<TaskOutcome> {
        if reason.trim().is_empty() {
            return Err(SprintError::ReasonRequired("skip validation"));
        }
        match self.status(issue)? {
            Some(BoardStatus::Testing | BoardStatus::InProgress) => {}
            other => {
                return Err(SprintError::IllegalTransition {
                    issue,
                    to: BoardStatus::Review.label().to_string(),
                    reason: format!(
                        "validation can only be skipped from Testing, task is {}",
                        other.map_or("off the board", |s| s.label())
                    ),
                })
            }
        }
        self.store.comment(
            issue,
            &format!("Validation skipped: {}", reason.trim()),
        )?;
        self.submit(issue)
    }

    fn submit(&self, issue: u64) -> Result<TaskOutcome> {
        let was_review = self.status(issue)? == Some(BoardStatus::Review);
        if !was_review {
            self.write_status(issue, BoardStatus::Review)?;
        }

        match StatusVerifier::new(self.store).verify(issue, BoardStatus::Review)? {
            Verification::Verified => {
                if !was_review {
                    self.store
                        .comment(issue, "Ready for review. Move the card to Done once reviewed.")?;
                    info!(issue, "task ready for review");
                }
                Ok(TaskOutcome::ReadyForReview { issue })
            }
            Verification::Mismatch { actual } => Ok(TaskOutcome::StatusMismatch {
                issue,
                expected: BoardStatus::Review,
                actual,
            }),
        }
    }

    /// Record a block. Board status and checklist progress stay as they are.
    pub fn block(&self, issue: u64, reason: &str) -> Result<TaskPhase> {
        if reason.trim().is_empty() {
            return Err(SprintError::ReasonRequired("block a task"));
        }
        self.store
            .comment(issue, &format!("Blocked: {}", reason.trim()))?;
        info!(issue, reason, "task blocked");
        Ok(TaskPhase::Blocked)
    }

    /// Force the task back to Todo. Checklist marks are left alone.
    pub fn restart(&self, issue: u64) -> Result<TaskPhase> {
        self.write_status(issue, BoardStatus::Todo)?;
        Ok(TaskPhase::Todo)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::validation::CommandResult;
    use crate::worker::ManualWorker;
    use std::cell::Cell;

    pub(crate) struct FixedValidator(pub Cell<bool>);

    impl Validator for FixedValidator {
        fn validate(&self, _issue: u64) -> ValidationReport {
            ValidationReport {
                results: vec![CommandResult {
                    name: "build".to_string(),
                    command: "npm run build".to_string(),
                    passed: self.0.get(),
                    output: if self.0.get() { String::new() } else { "error TS2304".to_string() },
                    duration_ms: 1,
                }],
            }
        }
    }

    struct DoneWorker;

    impl TaskWorker for DoneWorker {
        fn perform(&mut self, _work: &WorkItem<'_>) -> Result<WorkResult> {
            Ok(WorkResult::Completed)
        }
    }

    /// Records the checked count visible in the store when each item starts.
    struct ObservingWorker<'s> {
        store: &'s MemoryStore,
        issue: u64,
        seen: Vec<usize>,
    }

    impl TaskWorker for ObservingWorker<'_> {
        fn perform(&mut self, _work: &WorkItem<'_>) -> Result<WorkResult> {
            let body = self.store.body(self.issue).unwrap_or_default();
            self.seen
                .push(crate::checklist::parse(&body).progress().checked);
            Ok(WorkResult::Completed)
        }
    }

    const BODY: &str = "- [ ] One\n- [ ] Two\n- [ ] Three\n- [ ] Four\n";

    fn store(status: Option<&str>) -> MemoryStore {
        let store = MemoryStore::new();
        store.add_issue(35, "Sprint1.2: Auth form", BODY, 1, status);
        store
    }

    #[test]
    fn drive_runs_to_review() {
        let store = store(Some("Todo"));
        let validator = FixedValidator(Cell::new(true));
        let mut worker = DoneWorker;
        let mut ctl = TaskController::new(&store, &validator, &mut worker);

        let outcome = ctl.drive(35).unwrap();
        assert_eq!(outcome, TaskOutcome::ReadyForReview { issue: 35 });
        assert_eq!(
            store.status_writes(),
            vec![
                (35, BoardStatus::InProgress),
                (35, BoardStatus::Testing),
                (35, BoardStatus::Review),
            ]
        );
        assert!(crate::checklist::parse(&store.body(35).unwrap()).is_complete());
        let comments = store.comments_for(35);
        assert!(comments[0].starts_with("Started"));
        assert!(comments[1].starts_with("Ready for review"));
    }

    #[test]
    fn progress_is_visible_before_each_item() {
        let store = store(Some("In Progress"));
        let validator = FixedValidator(Cell::new(true));
        let mut worker = ObservingWorker {
            store: &store,
            issue: 35,
            seen: Vec::new(),
        };
        TaskController::new(&store, &validator, &mut worker)
            .drive(35)
            .unwrap();
        assert_eq!(worker.seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn resumes_from_partial_progress() {
        let store = MemoryStore::new();
        store.add_issue(35, "Sprint1.2", "- [x] One\n- [x] Two\n- [ ] Three\n", 1, Some("In Progress"));
        let validator = FixedValidator(Cell::new(true));
        let mut worker = ObservingWorker {
            store: &store,
            issue: 35,
            seen: Vec::new(),
        };
        TaskController::new(&store, &validator, &mut worker)
            .drive(35)
            .unwrap();
        assert_eq!(worker.seen, vec![2]);
    }

    #[test]
    fn start_is_idempotent() {
        let store = store(Some("Todo"));
        let validator = FixedValidator(Cell::new(true));
        let mut worker = ManualWorker;
        let ctl = TaskController::new(&store, &validator, &mut worker);
        ctl.start(35).unwrap();
        ctl.start(35).unwrap();
        assert_eq!(store.comments_for(35).len(), 1);
        assert_eq!(store.status_writes().len(), 1);
    }

    #[test]
    fn manual_worker_waits_for_items() {
        let store = store(None);
        let validator = FixedValidator(Cell::new(true));
        let mut worker = ManualWorker;
        let outcome = TaskController::new(&store, &validator, &mut worker)
            .drive(35)
            .unwrap();
        let TaskOutcome::AwaitingWork { remaining, .. } = outcome else {
            panic!("expected AwaitingWork, got {outcome:?}");
        };
        assert_eq!(remaining.len(), 4);
        assert_eq!(store.board_status(35).unwrap().as_deref(), Some("In Progress"));
    }

    #[test]
    fn validation_failure_stays_in_testing() {
        let store = store(Some("In Progress"));
        let validator = FixedValidator(Cell::new(false));
        let mut worker = DoneWorker;
        let mut ctl = TaskController::new(&store, &validator, &mut worker);
        let outcome = ctl.drive(35).unwrap();
        assert!(matches!(outcome, TaskOutcome::ValidationFailed { .. }));
        assert_eq!(
            store.board_status(35).unwrap().as_deref(),
            Some("Testing | Validating")
        );
        assert!(store
            .comments_for(35)
            .iter()
            .any(|c| c.contains("error TS2304")));

        validator.0.set(true);
        assert_eq!(ctl.retry_validation(35).unwrap(), TaskOutcome::ReadyForReview { issue: 35 });
    }

    #[test]
    fn skip_validation_requires_reason_and_records_it() {
        let store = store(Some("Testing | Validating"));
        let validator = FixedValidator(Cell::new(false));
        let mut worker = DoneWorker;
        let ctl = TaskController::new(&store, &validator, &mut worker);
        assert!(matches!(
            ctl.skip_validation(35, " "),
            Err(SprintError::ReasonRequired(_))
        ));
        let outcome = ctl.skip_validation(35, "flaky e2e env").unwrap();
        assert_eq!(outcome, TaskOutcome::ReadyForReview { issue: 35 });
        assert!(store
            .comments_for(35)
            .iter()
            .any(|c| c == "Validation skipped: flaky e2e env"));
    }

    #[test]
    fn done_is_never_written() {
        let store = store(Some("Review"));
        let validator = FixedValidator(Cell::new(true));
        let mut worker = DoneWorker;
        let ctl = TaskController::new(&store, &validator, &mut worker);
        let err = ctl.write_status(35, BoardStatus::Done).unwrap_err();
        assert!(matches!(err, SprintError::IllegalTransition { .. }));
        assert!(store.status_writes().is_empty());
    }

    #[test]
    fn human_done_is_observed() {
        let store = store(Some("Done"));
        let validator = FixedValidator(Cell::new(true));
        let mut worker = DoneWorker;
        let outcome = TaskController::new(&store, &validator, &mut worker)
            .drive(35)
            .unwrap();
        assert_eq!(outcome, TaskOutcome::AlreadyDone { issue: 35 });
        assert!(store.status_writes().is_empty());
    }

    #[test]
    fn block_keeps_progress_and_status() {
        let store = MemoryStore::new();
        store.add_issue(35, "Sprint1.2", "- [x] One\n- [ ] Two\n", 1, Some("In Progress"));
        let validator = FixedValidator(Cell::new(true));
        let mut worker = DoneWorker;
        let ctl = TaskController::new(&store, &validator, &mut worker);
        assert!(ctl.block(35, "").is_err());
        assert_eq!(ctl.block(35, "waiting on API keys").unwrap(), TaskPhase::Blocked);
        assert_eq!(store.body(35).unwrap(), "- [x] One\n- [ ] Two\n");
        assert_eq!(store.board_status(35).unwrap().as_deref(), Some("In Progress"));
        assert_eq!(store.comments_for(35), vec!["Blocked: waiting on API keys"]);
    }

    #[test]
    fn drift_halts_the_task() {
        struct EditingWorker<'s>(&'s MemoryStore);
        impl TaskWorker for EditingWorker<'_> {
            fn perform(&mut self, _work: &WorkItem<'_>) -> Result<WorkResult> {
                self.0.human_set_body(35, "- [ ] Renamed in the UI\n");
                Ok(WorkResult::Completed)
            }
        }
        let store = store(Some("In Progress"));
        let validator = FixedValidator(Cell::new(true));
        let mut worker = EditingWorker(&store);
        let outcome = TaskController::new(&store, &validator, &mut worker)
            .drive(35)
            .unwrap();
        assert_eq!(
            outcome,
            TaskOutcome::Drift {
                issue: 35,
                item: "One".to_string()
            }
        );
        assert_eq!(store.body(35).unwrap(), "- [ ] Renamed in the UI\n");
    }

    #[test]
    fn duplicate_items_stop_before_any_work() {
        struct CountingWorker(usize);
        impl TaskWorker for CountingWorker {
            fn perform(&mut self, _work: &WorkItem<'_>) -> Result<WorkResult> {
                self.0 += 1;
                Ok(WorkResult::Completed)
            }
        }
        let store = MemoryStore::new();
        store.add_issue(40, "Sprint1.4: Tests", "- [ ] Test\n- [ ] Test\n", 1, Some("Todo"));
        let validator = FixedValidator(Cell::new(true));
        let mut worker = CountingWorker(0);
        let outcome = TaskController::new(&store, &validator, &mut worker)
            .drive(40)
            .unwrap();
        assert_eq!(
            outcome,
            TaskOutcome::DuplicateItems {
                issue: 40,
                items: vec!["Test".to_string()]
            }
        );
        assert_eq!(worker.0, 0);
        assert!(store.status_writes().is_empty());
        assert!(store.comments_for(40).is_empty());
        assert_eq!(store.body(40).unwrap(), "- [ ] Test\n- [ ] Test\n");
    }

    #[test]
    fn unknown_board_column_is_not_restarted() {
        let store = MemoryStore::new();
        store.add_issue(35, "Sprint1.2", "- [x] One\n- [ ] Two\n", 1, Some("Blocked"));
        let validator = FixedValidator(Cell::new(true));
        let mut worker = ManualWorker;
        let mut ctl = TaskController::new(&store, &validator, &mut worker);
        assert_eq!(ctl.start(35).unwrap(), TaskPhase::InProgress);
        let outcome = ctl.drive(35).unwrap();
        assert!(matches!(outcome, TaskOutcome::AwaitingWork { .. }));
        assert!(store.status_writes().is_empty());
        assert!(store.comments_for(35).is_empty());
        assert_eq!(store.board_status(35).unwrap().as_deref(), Some("Blocked"));
    }

    #[test]
    fn transport_failure_propagates() {
        let store = store(Some("Todo"));
        store.set_offline(true);
        let validator = FixedValidator(Cell::new(true));
        let mut worker = DoneWorker;
        let err = TaskController::new(&store, &validator, &mut worker)
            .drive(35)
            .unwrap_err();
        assert!(matches!(err, SprintError::Transport(_)));
    }
}
