//! Sprint-level step machine.
//!
//! The controller holds no state between calls. [`SprintController::begin`]
//! and [`SprintController::advance`] each re-detect the sprint from the
//! tracker and return a [`Step`]. When a human has to answer, the step is a
//! [`Prompt`] naming a [`Checkpoint`]; the caller keeps that checkpoint (in
//! memory for `sprint run`, in `.sprint/session.yaml` for `sprint step`) and
//! hands it back with the parsed [`Signal`]. Tasks blocked with
//! `skip <reason>` during a run are the one other thing the caller carries
//! between calls; see [`SprintController::with_skipped`].

use crate::config::SprintConfig;
use crate::detect::{Snapshot, SprintDetector, TaskView};
use crate::error::Result;
use crate::lifecycle::{TaskController, TaskOutcome};
use crate::report::CompletionReport;
use crate::signal::Signal;
use crate::store::IssueStore;
use crate::types::BoardStatus;
use crate::validation::Validator;
use crate::verify::{StatusVerifier, Verification};
use crate::worker::TaskWorker;
use serde::{Deserialize, Serialize};
use tracing::info;

// ---------------------------------------------------------------------------
// Checkpoint / Prompt / Step
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "point", rename_all = "snake_case")]
pub enum Checkpoint {
    /// The sprint already has progress: resume, restart or verify.
    ResumeChoice,
    /// Every task was reset to Todo; waiting for the go-ahead.
    ConfirmKickoff,
    ConfirmStart { issue: u64 },
    /// Items remain unchecked, or the worker failed on one.
    WorkPending { issue: u64 },
    ValidationFailed { issue: u64 },
    StatusMismatch { issue: u64, expected: BoardStatus },
    /// Task sits in Review until a human moves it to Done.
    ConfirmReview { issue: u64 },
    ConfirmNext { issue: u64 },
    CompactPoint { next: u64 },
}

impl Checkpoint {
    pub fn issue(&self) -> Option<u64> {
        match self {
            Checkpoint::ResumeChoice | Checkpoint::ConfirmKickoff => None,
            Checkpoint::ConfirmStart { issue }
            | Checkpoint::WorkPending { issue }
            | Checkpoint::ValidationFailed { issue }
            | Checkpoint::StatusMismatch { issue, .. }
            | Checkpoint::ConfirmReview { issue }
            | Checkpoint::ConfirmNext { issue } => Some(*issue),
            Checkpoint::CompactPoint { next } => Some(*next),
        }
    }

    /// Replies that move this checkpoint forward.
    pub fn accepts(&self) -> &'static [&'static str] {
        match self {
            Checkpoint::ResumeChoice => &["resume", "restart", "verify"],
            Checkpoint::ConfirmKickoff | Checkpoint::ConfirmNext { .. } => &["yes", "hold"],
            Checkpoint::ConfirmStart { .. } => &["yes", "hold", "skip <reason>"],
            Checkpoint::WorkPending { .. } => &["yes", "retry", "hold", "skip <reason>"],
            Checkpoint::ValidationFailed { .. } => &["retry", "hold", "skip <reason>"],
            Checkpoint::StatusMismatch { .. } => &["verify", "retry", "hold"],
            Checkpoint::ConfirmReview { .. } => &["done", "verify", "retry", "hold"],
            Checkpoint::CompactPoint { .. } => &["compact", "skip compact"],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Prompt {
    pub checkpoint: Checkpoint,
    pub message: String,
    pub accepts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TaskOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<Snapshot>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "step", content = "data", rename_all = "snake_case")]
pub enum Step {
    Await(Prompt),
    /// The human said hold. The same checkpoint accepts a signal later.
    Held(Checkpoint),
    /// Compact the working context, then continue from `resume`.
    Compact { resume: Checkpoint },
    Completed(CompletionReport),
}

impl Step {
    pub fn checkpoint(&self) -> Option<&Checkpoint> {
        match self {
            Step::Await(p) => Some(&p.checkpoint),
            Step::Held(cp) => Some(cp),
            Step::Compact { resume } => Some(resume),
            Step::Completed(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// SprintController
// ---------------------------------------------------------------------------

pub struct SprintController<'a, S, V, W>
where
    S: IssueStore + ?Sized,
    V: Validator + ?Sized,
    W: TaskWorker + ?Sized,
{
    store: &'a S,
    config: &'a SprintConfig,
    validator: &'a V,
    worker: &'a mut W,
    skipped: Vec<u64>,
}

impl<'a, S, V, W> SprintController<'a, S, V, W>
where
    S: IssueStore + ?Sized,
    V: Validator + ?Sized,
    W: TaskWorker + ?Sized,
{
    pub fn new(store: &'a S, config: &'a SprintConfig, validator: &'a V, worker: &'a mut W) -> Self {
        Self {
            store,
            config,
            validator,
            worker,
            skipped: Vec::new(),
        }
    }

    /// Issues blocked earlier in this run. They are passed over when the
    /// next task is picked.
    pub fn with_skipped(mut self, skipped: Vec<u64>) -> Self {
        self.skipped = skipped;
        self
    }

    pub fn skipped(&self) -> &[u64] {
        &self.skipped
    }

    fn detect(&self, sprint: u32) -> Result<Snapshot> {
        SprintDetector::new(self.store, self.config).detect(sprint)
    }

    fn tasks(&mut self) -> TaskController<'_, S, V, W> {
        TaskController::new(self.store, self.validator, &mut *self.worker)
    }

    /// Entry point: offer resume on a sprint with progress, otherwise reset
    /// the sprint and wait for kickoff.
    pub fn begin(&mut self, sprint: u32) -> Result<Step> {
        let snapshot = self.detect(sprint)?;
        if snapshot.has_progress {
            info!(sprint, current = ?snapshot.current, "sprint has progress");
            return Ok(self.prompt(Checkpoint::ResumeChoice, snapshot, None, None));
        }
        self.fresh_start(sprint)
    }

    pub fn advance(&mut self, sprint: u32, checkpoint: &Checkpoint, signal: Signal) -> Result<Step> {
        use Checkpoint as C;
        use Signal as Sig;

        info!(sprint, ?checkpoint, signal = %signal, "advancing sprint");
        match (checkpoint, signal) {
            (C::ResumeChoice, Sig::Resume) => self.resume(sprint),
            (C::ResumeChoice, Sig::Restart) => self.fresh_start(sprint),
            (C::ResumeChoice, Sig::Verify) => self.begin(sprint),

            (C::ConfirmKickoff, Sig::Continue) => {
                let snapshot = self.detect(sprint)?;
                match next_pending(&snapshot, &self.skipped).map(|t| t.issue) {
                    Some(issue) => self.run_task(sprint, issue),
                    None => Ok(self.complete(&snapshot)),
                }
            }

            (C::ConfirmStart { issue }, Sig::Continue) => self.run_task(sprint, *issue),

            (C::WorkPending { issue }, Sig::Continue | Sig::Retry)
            | (C::ValidationFailed { issue }, Sig::Retry)
            | (C::StatusMismatch { issue, .. }, Sig::Retry)
            | (C::ConfirmReview { issue }, Sig::Retry) => self.run_task(sprint, *issue),

            (
                C::ConfirmStart { issue } | C::WorkPending { issue } | C::ValidationFailed { issue },
                Sig::Skip { reason: None },
            ) => self.reprompt(
                sprint,
                checkpoint,
                Some(format!("Skipping #{issue} needs a reason: `skip <reason>`.")),
            ),
            (C::ValidationFailed { issue }, Sig::Skip { reason: Some(reason) }) => {
                let outcome = self.tasks().skip_validation(*issue, &reason)?;
                self.handle_outcome(sprint, outcome)
            }
            (C::ConfirmStart { issue } | C::WorkPending { issue }, Sig::Skip { reason: Some(reason) }) => {
                self.tasks().block(*issue, &reason)?;
                if !self.skipped.contains(issue) {
                    self.skipped.push(*issue);
                }
                self.move_on(sprint, false)
            }

            (C::StatusMismatch { issue, expected }, Sig::Verify) => {
                self.verify(sprint, *issue, *expected)
            }
            (C::ConfirmReview { issue }, Sig::Continue | Sig::Verify) => {
                self.verify(sprint, *issue, BoardStatus::Done)
            }

            (C::ConfirmNext { .. }, Sig::Continue) => self.move_on(sprint, true),

            (C::CompactPoint { next }, Sig::Compact) => Ok(Step::Compact {
                resume: C::ConfirmStart { issue: *next },
            }),
            (C::CompactPoint { next }, Sig::SkipCompact) => {
                let snapshot = self.detect(sprint)?;
                Ok(self.prompt(C::ConfirmStart { issue: *next }, snapshot, None, None))
            }

            (cp, Sig::Hold) if !matches!(cp, C::CompactPoint { .. }) => Ok(Step::Held(cp.clone())),

            (cp, Sig::Unrecognized { input }) => self.reprompt(
                sprint,
                cp,
                Some(format!("Unrecognized reply {input:?}.")),
            ),
            (cp, other) => self.reprompt(
                sprint,
                cp,
                Some(format!("`{}` does not apply here.", other.keyword())),
            ),
        }
    }

    // -- branches ------------------------------------------------------------

    fn fresh_start(&mut self, sprint: u32) -> Result<Step> {
        let snapshot = self.detect(sprint)?;
        self.skipped.clear();
        let mut reset = 0usize;
        for task in &snapshot.tasks {
            if task.board_status() != Some(BoardStatus::Todo) {
                self.tasks().restart(task.issue)?;
                reset += 1;
            }
        }
        info!(sprint, reset, "sprint reset to Todo");
        let snapshot = self.detect(sprint)?;
        Ok(self.prompt(Checkpoint::ConfirmKickoff, snapshot, None, None))
    }

    fn resume(&mut self, sprint: u32) -> Result<Step> {
        let snapshot = self.detect(sprint)?;
        let target = snapshot
            .current_task()
            .filter(|t| !t.is_gate && !self.skipped.contains(&t.issue))
            .or_else(|| next_pending(&snapshot, &self.skipped))
            .map(|t| t.issue);
        match target {
            Some(issue) => self.run_task(sprint, issue),
            None => Ok(self.complete(&snapshot)),
        }
    }

    fn run_task(&mut self, sprint: u32, issue: u64) -> Result<Step> {
        let outcome = self.tasks().drive(issue)?;
        self.handle_outcome(sprint, outcome)
    }

    fn handle_outcome(&mut self, sprint: u32, outcome: TaskOutcome) -> Result<Step> {
        let checkpoint = match &outcome {
            TaskOutcome::AlreadyDone { issue } => return self.after_done(sprint, *issue),
            TaskOutcome::ReadyForReview { issue } => Checkpoint::ConfirmReview { issue: *issue },
            TaskOutcome::AwaitingWork { issue, .. }
            | TaskOutcome::WorkFailed { issue, .. }
            | TaskOutcome::DuplicateItems { issue, .. }
            | TaskOutcome::Drift { issue, .. } => Checkpoint::WorkPending { issue: *issue },
            TaskOutcome::ValidationFailed { issue, .. } => {
                Checkpoint::ValidationFailed { issue: *issue }
            }
            TaskOutcome::StatusMismatch {
                issue, expected, ..
            } => Checkpoint::StatusMismatch {
                issue: *issue,
                expected: *expected,
            },
        };
        let snapshot = self.detect(sprint)?;
        Ok(self.prompt(checkpoint, snapshot, None, Some(outcome)))
    }

    fn verify(&mut self, sprint: u32, issue: u64, expected: BoardStatus) -> Result<Step> {
        match StatusVerifier::new(self.store).verify(issue, expected)? {
            Verification::Verified if expected == BoardStatus::Done => self.after_done(sprint, issue),
            Verification::Verified => {
                let snapshot = self.detect(sprint)?;
                Ok(self.prompt(Checkpoint::ConfirmReview { issue }, snapshot, None, None))
            }
            Verification::Mismatch { actual } => {
                let snapshot = self.detect(sprint)?;
                let outcome = TaskOutcome::StatusMismatch {
                    issue,
                    expected,
                    actual,
                };
                Ok(self.prompt(
                    Checkpoint::StatusMismatch { issue, expected },
                    snapshot,
                    None,
                    Some(outcome),
                ))
            }
        }
    }

    /// The human moved the card to Done.
    fn after_done(&mut self, sprint: u32, issue: u64) -> Result<Step> {
        let snapshot = self.detect(sprint)?;
        if next_pending(&snapshot, &self.skipped).is_none() {
            return Ok(self.complete(&snapshot));
        }
        Ok(self.prompt(Checkpoint::ConfirmNext { issue }, snapshot, None, None))
    }

    /// Pick the next unfinished task. `confirmed` means a task just reached
    /// Done and the human already said go, so the next one starts without
    /// another confirmation unless a compaction checkpoint is due. After a
    /// block the Done count is unchanged and no compaction is offered.
    fn move_on(&mut self, sprint: u32, confirmed: bool) -> Result<Step> {
        let snapshot = self.detect(sprint)?;
        let Some(next) = next_pending(&snapshot, &self.skipped).map(|t| t.issue) else {
            return Ok(self.complete(&snapshot));
        };
        let done = snapshot.work_done_count();
        let every = self.config.compact_every as usize;
        if confirmed && every > 0 && done > 0 && done % every == 0 {
            return Ok(self.prompt(Checkpoint::CompactPoint { next }, snapshot, None, None));
        }
        if confirmed {
            self.run_task(sprint, next)
        } else {
            Ok(self.prompt(Checkpoint::ConfirmStart { issue: next }, snapshot, None, None))
        }
    }

    fn complete(&self, snapshot: &Snapshot) -> Step {
        let report = CompletionReport::build(snapshot);
        info!(
            sprint = snapshot.sprint,
            complete = report.complete,
            incomplete = report.remediation.len(),
            "sprint finished"
        );
        Step::Completed(report)
    }

    fn reprompt(&mut self, sprint: u32, checkpoint: &Checkpoint, note: Option<String>) -> Result<Step> {
        let snapshot = self.detect(sprint)?;
        Ok(self.prompt(checkpoint.clone(), snapshot, note, None))
    }

    fn prompt(
        &self,
        checkpoint: Checkpoint,
        snapshot: Snapshot,
        note: Option<String>,
        outcome: Option<TaskOutcome>,
    ) -> Step {
        let mut message = describe(&checkpoint, &snapshot, &self.skipped, outcome.as_ref());
        if let Some(note) = note {
            message = format!("{note} {message}");
        }
        Step::Await(Prompt {
            accepts: checkpoint.accepts().iter().map(|s| s.to_string()).collect(),
            checkpoint,
            message,
            outcome,
            snapshot: Some(snapshot),
        })
    }
}

/// First work task in listing order that is not Done and was not blocked in
/// this run. Tasks before the current one count too.
fn next_pending<'s>(snapshot: &'s Snapshot, skipped: &[u64]) -> Option<&'s TaskView> {
    snapshot
        .pending_work()
        .into_iter()
        .find(|t| !skipped.contains(&t.issue))
}

fn task_line(snapshot: &Snapshot, issue: u64) -> String {
    match snapshot.task(issue) {
        Some(t) => format!("{} (#{})", t.title, t.issue),
        None => format!("#{issue}"),
    }
}

fn describe(
    checkpoint: &Checkpoint,
    snapshot: &Snapshot,
    skipped: &[u64],
    outcome: Option<&TaskOutcome>,
) -> String {
    match checkpoint {
        Checkpoint::ResumeChoice => {
            let mut msg = format!(
                "Sprint {} ({}) has progress: {} done, {} in progress, {} not started.",
                snapshot.sprint,
                snapshot.name,
                snapshot.done().len(),
                snapshot.in_progress().len(),
                snapshot.not_started().len()
            );
            if let Some(t) = snapshot.current_task() {
                msg.push_str(&format!(
                    " Current task: {} (#{}) {}, {} items checked.",
                    t.label(),
                    t.issue,
                    t.status.as_deref().unwrap_or("(not on board)"),
                    t.progress
                ));
            }
            msg.push_str(" Reply resume, restart or verify.");
            msg
        }
        Checkpoint::ConfirmKickoff => {
            let first = snapshot
                .next_not_started()
                .map(|t| format!("{} (#{})", t.label(), t.issue))
                .unwrap_or_else(|| "nothing".to_string());
            format!(
                "Sprint {} ({}): {} tasks at Todo. Start with {first}?",
                snapshot.sprint,
                snapshot.name,
                snapshot.tasks.len()
            )
        }
        Checkpoint::ConfirmStart { issue } => {
            format!("Start {}?", task_line(snapshot, *issue))
        }
        Checkpoint::WorkPending { issue } => match outcome {
            Some(TaskOutcome::WorkFailed { item, reason, .. }) => format!(
                "Work on {:?} for #{issue} failed: {reason}. Reply retry after fixing, or skip <reason>.",
                item
            ),
            Some(TaskOutcome::DuplicateItems { items, .. }) => format!(
                "#{issue} repeats checklist item(s) {}. Make every item unique, then reply retry.",
                items
                    .iter()
                    .map(|i| format!("{i:?}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Some(TaskOutcome::Drift { item, .. }) => format!(
                "Item {item:?} is no longer in #{issue}. The body changed outside the engine. Fix the issue body and reply retry."
            ),
            _ => {
                let remaining = snapshot.task(*issue).map(|t| t.unchecked.len()).unwrap_or(0);
                format!(
                    "{} has {remaining} unchecked item(s). Check them off as they are done, then reply yes.",
                    task_line(snapshot, *issue)
                )
            }
        },
        Checkpoint::ValidationFailed { issue } => {
            let detail = match outcome {
                Some(TaskOutcome::ValidationFailed { report, .. }) => report
                    .first_failure()
                    .map(|f| format!(" `{}` failed:\n{}\n", f.command, f.output))
                    .unwrap_or_default(),
                _ => String::new(),
            };
            format!(
                "#{issue} failed validation and stays in Testing | Validating.{detail} Reply retry after fixing, or skip <reason>."
            )
        }
        Checkpoint::StatusMismatch { issue, expected } => {
            let actual = match outcome {
                Some(TaskOutcome::StatusMismatch { actual, .. }) => actual.clone(),
                _ => snapshot.task(*issue).and_then(|t| t.status.clone()),
            };
            format!(
                "#{issue}: expected board status {:?}, found {:?}. Correct the board and reply verify.",
                expected.label(),
                actual.as_deref().unwrap_or("(not on board)")
            )
        }
        Checkpoint::ConfirmReview { issue } => format!(
            "{} is in Review. Move the card to Done once reviewed, then reply done.",
            task_line(snapshot, *issue)
        ),
        Checkpoint::ConfirmNext { issue } => {
            let next = next_pending(snapshot, skipped)
                .map(|t| format!("{} (#{})", t.label(), t.issue))
                .unwrap_or_else(|| "the completion report".to_string());
            format!("#{issue} is Done. Continue with {next}?")
        }
        Checkpoint::CompactPoint { next } => format!(
            "{} tasks done. Reply compact to compact context before #{next}, or skip compact.",
            snapshot.work_done_count()
        ),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
