use crate::output::print_json;
use crate::tracker;
use clap::Subcommand;
use sprint_core::lifecycle::{TaskController, TaskOutcome};
use sprint_core::types::TaskPhase;
use std::path::Path;

#[derive(Subcommand)]
pub enum TaskSubcommand {
    /// Move a task from Todo to In Progress
    Start { issue: u64 },
    /// Work through the checklist, validate, and move the task to Review
    Drive { issue: u64 },
    /// Record why a task is blocked
    Block {
        issue: u64,
        #[arg(required = true)]
        reason: Vec<String>,
    },
    /// Force a task back to Todo
    Restart { issue: u64 },
    /// Re-run validation (or remaining items) after a fix
    Retry { issue: u64 },
    /// Move a task that failed validation to Review anyway
    Skip {
        issue: u64,
        #[arg(required = true)]
        reason: Vec<String>,
    },
}

pub fn run(root: &Path, subcmd: TaskSubcommand, json: bool) -> anyhow::Result<()> {
    let config = tracker::load_sprints(root)?;
    let validator = tracker::validator(root, &config);
    let mut worker = tracker::worker(root, &config);

    tracker::with_store(root, |store| {
        let mut tasks = TaskController::new(store, &validator, worker.as_mut());
        match subcmd {
            TaskSubcommand::Start { issue } => print_phase(issue, tasks.start(issue)?, json),
            TaskSubcommand::Drive { issue } => print_outcome(&tasks.drive(issue)?, json),
            TaskSubcommand::Block { issue, reason } => {
                print_phase(issue, tasks.block(issue, &reason.join(" "))?, json)
            }
            TaskSubcommand::Restart { issue } => print_phase(issue, tasks.restart(issue)?, json),
            TaskSubcommand::Retry { issue } => print_outcome(&tasks.retry_validation(issue)?, json),
            TaskSubcommand::Skip { issue, reason } => {
                print_outcome(&tasks.skip_validation(issue, &reason.join(" "))?, json)
            }
        }
    })
}

fn print_phase(issue: u64, phase: TaskPhase, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&serde_json::json!({ "issue": issue, "phase": phase }));
    }
    println!("#{issue}: {phase}");
    Ok(())
}

fn print_outcome(outcome: &TaskOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(outcome);
    }
    match outcome {
        TaskOutcome::ReadyForReview { issue } => {
            println!("#{issue} is in Review. Move it to Done after review.")
        }
        TaskOutcome::AlreadyDone { issue } => println!("#{issue} is already Done."),
        TaskOutcome::AwaitingWork { issue, remaining } => {
            println!("#{issue} has {} unchecked item(s):", remaining.len());
            for item in remaining {
                println!("  - [ ] {item}");
            }
        }
        TaskOutcome::WorkFailed {
            issue,
            item,
            reason,
        } => println!("#{issue}: work on {item:?} failed:\n{reason}"),
        TaskOutcome::Drift { issue, item } => {
            println!("#{issue}: item {item:?} is no longer in the issue body")
        }
        TaskOutcome::DuplicateItems { issue, items } => {
            println!("#{issue} repeats checklist items; make each one unique:");
            for item in items {
                println!("  - {item}");
            }
        }
        TaskOutcome::ValidationFailed { issue, report } => {
            println!("#{issue} failed validation and stays in Testing | Validating.");
            if let Some(f) = report.first_failure() {
                println!("[{}] {}\n{}", f.name, f.command, f.output);
            }
        }
        TaskOutcome::StatusMismatch {
            issue,
            expected,
            actual,
        } => println!(
            "#{issue}: expected {}, board shows {}",
            expected.label(),
            actual.as_deref().unwrap_or("(not on board)")
        ),
    }
    Ok(())
}
