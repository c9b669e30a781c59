use crate::output::print_json;
use crate::session::Session;
use crate::tracker;
use anyhow::anyhow;
use sprint_core::controller::{Checkpoint, SprintController, Step};
use sprint_core::signal::Vocabulary;
use std::path::Path;

pub fn run(root: &Path, sprint: u32, signal: &[String], json: bool) -> anyhow::Result<()> {
    let config = tracker::load_sprints(root)?;
    let vocabulary = Vocabulary::new(&config.signals);
    let validator = tracker::validator(root, &config);
    let mut worker = tracker::worker(root, &config);

    let resume_from = if signal.is_empty() {
        None
    } else {
        let session = Session::load(root)?.ok_or_else(|| {
            anyhow!("no sprint run in progress; start one with `sprint step {sprint}`")
        })?;
        if session.sprint != sprint {
            anyhow::bail!(
                "the saved run is for sprint {}, not sprint {sprint}",
                session.sprint
            );
        }
        Some((
            session.checkpoint,
            session.skipped,
            vocabulary.parse(&signal.join(" ")),
        ))
    };

    let (step, skipped) = tracker::with_store(root, |store| {
        let mut ctl = SprintController::new(store, &config, &validator, worker.as_mut());
        let step = match resume_from {
            None => ctl.begin(sprint)?,
            Some((checkpoint, skipped, signal)) => {
                ctl = ctl.with_skipped(skipped);
                ctl.advance(sprint, &checkpoint, signal)?
            }
        };
        Ok((step, ctl.skipped().to_vec()))
    })?;

    persist(root, sprint, &step, &skipped)?;
    render(&step, json)?;
    if !json && step.checkpoint().is_some() {
        println!("\nReply with: sprint step {sprint} <reply>");
    }
    Ok(())
}

/// Keep the checkpoint the run is waiting at; drop it once the sprint is done.
pub fn persist(root: &Path, sprint: u32, step: &Step, skipped: &[u64]) -> anyhow::Result<()> {
    match step.checkpoint() {
        Some(checkpoint) => Session::new(sprint, checkpoint.clone(), skipped.to_vec()).save(root),
        None => Session::clear(root),
    }
}

pub fn render(step: &Step, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(step);
    }
    match step {
        Step::Await(prompt) => {
            println!("{}", prompt.message);
            println!("[{}]", prompt.accepts.join(" | "));
        }
        Step::Held(checkpoint) => {
            println!("Holding at {}.", describe_point(checkpoint));
        }
        Step::Compact { resume } => {
            println!("Compact the working context now.");
            if let Some(issue) = resume.issue() {
                println!("Then reply yes to start #{issue}.");
            }
        }
        Step::Completed(report) => {
            print!("{}", report.to_markdown());
        }
    }
    Ok(())
}

fn describe_point(checkpoint: &Checkpoint) -> String {
    let name = serde_json::to_value(checkpoint)
        .ok()
        .and_then(|v| v.get("point").and_then(|p| p.as_str()).map(str::to_string))
        .unwrap_or_else(|| "checkpoint".to_string());
    match checkpoint.issue() {
        Some(issue) => format!("{name} (#{issue})"),
        None => name,
    }
}
