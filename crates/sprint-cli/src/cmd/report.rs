use crate::output::print_json;
use crate::tracker;
use anyhow::Context;
use sprint_core::detect::SprintDetector;
use sprint_core::report::CompletionReport;
use sprint_core::{io, paths};
use std::path::Path;

pub fn run(root: &Path, sprint: u32, write: bool, post: bool, json: bool) -> anyhow::Result<()> {
    let config = tracker::load_sprints(root)?;
    let report = tracker::with_store(root, |store| {
        let snapshot = SprintDetector::new(store, &config).detect(sprint)?;
        let report = CompletionReport::build(&snapshot);
        if post {
            let gate = report
                .gate
                .as_ref()
                .with_context(|| format!("sprint {sprint} has no gate issue to post to"))?;
            store.comment(gate.issue, &report.to_markdown())?;
            tracing::info!(sprint, issue = gate.issue, "report posted");
        }
        Ok(report)
    })?;

    let markdown = report.to_markdown();
    if write {
        let path = paths::report_path(root, sprint);
        io::atomic_write(&path, markdown.as_bytes())
            .with_context(|| format!("failed to write {}", path.display()))?;
        if !json {
            println!("wrote {}", path.display());
        }
    }

    if json {
        print_json(&report)
    } else {
        if !write {
            print!("{markdown}");
        }
        Ok(())
    }
}
