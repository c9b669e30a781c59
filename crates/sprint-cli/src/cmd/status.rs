use crate::output::{print_json, print_table};
use crate::tracker;
use sprint_core::detect::{Snapshot, SprintDetector};
use std::path::Path;

pub fn run(root: &Path, sprint: u32, json: bool) -> anyhow::Result<()> {
    let config = tracker::load_sprints(root)?;
    let snapshot = tracker::with_store(root, |store| {
        Ok(SprintDetector::new(store, &config).detect(sprint)?)
    })?;

    if json {
        return print_json(&snapshot);
    }
    print_snapshot(&snapshot);
    Ok(())
}

pub fn print_snapshot(snapshot: &Snapshot) {
    println!(
        "Sprint {}: {} (milestone #{})",
        snapshot.sprint, snapshot.name, snapshot.milestone
    );
    println!();

    let rows = snapshot
        .tasks
        .iter()
        .map(|t| {
            let marker = if Some(t.issue) == snapshot.current {
                "*"
            } else {
                ""
            };
            vec![
                marker.to_string(),
                if t.is_gate {
                    format!("{} (gate)", t.label())
                } else {
                    t.label()
                },
                format!("#{}", t.issue),
                t.status.clone().unwrap_or_else(|| "-".to_string()),
                t.progress.to_string(),
                t.category.as_str().to_string(),
            ]
        })
        .collect();
    print_table(&["", "TASK", "ISSUE", "STATUS", "ITEMS", "STATE"], rows);

    println!();
    println!(
        "{} done, {} in progress, {} not started. Gate {}.",
        snapshot.done().len(),
        snapshot.in_progress().len(),
        snapshot.not_started().len(),
        if snapshot.gate_eligible() {
            "eligible"
        } else {
            "not eligible"
        }
    );
}
