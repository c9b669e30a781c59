use crate::output::{print_json, print_table};
use crate::tracker;
use clap::Subcommand;
use sprint_core::sync::{ChecklistSync, ToggleOutcome};
use std::path::Path;

#[derive(Subcommand)]
pub enum ChecklistSubcommand {
    /// Check one item off
    Check {
        issue: u64,
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Uncheck one item
    Uncheck {
        issue: u64,
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Show every item and the progress figure
    Show { issue: u64 },
    /// Fail if any item text appears more than once
    Lint { issue: u64 },
}

pub fn run(root: &Path, subcmd: ChecklistSubcommand, json: bool) -> anyhow::Result<()> {
    tracker::with_store(root, |store| {
        let sync = ChecklistSync::new(store);
        match subcmd {
            ChecklistSubcommand::Check { issue, text } => {
                toggle(&sync, issue, &text.join(" "), true, json)
            }
            ChecklistSubcommand::Uncheck { issue, text } => {
                toggle(&sync, issue, &text.join(" "), false, json)
            }
            ChecklistSubcommand::Show { issue } => {
                let checklist = store.get_issue(issue)?.checklist();
                if json {
                    return print_json(&serde_json::json!({
                        "issue": issue,
                        "progress": checklist.progress(),
                        "items": checklist.items,
                    }));
                }
                let rows = checklist
                    .items
                    .iter()
                    .map(|i| {
                        vec![
                            if i.checked { "x" } else { " " }.to_string(),
                            i.text.clone(),
                        ]
                    })
                    .collect();
                print_table(&["", "ITEM"], rows);
                println!("\n{} checked", checklist.progress());
                Ok(())
            }
            ChecklistSubcommand::Lint { issue } => {
                let dupes = sync.duplicate_items(issue)?;
                if json {
                    print_json(&serde_json::json!({ "issue": issue, "duplicates": dupes }))?;
                } else if dupes.is_empty() {
                    println!("#{issue}: every item is unique.");
                } else {
                    for d in &dupes {
                        println!("[error] duplicate item: {d}");
                    }
                }
                if !dupes.is_empty() {
                    anyhow::bail!("#{issue} has {} duplicated checklist item(s)", dupes.len());
                }
                Ok(())
            }
        }
    })
}

fn toggle<S: sprint_core::store::IssueStore + ?Sized>(
    sync: &ChecklistSync<'_, S>,
    issue: u64,
    text: &str,
    checked: bool,
    json: bool,
) -> anyhow::Result<()> {
    let outcome = sync.toggle_item(issue, text, checked)?;
    if outcome == ToggleOutcome::Drift {
        anyhow::bail!("#{issue} has no checklist item {text:?}; the body may have been edited");
    }
    let progress = sync.progress(issue)?;
    if json {
        return print_json(&serde_json::json!({
            "issue": issue,
            "item": text,
            "checked": checked,
            "outcome": outcome,
            "progress": progress,
        }));
    }
    let mark = if checked { "x" } else { " " };
    println!("#{issue}: - [{mark}] {text} ({progress})");
    Ok(())
}
