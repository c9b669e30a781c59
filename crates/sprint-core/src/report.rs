use crate::detect::{Category, Snapshot, TaskView};
use crate::types::Progress;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;

#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub task: String,
    pub issue: u64,
    pub title: String,
    pub status: String,
    pub progress: Progress,
    pub category: Category,
    pub is_gate: bool,
}

/// A task that still carries unchecked items.
#[derive(Debug, Clone, Serialize)]
pub struct Remediation {
    pub task: String,
    pub issue: u64,
    pub url: String,
    pub unchecked: Vec<String>,
    pub suggestion: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GateSummary {
    pub issue: u64,
    pub url: String,
    pub eligible: bool,
    /// Labels of work tasks keeping the gate closed.
    pub blockers: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionReport {
    pub sprint: u32,
    pub name: String,
    pub generated_at: DateTime<Utc>,
    /// Every work task is Done.
    pub complete: bool,
    pub rows: Vec<ReportRow>,
    pub remediation: Vec<Remediation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate: Option<GateSummary>,
}

fn suggestion(task: &TaskView) -> String {
    let open = task.progress.unchecked();
    match task.category {
        Category::Done => format!(
            "Closed with {open} open item(s). Finish them and run `sprint task retry {}`, \
             or move them to a follow-up issue.",
            task.issue
        ),
        Category::InProgress => format!(
            "Finish the open item(s) and run `sprint task drive {}`. If it is blocked, \
             record why with `sprint task block {} <reason>`.",
            task.issue, task.issue
        ),
        Category::NotStarted => format!("Not started. Run `sprint task drive {}`.", task.issue),
    }
}

impl CompletionReport {
    pub fn build(snapshot: &Snapshot) -> Self {
        Self::build_at(snapshot, Utc::now())
    }

    pub fn build_at(snapshot: &Snapshot, generated_at: DateTime<Utc>) -> Self {
        let rows = snapshot
            .tasks
            .iter()
            .map(|t| ReportRow {
                task: t.label(),
                issue: t.issue,
                title: t.title.clone(),
                status: t.status.clone().unwrap_or_else(|| "(not on board)".to_string()),
                progress: t.progress,
                category: t.category,
                is_gate: t.is_gate,
            })
            .collect();

        let remediation = snapshot
            .work_tasks()
            .filter(|t| !t.unchecked.is_empty())
            .map(|t| Remediation {
                task: t.label(),
                issue: t.issue,
                url: t.url.clone(),
                unchecked: t.unchecked.clone(),
                suggestion: suggestion(t),
            })
            .collect();

        let gate = snapshot.gate().map(|g| GateSummary {
            issue: g.issue,
            url: g.url.clone(),
            eligible: snapshot.gate_eligible(),
            blockers: snapshot.gate_blockers().iter().map(|t| t.label()).collect(),
        });

        Self {
            sprint: snapshot.sprint,
            name: snapshot.name.clone(),
            generated_at,
            complete: snapshot.pending_work().is_empty(),
            rows,
            remediation,
            gate,
        }
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Sprint {} Completion Report: {}", self.sprint, self.name);
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Generated {}",
            self.generated_at.format("%Y-%m-%d %H:%M UTC")
        );
        let _ = writeln!(out);

        let _ = writeln!(out, "## Tasks");
        let _ = writeln!(out);
        let _ = writeln!(out, "| Task | Issue | Title | Status | Progress | State |");
        let _ = writeln!(out, "|------|-------|-------|--------|----------|-------|");
        for row in &self.rows {
            let task = if row.is_gate {
                format!("{} (gate)", row.task)
            } else {
                row.task.clone()
            };
            let _ = writeln!(
                out,
                "| {} | #{} | {} | {} | {} | {} |",
                task,
                row.issue,
                row.title.replace('|', "\\|"),
                row.status.replace('|', "\\|"),
                row.progress,
                row.category.as_str()
            );
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "## Incomplete Items");
        let _ = writeln!(out);
        if self.remediation.is_empty() {
            let _ = writeln!(out, "None. Every checklist item is checked.");
        }
        for r in &self.remediation {
            let _ = writeln!(out, "### {} ([#{}]({}))", r.task, r.issue, r.url);
            let _ = writeln!(out);
            for item in &r.unchecked {
                let _ = writeln!(out, "- [ ] {item}");
            }
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", r.suggestion);
            let _ = writeln!(out);
        }

        let _ = writeln!(out, "## Gate");
        let _ = writeln!(out);
        match &self.gate {
            None => {
                let _ = writeln!(out, "No gate task found in this milestone.");
            }
            Some(g) if g.eligible => {
                let _ = writeln!(out, "[#{}]({}) is eligible.", g.issue, g.url);
            }
            Some(g) => {
                let _ = writeln!(
                    out,
                    "[#{}]({}) is not eligible yet. Blocked by: {}.",
                    g.issue,
                    g.url,
                    g.blockers.join(", ")
                );
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SprintConfig;
    use crate::detect::SprintDetector;
    use crate::memory::MemoryStore;
    use chrono::TimeZone;

    fn snapshot(store: &MemoryStore) -> Snapshot {
        let config: SprintConfig = serde_yaml::from_str(
            "sprints:\n  - number: 2\n    name: Auth\n    milestone: 'Sprint 2: Auth'\n",
        )
        .unwrap();
        SprintDetector::new(store, &config).detect(2).unwrap()
    }

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.add_milestone("Sprint 2: Auth", 2);
        store.add_issue(50, "Sprint2.1: Login", "- [x] Form\n- [x] API\n", 2, Some("Done"));
        store.add_issue(
            51,
            "Sprint2.2: Logout",
            "- [x] Button\n- [ ] Clear session\n",
            2,
            Some("Done"),
        );
        store.add_issue(52, "Sprint2.G: Gate", "- [ ] Sign-off\n", 2, Some("Todo"));
        store
    }

    #[test]
    fn lists_unchecked_items_with_links() {
        let store = store();
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let report = CompletionReport::build_at(&snapshot(&store), at);

        assert!(report.complete);
        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.remediation.len(), 1);
        let r = &report.remediation[0];
        assert_eq!(r.issue, 51);
        assert_eq!(r.unchecked, vec!["Clear session"]);
        assert_eq!(r.url, "https://tracker.local/issues/51");

        let gate = report.gate.as_ref().unwrap();
        assert_eq!(gate.issue, 52);
        assert!(!gate.eligible);
        assert_eq!(gate.blockers, vec!["Sprint2.2"]);

        let md = report.to_markdown();
        assert!(md.contains("# Sprint 2 Completion Report: Auth"));
        assert!(md.contains("Generated 2026-03-01 12:00 UTC"));
        assert!(md.contains("### Sprint2.2 ([#51](https://tracker.local/issues/51))"));
        assert!(md.contains("- [ ] Clear session"));
        assert!(md.contains("is not eligible yet"));
    }

    #[test]
    fn gate_eligible_when_all_checked() {
        let store = store();
        store.human_set_body(51, "- [x] Button\n- [x] Clear session\n");
        let report = CompletionReport::build(&snapshot(&store));
        assert!(report.remediation.is_empty());
        assert!(report.gate.unwrap().eligible);
    }

    #[test]
    fn board_labels_with_pipes_are_escaped() {
        let store = store();
        store.human_set_status(51, Some("Testing | Validating"));
        let md = CompletionReport::build(&snapshot(&store)).to_markdown();
        assert!(md.contains("Testing \\| Validating"));
    }

    #[test]
    fn serializes_to_json() {
        let store = store();
        let json = serde_json::to_value(CompletionReport::build(&snapshot(&store))).unwrap();
        assert_eq!(json["sprint"], 2);
        assert_eq!(json["remediation"][0]["issue"], 51);
        assert_eq!(json["rows"][0]["category"], "done");
    }
}
