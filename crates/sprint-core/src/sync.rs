use crate::checklist::{self, Edit};
use crate::error::{Result, SprintError};
use crate::store::IssueStore;
use crate::types::Progress;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleOutcome {
    /// The line changed and the body was written back.
    Applied,
    /// The line already had the requested mark; nothing was written.
    Unchanged,
    /// No line carries the text. The body was left alone.
    Drift,
}

/// Reads and writes single checklist lines inside issue bodies.
///
/// Every call loads the current body, so out-of-band edits made in the
/// tracker UI between calls are never overwritten with stale content beyond
/// the one targeted line.
pub struct ChecklistSync<'a, S: IssueStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: IssueStore + ?Sized> ChecklistSync<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn toggle_item(&self, issue: u64, text: &str, checked: bool) -> Result<ToggleOutcome> {
        let current = self.store.get_issue(issue)?;
        match checklist::set_checked(&current.body, text, checked) {
            Edit::Changed(body) => {
                self.store.set_body(issue, &body)?;
                debug!(issue, item = text, checked, "checklist item toggled");
                Ok(ToggleOutcome::Applied)
            }
            Edit::Unchanged => Ok(ToggleOutcome::Unchanged),
            Edit::NotFound => {
                warn!(issue, item = text, "checklist item not found in issue body");
                Ok(ToggleOutcome::Drift)
            }
            Edit::Ambiguous(count) => Err(SprintError::AmbiguousItem {
                issue,
                text: text.to_string(),
                count,
            }),
        }
    }

    pub fn progress(&self, issue: u64) -> Result<Progress> {
        Ok(self.store.get_issue(issue)?.checklist().progress())
    }

    pub fn unchecked_items(&self, issue: u64) -> Result<Vec<String>> {
        Ok(self.store.get_issue(issue)?.checklist().unchecked())
    }

    /// Item texts repeated within the body. Toggling any of them fails.
    pub fn duplicate_items(&self, issue: u64) -> Result<Vec<String>> {
        Ok(checklist::duplicates(&self.store.get_issue(issue)?.body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    const BODY: &str = "Setup work.\n\n- [ ] Create directory structure\n- [ ] Add README\n";

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.add_issue(12, "Sprint1.1: Scaffold", BODY, 1, Some("In Progress"));
        store
    }

    #[test]
    fn toggle_writes_single_line() {
        let store = store();
        let sync = ChecklistSync::new(&store);
        let outcome = sync
            .toggle_item(12, "Create directory structure", true)
            .unwrap();
        assert_eq!(outcome, ToggleOutcome::Applied);
        assert_eq!(
            store.body(12).unwrap(),
            "Setup work.\n\n- [x] Create directory structure\n- [ ] Add README\n"
        );
        assert_eq!(sync.progress(12).unwrap().to_string(), "1/2");
        assert_eq!(sync.unchecked_items(12).unwrap(), vec!["Add README"]);
    }

    #[test]
    fn toggle_round_trip_restores_body() {
        let store = store();
        let sync = ChecklistSync::new(&store);
        sync.toggle_item(12, "Add README", true).unwrap();
        sync.toggle_item(12, "Add README", false).unwrap();
        assert_eq!(store.body(12).unwrap(), BODY);
    }

    #[test]
    fn drift_leaves_body_alone() {
        let store = store();
        let sync = ChecklistSync::new(&store);
        let outcome = sync.toggle_item(12, "Configure CI", true).unwrap();
        assert_eq!(outcome, ToggleOutcome::Drift);
        assert_eq!(store.body(12).unwrap(), BODY);
    }

    #[test]
    fn out_of_band_edit_is_preserved() {
        let store = store();
        let sync = ChecklistSync::new(&store);
        store.human_set_body(12, &format!("{BODY}- [ ] Added in the UI\n"));
        sync.toggle_item(12, "Add README", true).unwrap();
        let body = store.body(12).unwrap();
        assert!(body.contains("- [ ] Added in the UI"));
        assert!(body.contains("- [x] Add README"));
    }

    #[test]
    fn duplicates_are_a_hard_error() {
        let store = MemoryStore::new();
        store.add_issue(3, "Sprint1.2", "- [ ] Test\n- [x] Test\n", 1, None);
        let sync = ChecklistSync::new(&store);
        let err = sync.toggle_item(3, "Test", true).unwrap_err();
        assert!(matches!(err, SprintError::AmbiguousItem { count: 2, .. }));
        assert_eq!(sync.duplicate_items(3).unwrap(), vec!["Test"]);
    }
}
