//! In-process tracker used by tests and by the CLI's offline mode.
//!
//! The whole tracker is a YAML-serializable [`MemoryFixture`]; every status
//! write and comment is also appended to a log so callers can assert what the
//! engine did, not just where it ended up.

use crate::error::{Result, SprintError};
use crate::store::{Issue, IssueState, IssueStore};
use crate::types::BoardStatus;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureIssue {
    #[serde(flatten)]
    pub issue: Issue,
    /// Board status label; absent when the issue is not on the board.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub issue: u64,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryFixture {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub milestones: BTreeMap<String, u64>,
    #[serde(default)]
    pub issues: Vec<FixtureIssue>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub status_writes: Vec<(u64, BoardStatus)>,
}

fn default_base_url() -> String {
    "https://tracker.local/issues".to_string()
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RefCell<MemoryFixture>,
    offline: RefCell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(MemoryFixture {
                base_url: default_base_url(),
                ..MemoryFixture::default()
            }),
            offline: RefCell::new(false),
        }
    }

    pub fn from_fixture(fixture: MemoryFixture) -> Self {
        Self {
            state: RefCell::new(fixture),
            offline: RefCell::new(false),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let fixture: MemoryFixture = serde_yaml::from_str(&data)?;
        Ok(Self::from_fixture(fixture))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(&*self.state.borrow())?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    pub fn add_milestone(&self, title: &str, number: u64) {
        self.state
            .borrow_mut()
            .milestones
            .insert(title.to_string(), number);
    }

    /// Add an issue to a milestone with an optional board status label.
    pub fn add_issue(
        &self,
        number: u64,
        title: &str,
        body: &str,
        milestone: u64,
        status: Option<&str>,
    ) {
        let mut state = self.state.borrow_mut();
        state.issues.retain(|i| i.issue.number != number);
        state.issues.push(FixtureIssue {
            issue: Issue {
                number,
                title: title.to_string(),
                body: body.to_string(),
                state: IssueState::Open,
                milestone: Some(milestone),
            },
            status: status.map(String::from),
        });
        state.issues.sort_by_key(|i| i.issue.number);
    }

    /// Move a card the way a human would in the board UI. Not logged as an
    /// engine write.
    pub fn human_set_status(&self, number: u64, label: Option<&str>) {
        let mut state = self.state.borrow_mut();
        if let Some(entry) = state.issues.iter_mut().find(|i| i.issue.number == number) {
            entry.status = label.map(String::from);
        }
    }

    /// Edit a body out of band, as from the tracker UI.
    pub fn human_set_body(&self, number: u64, body: &str) {
        let mut state = self.state.borrow_mut();
        if let Some(entry) = state.issues.iter_mut().find(|i| i.issue.number == number) {
            entry.issue.body = body.to_string();
        }
    }

    /// Make every subsequent call fail as if the tracker were unreachable.
    pub fn set_offline(&self, offline: bool) {
        *self.offline.borrow_mut() = offline;
    }

    pub fn comments_for(&self, number: u64) -> Vec<String> {
        self.state
            .borrow()
            .comments
            .iter()
            .filter(|c| c.issue == number)
            .map(|c| c.body.clone())
            .collect()
    }

    pub fn status_writes(&self) -> Vec<(u64, BoardStatus)> {
        self.state.borrow().status_writes.clone()
    }

    pub fn body(&self, number: u64) -> Option<String> {
        self.state
            .borrow()
            .issues
            .iter()
            .find(|i| i.issue.number == number)
            .map(|i| i.issue.body.clone())
    }

    fn check_online(&self) -> Result<()> {
        if *self.offline.borrow() {
            return Err(SprintError::Transport("tracker unreachable".to_string()));
        }
        Ok(())
    }

    fn with_issue<T>(&self, number: u64, f: impl FnOnce(&mut FixtureIssue) -> T) -> Result<T> {
        self.check_online()?;
        let mut state = self.state.borrow_mut();
        let entry = state
            .issues
            .iter_mut()
            .find(|i| i.issue.number == number)
            .ok_or(SprintError::IssueNotFound(number))?;
        Ok(f(entry))
    }
}

impl IssueStore for MemoryStore {
    fn get_issue(&self, number: u64) -> Result<Issue> {
        self.with_issue(number, |e| e.issue.clone())
    }

    fn set_body(&self, number: u64, body: &str) -> Result<()> {
        self.with_issue(number, |e| e.issue.body = body.to_string())
    }

    fn comment(&self, number: u64, text: &str) -> Result<()> {
        self.with_issue(number, |_| ())?;
        self.state.borrow_mut().comments.push(Comment {
            issue: number,
            body: text.to_string(),
        });
        Ok(())
    }

    fn resolve_milestone(&self, title: &str) -> Result<u64> {
        self.check_online()?;
        self.state
            .borrow()
            .milestones
            .get(title)
            .copied()
            .ok_or_else(|| SprintError::MilestoneNotFound(title.to_string()))
    }

    fn list_by_milestone(&self, milestone: u64) -> Result<Vec<Issue>> {
        self.check_online()?;
        Ok(self
            .state
            .borrow()
            .issues
            .iter()
            .filter(|i| i.issue.milestone == Some(milestone))
            .map(|i| i.issue.clone())
            .collect())
    }

    fn board_status(&self, number: u64) -> Result<Option<String>> {
        self.with_issue(number, |e| e.status.clone())
    }

    fn set_board_status(&self, number: u64, status: BoardStatus) -> Result<()> {
        self.with_issue(number, |e| e.status = Some(status.label().to_string()))?;
        self.state.borrow_mut().status_writes.push((number, status));
        Ok(())
    }

    fn issue_url(&self, number: u64) -> String {
        format!("{}/{}", self.state.borrow().base_url, number)
    }
}
