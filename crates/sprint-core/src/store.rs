//! The issue tracker seen as the system of record.
//!
//! Every component takes an `&dyn IssueStore` (or a generic `S: IssueStore`)
//! and re-reads what it needs on each call; nothing is cached between calls.

use crate::checklist::{self, Checklist};
use crate::error::Result;
use crate::types::{BoardStatus, TaskId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueState {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub state: IssueState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestone: Option<u64>,
}

impl Issue {
    pub fn checklist(&self) -> Checklist {
        checklist::parse(&self.body)
    }

    pub fn task_id(&self) -> Option<TaskId> {
        TaskId::parse(&self.title)
    }
}

/// Semantic operations the engine needs from the tracker.
///
/// Implementations perform one synchronous request per call and never retry.
/// `set_body` and `set_board_status` overwrite the whole value rather than
/// applying a delta.
pub trait IssueStore {
    fn get_issue(&self, number: u64) -> Result<Issue>;

    fn set_body(&self, number: u64, body: &str) -> Result<()>;

    fn comment(&self, number: u64, text: &str) -> Result<()>;

    /// Resolve a milestone title to its tracker number.
    fn resolve_milestone(&self, title: &str) -> Result<u64>;

    /// All issues in the milestone, open and closed, in tracker order.
    fn list_by_milestone(&self, milestone: u64) -> Result<Vec<Issue>>;

    /// Current label of the board's Status field, `None` when the issue is
    /// not on the board or the field is unset.
    fn board_status(&self, number: u64) -> Result<Option<String>>;

    /// Set the Status field. Idempotent.
    fn set_board_status(&self, number: u64, status: BoardStatus) -> Result<()>;

    fn issue_url(&self, number: u64) -> String;
}
