use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// BoardStatus
// ---------------------------------------------------------------------------

/// Values of the single-select "Status" field on the project board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardStatus {
    Todo,
    InProgress,
    Testing,
    Review,
    Done,
}

impl BoardStatus {
    pub fn all() -> &'static [BoardStatus] {
        &[
            BoardStatus::Todo,
            BoardStatus::InProgress,
            BoardStatus::Testing,
            BoardStatus::Review,
            BoardStatus::Done,
        ]
    }

    /// Config key used in `board.yaml` option maps.
    pub fn key(self) -> &'static str {
        match self {
            BoardStatus::Todo => "todo",
            BoardStatus::InProgress => "in_progress",
            BoardStatus::Testing => "testing",
            BoardStatus::Review => "review",
            BoardStatus::Done => "done",
        }
    }

    /// Column label as it appears on the board.
    pub fn label(self) -> &'static str {
        match self {
            BoardStatus::Todo => "Todo",
            BoardStatus::InProgress => "In Progress",
            BoardStatus::Testing => "Testing | Validating",
            BoardStatus::Review => "Review",
            BoardStatus::Done => "Done",
        }
    }

    /// Parse a board label. Accepts the column labels, the short forms
    /// `Testing` / `Testing/Validating`, and config keys, ignoring case.
    pub fn from_label(label: &str) -> Option<BoardStatus> {
        let normalized: String = label
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        match normalized.as_str() {
            "todo" | "to-do" => Some(BoardStatus::Todo),
            "inprogress" | "in_progress" => Some(BoardStatus::InProgress),
            "testing" | "testing|validating" | "testing/validating" | "validating" => {
                Some(BoardStatus::Testing)
            }
            "review" | "inreview" => Some(BoardStatus::Review),
            "done" => Some(BoardStatus::Done),
            _ => None,
        }
    }
}

impl fmt::Display for BoardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for BoardStatus {
    type Err = crate::error::SprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BoardStatus::from_label(s).ok_or_else(|| crate::error::SprintError::InvalidStatus(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// TaskPhase
// ---------------------------------------------------------------------------

/// Lifecycle phase of a single task. `Blocked` is an excursion reachable
/// from any phase; it is recorded as a comment and leaves the board alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    Todo,
    InProgress,
    Testing,
    Review,
    Done,
    Blocked,
}

impl TaskPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskPhase::Todo => "todo",
            TaskPhase::InProgress => "in_progress",
            TaskPhase::Testing => "testing",
            TaskPhase::Review => "review",
            TaskPhase::Done => "done",
            TaskPhase::Blocked => "blocked",
        }
    }

    pub fn from_status(status: Option<BoardStatus>) -> TaskPhase {
        match status {
            None | Some(BoardStatus::Todo) => TaskPhase::Todo,
            Some(BoardStatus::InProgress) => TaskPhase::InProgress,
            Some(BoardStatus::Testing) => TaskPhase::Testing,
            Some(BoardStatus::Review) => TaskPhase::Review,
            Some(BoardStatus::Done) => TaskPhase::Done,
        }
    }
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TaskId
// ---------------------------------------------------------------------------

/// Stable task identifier of the form `Sprint<N>.<id>`, e.g. `Sprint2.4`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId {
    pub sprint: u32,
    pub id: String,
}

static TASK_ID_RE: OnceLock<Regex> = OnceLock::new();

fn task_id_re() -> &'static Regex {
    TASK_ID_RE.get_or_init(|| Regex::new(r"\bSprint\s?(\d+)\.([A-Za-z0-9]+)").unwrap())
}

impl TaskId {
    /// Find the first `Sprint<N>.<id>` token in an issue title.
    pub fn parse(title: &str) -> Option<TaskId> {
        let caps = task_id_re().captures(title)?;
        let sprint = caps.get(1)?.as_str().parse().ok()?;
        Some(TaskId {
            sprint,
            id: caps.get(2)?.as_str().to_string(),
        })
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sprint{}.{}", self.sprint, self.id)
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub checked: usize,
    pub total: usize,
}

impl Progress {
    pub fn unchecked(&self) -> usize {
        self.total - self.checked
    }

    pub fn is_complete(&self) -> bool {
        self.checked == self.total
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.checked, self.total)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_labels_parse_back() {
        for status in BoardStatus::all() {
            assert_eq!(BoardStatus::from_label(status.label()), Some(*status));
            assert_eq!(BoardStatus::from_label(status.key()), Some(*status));
        }
    }

    #[test]
    fn testing_short_forms() {
        assert_eq!(BoardStatus::from_label("Testing"), Some(BoardStatus::Testing));
        assert_eq!(
            BoardStatus::from_label("testing/validating"),
            Some(BoardStatus::Testing)
        );
        assert_eq!(BoardStatus::from_label("Backlog"), None);
    }

    #[test]
    fn task_id_from_title() {
        let id = TaskId::parse("Sprint2.4: Add login form").unwrap();
        assert_eq!(id.sprint, 2);
        assert_eq!(id.id, "4");
        assert_eq!(id.to_string(), "Sprint2.4");

        let id = TaskId::parse("[Sprint 1.gate] Sprint sign-off").unwrap();
        assert_eq!(id.id, "gate");

        assert!(TaskId::parse("Fix typo").is_none());
    }

    #[test]
    fn progress_display() {
        let p = Progress { checked: 3, total: 5 };
        assert_eq!(p.to_string(), "3/5");
        assert_eq!(p.unchecked(), 2);
        assert!(!p.is_complete());
        assert!(Progress::default().is_complete());
    }
}
