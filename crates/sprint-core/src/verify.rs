use crate::error::Result;
use crate::store::IssueStore;
use crate::types::BoardStatus;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Verification {
    Verified,
    /// `actual` is the raw board label, `None` when the issue is off the board.
    Mismatch { actual: Option<String> },
}

impl Verification {
    pub fn is_verified(&self) -> bool {
        matches!(self, Verification::Verified)
    }
}

/// Single-shot check of a task's board status. Never polls: callers re-run
/// it when the human says `verify`.
pub struct StatusVerifier<'a, S: IssueStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: IssueStore + ?Sized> StatusVerifier<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn verify(&self, issue: u64, expected: BoardStatus) -> Result<Verification> {
        let actual = self.store.board_status(issue)?;
        let parsed = actual.as_deref().and_then(BoardStatus::from_label);
        if parsed == Some(expected) {
            return Ok(Verification::Verified);
        }
        warn!(
            issue,
            expected = expected.label(),
            actual = actual.as_deref().unwrap_or("(not on board)"),
            "board status mismatch"
        );
        Ok(Verification::Mismatch { actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[test]
    fn matching_status_verifies() {
        let store = MemoryStore::new();
        store.add_issue(40, "Sprint1.4", "", 1, Some("Review"));
        let v = StatusVerifier::new(&store);
        assert_eq!(v.verify(40, BoardStatus::Review).unwrap(), Verification::Verified);
    }

    #[test]
    fn testing_is_not_review() {
        let store = MemoryStore::new();
        store.add_issue(41, "Sprint1.5", "", 1, Some("Testing | Validating"));
        let v = StatusVerifier::new(&store);
        assert_eq!(
            v.verify(41, BoardStatus::Review).unwrap(),
            Verification::Mismatch {
                actual: Some("Testing | Validating".to_string())
            }
        );
    }

    #[test]
    fn off_board_is_mismatch_with_none() {
        let store = MemoryStore::new();
        store.add_issue(42, "Sprint1.6", "", 1, None);
        let v = StatusVerifier::new(&store);
        let result = v.verify(42, BoardStatus::Todo).unwrap();
        assert_eq!(result, Verification::Mismatch { actual: None });
        assert!(!result.is_verified());
    }
}
