use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const SPRINT_DIR: &str = ".sprint";
pub const REPORTS_DIR: &str = ".sprint/reports";

pub const BOARD_FILE: &str = ".sprint/board.yaml";
pub const SPRINTS_FILE: &str = ".sprint/sprints.yaml";
pub const SESSION_FILE: &str = ".sprint/session.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn sprint_dir(root: &Path) -> PathBuf {
    root.join(SPRINT_DIR)
}

pub fn board_path(root: &Path) -> PathBuf {
    root.join(BOARD_FILE)
}

pub fn sprints_path(root: &Path) -> PathBuf {
    root.join(SPRINTS_FILE)
}

pub fn session_path(root: &Path) -> PathBuf {
    root.join(SESSION_FILE)
}

pub fn report_path(root: &Path, sprint: u32) -> PathBuf {
    root.join(REPORTS_DIR).join(format!("sprint-{sprint}.md"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            board_path(root),
            PathBuf::from("/tmp/proj/.sprint/board.yaml")
        );
        assert_eq!(
            report_path(root, 3),
            PathBuf::from("/tmp/proj/.sprint/reports/sprint-3.md")
        );
        assert_eq!(
            session_path(root),
            PathBuf::from("/tmp/proj/.sprint/session.yaml")
        );
    }
}
