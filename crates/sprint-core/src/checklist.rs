//! Markdown task-list codec for issue bodies.
//!
//! Issue bodies carry a task's checklist as `- [ ] text` / `- [x] text`
//! lines. This module is the only place that knows that format: it parses a
//! body into typed [`ChecklistItem`]s and rewrites a single line's mark while
//! leaving every other byte of the body untouched.

use crate::types::Progress;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub text: String,
    pub checked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checklist {
    pub items: Vec<ChecklistItem>,
}

impl Checklist {
    pub fn progress(&self) -> Progress {
        Progress {
            checked: self.items.iter().filter(|i| i.checked).count(),
            total: self.items.len(),
        }
    }

    pub fn unchecked(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|i| !i.checked)
            .map(|i| i.text.clone())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.items.iter().all(|i| i.checked)
    }
}

/// Result of rewriting one checklist line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    /// The line was found and its mark flipped; carries the full new body.
    Changed(String),
    /// The line was found and already had the requested mark.
    Unchanged,
    /// No line carries this text.
    NotFound,
    /// More than one line carries this text; nothing was changed.
    Ambiguous(usize),
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

static ITEM_RE: OnceLock<Regex> = OnceLock::new();

fn item_re() -> &'static Regex {
    ITEM_RE.get_or_init(|| Regex::new(r"^\s*[-*]\s+\[([ xX])\]\s+(.*?)\s*$").unwrap())
}

/// Iterate body lines with their content stripped of the line terminator,
/// skipping anything inside fenced code blocks.
fn content_lines(body: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut in_fence = false;
    body.split_inclusive('\n')
        .enumerate()
        .filter_map(move |(idx, raw)| {
            let line = strip_eol(raw);
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                return None;
            }
            (!in_fence).then_some((idx, line))
        })
}

fn strip_eol(raw: &str) -> &str {
    let line = raw.strip_suffix('\n').unwrap_or(raw);
    line.strip_suffix('\r').unwrap_or(line)
}

pub fn parse(body: &str) -> Checklist {
    let items = content_lines(body)
        .filter_map(|(_, line)| {
            let caps = item_re().captures(line)?;
            Some(ChecklistItem {
                checked: &caps[1] != " ",
                text: caps[2].to_string(),
            })
        })
        .collect();
    Checklist { items }
}

/// Item texts that occur on more than one line, in first-seen order.
pub fn duplicates(body: &str) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order = Vec::new();
    for item in parse(body).items {
        let n = counts.entry(item.text.clone()).or_insert(0);
        *n += 1;
        if *n == 2 {
            order.push(item.text);
        }
    }
    order
}

// ---------------------------------------------------------------------------
// Rewriting
// ---------------------------------------------------------------------------

/// Set the mark on the single line whose text is exactly `text`.
///
/// The match is anchored on the escaped text, so regex metacharacters in
/// item text are literal. Only the one-character mark changes; indentation,
/// bullet style and line endings are kept.
pub fn set_checked(body: &str, text: &str, checked: bool) -> Edit {
    let pattern = format!(
        r"^(\s*[-*]\s+\[)([ xX])(\]\s+){}\s*$",
        regex::escape(text.trim())
    );
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(_) => return Edit::NotFound,
    };

    let hits: Vec<usize> = content_lines(body)
        .filter(|(_, line)| re.is_match(line))
        .map(|(idx, _)| idx)
        .collect();

    let target = match hits.as_slice() {
        [] => return Edit::NotFound,
        [one] => *one,
        many => return Edit::Ambiguous(many.len()),
    };

    let mark = if checked { "x" } else { " " };
    let mut changed = false;
    let mut out = String::with_capacity(body.len());
    for (idx, raw) in body.split_inclusive('\n').enumerate() {
        if idx != target {
            out.push_str(raw);
            continue;
        }
        let line = strip_eol(raw);
        let eol = &raw[line.len()..];
        match re.captures(line).and_then(|c| c.get(2)) {
            Some(m) if (m.as_str() != " ") != checked => {
                out.push_str(&line[..m.start()]);
                out.push_str(mark);
                out.push_str(&line[m.end()..]);
                out.push_str(eol);
                changed = true;
            }
            _ => out.push_str(raw),
        }
    }

    if changed {
        Edit::Changed(out)
    } else {
        Edit::Unchanged
    }
}

/// Render a fresh checklist block, one line per item.
pub fn render(items: &[ChecklistItem]) -> String {
    items
        .iter()
        .map(|i| format!("- [{}] {}\n", if i.checked { "x" } else { " " }, i.text))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "## Tasks\n\
- [ ] Create directory structure\n\
- [x] Add package.json\n\
- [ ] Wire up (optional) lint step\n\
\n\
Notes: keep it small.\n";

    #[test]
    fn parse_reads_items_in_order() {
        let list = parse(BODY);
        assert_eq!(list.items.len(), 3);
        assert_eq!(list.items[0].text, "Create directory structure");
        assert!(!list.items[0].checked);
        assert!(list.items[1].checked);
        assert_eq!(list.progress().to_string(), "1/3");
        assert_eq!(
            list.unchecked(),
            vec!["Create directory structure", "Wire up (optional) lint step"]
        );
    }

    #[test]
    fn parse_accepts_uppercase_and_star_bullets() {
        let list = parse("* [X] Done item\n  - [ ] Nested item\r\n");
        assert_eq!(list.progress().to_string(), "1/2");
        assert_eq!(list.items[1].text, "Nested item");
    }

    #[test]
    fn parse_skips_fenced_blocks() {
        let body = "- [ ] Real\n```md\n- [ ] Example only\n```\n";
        let list = parse(body);
        assert_eq!(list.items.len(), 1);
    }

    #[test]
    fn check_only_touches_target_line() {
        let Edit::Changed(out) = set_checked(BODY, "Create directory structure", true) else {
            panic!("expected change");
        };
        assert!(out.contains("- [x] Create directory structure\n"));
        let before: Vec<&str> = BODY.lines().collect();
        let after: Vec<&str> = out.lines().collect();
        assert_eq!(before.len(), after.len());
        let diffs = before.iter().zip(&after).filter(|(a, b)| a != b).count();
        assert_eq!(diffs, 1);
    }

    #[test]
    fn check_then_uncheck_restores_body() {
        let Edit::Changed(checked) = set_checked(BODY, "Create directory structure", true) else {
            panic!("expected change");
        };
        let Edit::Changed(restored) =
            set_checked(&checked, "Create directory structure", false)
        else {
            panic!("expected change");
        };
        assert_eq!(restored, BODY);
    }

    #[test]
    fn metacharacters_match_literally() {
        let Edit::Changed(out) = set_checked(BODY, "Wire up (optional) lint step", true) else {
            panic!("expected change");
        };
        assert!(out.contains("- [x] Wire up (optional) lint step"));
        assert_eq!(set_checked(BODY, "Wire up .* step", true), Edit::NotFound);
    }

    #[test]
    fn missing_text_is_not_found() {
        assert_eq!(set_checked(BODY, "Deploy to prod", true), Edit::NotFound);
    }

    #[test]
    fn already_set_is_unchanged() {
        assert_eq!(set_checked(BODY, "Add package.json", true), Edit::Unchanged);
    }

    #[test]
    fn duplicate_text_is_ambiguous() {
        let body = "- [ ] Write tests\n- [ ] Write tests\n";
        assert_eq!(set_checked(body, "Write tests", true), Edit::Ambiguous(2));
        assert_eq!(duplicates(body), vec!["Write tests"]);
    }

    #[test]
    fn crlf_line_endings_survive() {
        let body = "- [ ] One\r\n- [ ] Two\r\n";
        let Edit::Changed(out) = set_checked(body, "Two", true) else {
            panic!("expected change");
        };
        assert_eq!(out, "- [ ] One\r\n- [x] Two\r\n");
    }

    #[test]
    fn render_writes_task_list() {
        let items = vec![
            ChecklistItem { text: "A".into(), checked: true },
            ChecklistItem { text: "B".into(), checked: false },
        ];
        assert_eq!(render(&items), "- [x] A\n- [ ] B\n");
    }
}
