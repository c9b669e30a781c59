//! Human confirmation signals.
//!
//! Free-text replies are parsed once, at the boundary, into a closed set of
//! [`Signal`]s. Anything outside the vocabulary becomes
//! [`Signal::Unrecognized`] and the caller re-prompts.

use crate::config::SignalWords;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum Signal {
    Continue,
    Hold,
    Verify,
    /// `skip` alone carries no reason. Blocking a task needs one.
    Skip { reason: Option<String> },
    Retry,
    Resume,
    Restart,
    Compact,
    SkipCompact,
    Unrecognized { input: String },
}

impl Signal {
    pub fn keyword(&self) -> &'static str {
        match self {
            Signal::Continue => "continue",
            Signal::Hold => "hold",
            Signal::Verify => "verify",
            Signal::Skip { .. } => "skip",
            Signal::Retry => "retry",
            Signal::Resume => "resume",
            Signal::Restart => "restart",
            Signal::Compact => "compact",
            Signal::SkipCompact => "skip compact",
            Signal::Unrecognized { .. } => "unrecognized",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Skip {
                reason: Some(reason),
            } => write!(f, "skip {reason}"),
            Signal::Unrecognized { input } => write!(f, "unrecognized {input:?}"),
            other => f.write_str(other.keyword()),
        }
    }
}

/// Continue and hold words from the sprint config plus the fixed specials.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    continue_words: Vec<String>,
    hold_words: Vec<String>,
}

impl Vocabulary {
    pub fn new(words: &SignalWords) -> Self {
        let norm = |list: &[String]| {
            list.iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect()
        };
        Self {
            continue_words: norm(&words.continue_words),
            hold_words: norm(&words.hold_words),
        }
    }

    pub fn continue_words(&self) -> &[String] {
        &self.continue_words
    }

    pub fn hold_words(&self) -> &[String] {
        &self.hold_words
    }

    pub fn parse(&self, input: &str) -> Signal {
        let trimmed = input.trim();
        let mut words = trimmed.split_whitespace();
        let Some(first) = words.next() else {
            return Signal::Unrecognized {
                input: String::new(),
            };
        };
        let head = first.to_lowercase();
        let rest: Vec<&str> = words.collect();

        if head == "skip" {
            return match rest.as_slice() {
                [] => Signal::Skip { reason: None },
                [only] if only.eq_ignore_ascii_case("compact") => Signal::SkipCompact,
                reason => Signal::Skip {
                    reason: Some(reason.join(" ")),
                },
            };
        }
        if !rest.is_empty() {
            return Signal::Unrecognized {
                input: trimmed.to_string(),
            };
        }

        match head.as_str() {
            "verify" => Signal::Verify,
            "retry" => Signal::Retry,
            "resume" => Signal::Resume,
            "restart" => Signal::Restart,
            "compact" => Signal::Compact,
            w if self.continue_words.iter().any(|c| c == w) => Signal::Continue,
            w if self.hold_words.iter().any(|h| h == w) => Signal::Hold,
            _ => Signal::Unrecognized {
                input: trimmed.to_string(),
            },
        }
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new(&SignalWords::default())
    }
}
