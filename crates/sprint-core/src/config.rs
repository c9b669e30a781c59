use crate::error::{Result, SprintError};
use crate::paths;
use crate::types::BoardStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// BoardConfig
// ---------------------------------------------------------------------------

/// Project board coordinates. Option ids are the single-select option ids
/// of the board's Status field, keyed by `BoardStatus::key()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub id: String,
    #[serde(default)]
    pub number: Option<u64>,
    pub status_field_id: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl ProjectConfig {
    pub fn option_for(&self, status: BoardStatus) -> Option<&str> {
        self.options.get(status.key()).map(|s| s.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardConfig {
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    pub project: ProjectConfig,
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

impl BoardConfig {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::board_path(root);
        if !path.exists() {
            return Err(SprintError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: BoardConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&paths::board_path(root), data.as_bytes())
    }

    pub fn template() -> Self {
        let options = BoardStatus::all()
            .iter()
            .map(|s| (s.key().to_string(), String::new()))
            .collect();
        Self {
            owner: "your-org".to_string(),
            repo: "your-repo".to_string(),
            api_url: default_api_url(),
            project: ProjectConfig {
                id: String::new(),
                number: None,
                status_field_id: String::new(),
                options,
            },
        }
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.owner.trim().is_empty() || self.repo.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "board owner and repo must be set".to_string(),
            });
        }
        if self.project.id.trim().is_empty() || self.project.status_field_id.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "project.id and project.status_field_id must be set".to_string(),
            });
        }

        for key in self.project.options.keys() {
            if BoardStatus::from_label(key).is_none() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("unknown status '{key}' in project.options"),
                });
            }
        }

        // Done is written by humans only, so its option id is optional.
        for status in BoardStatus::all() {
            if *status == BoardStatus::Done {
                continue;
            }
            if self.project.option_for(*status).map_or(true, |id| id.trim().is_empty()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("no option id for status '{}'", status.label()),
                });
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// SprintConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SprintDef {
    pub number: u32,
    pub name: String,
    /// Milestone title in the tracker.
    pub milestone: String,
    /// Issue number of the sign-off task; detected from titles when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<u64>,
}

/// One local validation step run before a task moves to Review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationCommand {
    pub name: String,
    pub command: String,
    /// `0` waits indefinitely.
    #[serde(default)]
    pub timeout_seconds: u32,
}

/// Words accepted as continue / hold confirmations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalWords {
    #[serde(default = "default_continue_words", rename = "continue")]
    pub continue_words: Vec<String>,
    #[serde(default = "default_hold_words", rename = "hold")]
    pub hold_words: Vec<String>,
}

fn default_continue_words() -> Vec<String> {
    ["yes", "ready", "next", "done"].map(String::from).to_vec()
}

fn default_hold_words() -> Vec<String> {
    ["no", "hold", "wait"].map(String::from).to_vec()
}

impl Default for SignalWords {
    fn default() -> Self {
        Self {
            continue_words: default_continue_words(),
            hold_words: default_hold_words(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SprintConfig {
    #[serde(default)]
    pub sprints: Vec<SprintDef>,
    #[serde(default)]
    pub validation: Vec<ValidationCommand>,
    /// Shell command run once per checklist item. Without it, items are
    /// checked by hand or by an agent through `sprint checklist check`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_command: Option<String>,
    /// Offer a context compaction checkpoint after this many completed
    /// tasks. `0` disables it.
    #[serde(default = "default_compact_every")]
    pub compact_every: u32,
    #[serde(default)]
    pub signals: SignalWords,
}

fn default_compact_every() -> u32 {
    3
}

impl Default for SprintConfig {
    fn default() -> Self {
        Self {
            sprints: Vec::new(),
            validation: Vec::new(),
            work_command: None,
            compact_every: default_compact_every(),
            signals: SignalWords::default(),
        }
    }
}

impl SprintConfig {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::sprints_path(root);
        if !path.exists() {
            return Err(SprintError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: SprintConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&paths::sprints_path(root), data.as_bytes())
    }

    pub fn template() -> Self {
        Self {
            sprints: vec![SprintDef {
                number: 1,
                name: "Foundation".to_string(),
                milestone: "Sprint 1: Foundation".to_string(),
                gate: None,
            }],
            validation: vec![
                ValidationCommand {
                    name: "build".to_string(),
                    command: "npm run build".to_string(),
                    timeout_seconds: 600,
                },
                ValidationCommand {
                    name: "lint".to_string(),
                    command: "npm run lint".to_string(),
                    timeout_seconds: 300,
                },
            ],
            ..Self::default()
        }
    }

    pub fn sprint(&self, number: u32) -> Result<&SprintDef> {
        self.sprints
            .iter()
            .find(|s| s.number == number)
            .ok_or(SprintError::SprintNotFound(number))
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        let mut seen = std::collections::HashSet::new();
        for sprint in &self.sprints {
            if !seen.insert(sprint.number) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("sprint {} is defined more than once", sprint.number),
                });
            }
            if sprint.milestone.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("sprint {} has no milestone", sprint.number),
                });
            }
        }

        for cmd in &self.validation {
            if cmd.command.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("validation '{}' has an empty command", cmd.name),
                });
            }
        }

        let overlap: Vec<&String> = self
            .signals
            .continue_words
            .iter()
            .filter(|w| self.signals.hold_words.contains(w))
            .collect();
        for word in overlap {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("signal word '{word}' is both a continue and a hold word"),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
