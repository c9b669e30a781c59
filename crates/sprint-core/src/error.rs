use thiserror::Error;

#[derive(Debug, Error)]
pub enum SprintError {
    #[error("not initialized: run 'sprint init'")]
    NotInitialized,

    #[error("sprint not configured: {0}")]
    SprintNotFound(u32),

    #[error("milestone not found: {0}")]
    MilestoneNotFound(String),

    #[error("issue not found: #{0}")]
    IssueNotFound(u64),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("checklist item '{text}' appears {count} times in #{issue}; item text must be unique")]
    AmbiguousItem {
        issue: u64,
        text: String,
        count: usize,
    },

    #[error("illegal transition for #{issue} to {to}: {reason}")]
    IllegalTransition {
        issue: u64,
        to: String,
        reason: String,
    },

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("no project option configured for status '{0}'")]
    MissingStatusOption(String),

    #[error("a reason is required to {0}")]
    ReasonRequired(&'static str),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("authentication required: set GITHUB_TOKEN or run 'gh auth login'")]
    Unauthorized,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("tracker API error: {message} (status: {status})")]
    Api { status: u16, message: String },

    #[error("tracker request failed: {0}")]
    Transport(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for SprintError {
    fn from(e: reqwest::Error) -> Self {
        SprintError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SprintError>;
