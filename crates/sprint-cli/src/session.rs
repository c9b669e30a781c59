use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sprint_core::controller::Checkpoint;
use sprint_core::{io, paths};
use std::path::Path;

/// The checkpoint a sprint run is waiting at, kept between `sprint step`
/// invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub sprint: u32,
    pub checkpoint: Checkpoint,
    /// Issues blocked with `skip <reason>` since the run began.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<u64>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(sprint: u32, checkpoint: Checkpoint, skipped: Vec<u64>) -> Self {
        Self {
            sprint,
            checkpoint,
            skipped,
            updated_at: Utc::now(),
        }
    }

    pub fn load(root: &Path) -> anyhow::Result<Option<Self>> {
        let path = paths::session_path(root);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(Some(serde_yaml::from_str(&data)?))
    }

    pub fn save(&self, root: &Path) -> anyhow::Result<()> {
        let data = serde_yaml::to_string(self)?;
        io::atomic_write(&paths::session_path(root), data.as_bytes())?;
        Ok(())
    }

    pub fn clear(root: &Path) -> anyhow::Result<()> {
        io::remove_if_exists(&paths::session_path(root))?;
        Ok(())
    }
}
