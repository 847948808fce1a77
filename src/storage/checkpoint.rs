use crate::error::{Result, ScraperError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Durable progress snapshot. `seen_ids` always covers every persisted record.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Checkpoint {
    #[serde(default)]
    pub seen_ids: BTreeSet<String>,
    /// Unix seconds of the last write.
    #[serde(default, alias = "last_timestamp")]
    pub last_run_timestamp: Option<i64>,
    #[serde(default, alias = "posts_count")]
    pub records_count: u64,
}

/// JSON checkpoint file at a fixed path.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CheckpointStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Never fails: a missing, unreadable or corrupt file yields an empty checkpoint.
    pub async fn load(&self) -> Checkpoint {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Checkpoint::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not read checkpoint, starting fresh");
                return Checkpoint::default();
            }
        };
        match serde_json::from_slice::<Checkpoint>(&raw) {
            Ok(checkpoint) => {
                info!(
                    path = %self.path.display(),
                    seen = checkpoint.seen_ids.len(),
                    "Loaded checkpoint"
                );
                checkpoint
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupt checkpoint, starting fresh");
                Checkpoint::default()
            }
        }
    }

    /// Writes to a sibling temp file, then renames over the target.
    pub async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let payload = serde_json::to_vec_pretty(checkpoint)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| ScraperError::persistence("checkpoint", e.into()))?;
            }
        }
        let tmp_path = self.tmp_path();
        tokio::fs::write(&tmp_path, &payload)
            .await
            .map_err(|e| ScraperError::persistence("checkpoint", e.into()))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| ScraperError::persistence("checkpoint", e.into()))?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "checkpoint".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
