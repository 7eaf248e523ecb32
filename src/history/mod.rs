//! Storage sink for finished session recordings
//!
//! The controller hands a finalized [`RecordingArtifact`] to this
//! collaborator; long-term storage and browsing live outside the crate.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// The finalized audio capture of one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingArtifact {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub duration_secs: f64,
    /// Navigation goal the session was started with
    pub goal: String,
    pub media_path: PathBuf,
}

#[async_trait::async_trait]
pub trait HistorySink: Send + Sync {
    async fn save(&self, artifact: RecordingArtifact) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// In-memory history used by the demo binary and tests
#[derive(Default)]
pub struct MemoryHistory {
    entries: Arc<RwLock<Vec<RecordingArtifact>>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Vec<RecordingArtifact> {
        self.entries.read().await.clone()
    }
}

#[async_trait::async_trait]
impl HistorySink for MemoryHistory {
    async fn save(&self, artifact: RecordingArtifact) -> Result<()> {
        info!(
            "Saved recording {} ({:.1}s, goal: {})",
            artifact.id, artifact.duration_secs, artifact.goal
        );
        self.entries.write().await.push(artifact);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.entries.write().await.retain(|a| a.id != id);
        Ok(())
    }
}
