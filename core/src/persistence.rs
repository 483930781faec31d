//! Session snapshots and JSONL export
//!
//! A snapshot is a single JSON document holding everything a session needs
//! to resume. Snapshots are written to a sibling temp file and renamed into
//! place so a crash never leaves a half-written file behind.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use uuid::Uuid;

use crate::error::{GardenError, Result};
use crate::types::{Iteration, OptimizedTemplate, TestCase, ValidationResult};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub version: u32,
    pub id: Uuid,
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub training: Vec<TestCase>,
    #[serde(default)]
    pub testing: Vec<TestCase>,
    #[serde(default)]
    pub iterations: Vec<Iteration>,
    #[serde(default)]
    pub active_case: usize,
    /// Indices of training cases that reached a top score
    #[serde(default)]
    pub converged: Vec<usize>,
    #[serde(default)]
    pub template: Option<OptimizedTemplate>,
    #[serde(default)]
    pub results: Vec<ValidationResult>,
    /// Output of the active case still waiting for feedback
    #[serde(default)]
    pub pending: Option<PendingOutput>,
}

/// A generated output that has not been rated yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOutput {
    pub prompt: String,
    pub output: String,
}

impl SessionSnapshot {
    pub fn empty() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            id: Uuid::new_v4(),
            saved_at: Utc::now(),
            training: Vec::new(),
            testing: Vec::new(),
            iterations: Vec::new(),
            active_case: 0,
            converged: Vec::new(),
            template: None,
            results: Vec::new(),
            pending: None,
        }
    }
}

/// Write `snapshot` to `path` atomically, creating parent directories
pub async fn save_snapshot(path: impl AsRef<Path>, snapshot: &SessionSnapshot) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let json = serde_json::to_vec_pretty(snapshot)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &json).await?;
    fs::rename(&tmp, path).await?;

    crate::debug_log!(
        "Saved session {} ({} iterations) to {}",
        snapshot.id,
        snapshot.iterations.len(),
        path.display()
    );
    Ok(())
}

pub async fn load_snapshot(path: impl AsRef<Path>) -> Result<SessionSnapshot> {
    let path = path.as_ref();
    let content = fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => GardenError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => GardenError::Io(e),
    })?;
    let snapshot: SessionSnapshot = serde_json::from_slice(&content)?;
    if snapshot.version > SNAPSHOT_VERSION {
        return Err(GardenError::parse(format!(
            "session file version {} is newer than supported version {}",
            snapshot.version, SNAPSHOT_VERSION
        )));
    }
    Ok(snapshot)
}

/// Load a snapshot, or start fresh when the file does not exist
pub async fn load_or_empty(path: impl AsRef<Path>) -> Result<SessionSnapshot> {
    match load_snapshot(path).await {
        Ok(snapshot) => Ok(snapshot),
        Err(GardenError::FileNotFound { .. }) => Ok(SessionSnapshot::empty()),
        Err(e) => Err(e),
    }
}

pub async fn load_jsonl<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let file = File::open(path).await?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();
    let mut results = Vec::new();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(&line)?;
        results.push(item);
    }

    Ok(results)
}

pub async fn save_jsonl<T: Serialize>(path: impl AsRef<Path>, items: &[T]) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .await?;

    for item in items {
        let json = serde_json::to_string(item)?;
        file.write_all(json.as_bytes()).await?;
        file.write_all(b"\n").await?;
    }

    file.flush().await?;
    Ok(())
}
