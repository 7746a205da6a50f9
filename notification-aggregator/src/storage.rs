use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::types::{AggregatorError, Result};

/// How a durable record came to be in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    /// No record yet, the normal first run.
    Missing,
    /// The record's contents were corrupt; started over from empty.
    Recovered(String),
    /// The file exists but reading it failed (permissions, I/O). Its
    /// contents are unknown, so it must not be overwritten blindly.
    Unreadable(String),
}

impl fmt::Display for LoadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadOutcome::Loaded => f.write_str("loaded"),
            LoadOutcome::Missing => f.write_str("missing"),
            LoadOutcome::Recovered(reason) => write!(f, "recovered empty ({})", reason),
            LoadOutcome::Unreadable(reason) => write!(f, "unreadable ({})", reason),
        }
    }
}

/// Read a JSON record, never failing: missing or unreadable files yield `None`
/// together with the reason.
pub async fn read_json(path: &Path) -> (Option<Value>, LoadOutcome) {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No record at {:?}", path);
            return (None, LoadOutcome::Missing);
        }
        Err(e) => {
            warn!("Failed to read {:?}, starting from empty: {}", path, e);
            return (None, LoadOutcome::Unreadable(e.to_string()));
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => (Some(value), LoadOutcome::Loaded),
        Err(e) => {
            warn!("Corrupt record at {:?}, starting from empty: {}", path, e);
            (None, LoadOutcome::Recovered(e.to_string()))
        }
    }
}

/// Write a JSON record so that readers only ever see the old or the new
/// contents: write a sibling temp file, flush it to disk, rename over.
pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let persist_err = |source| AggregatorError::Persist {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(persist_err)?;
    }

    let temp_path = temp_path_for(path);
    let mut file = tokio::fs::File::create(&temp_path).await.map_err(persist_err)?;
    file.write_all(json.as_bytes()).await.map_err(persist_err)?;
    file.sync_all().await.map_err(persist_err)?;
    drop(file);

    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(persist_err(e));
    }

    debug!("Persisted {:?} ({} bytes)", path, json.len());
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "record".into());
    name.push(".tmp");
    path.with_file_name(name)
}
