use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::storage::{read_json, write_json_atomic, LoadOutcome};
use crate::types::{AggregatorError, Result};

/// A chat that receives forwarded notifications. Numeric ids are what the
/// Telegram front-end records; `@channel` style names are accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum DeliveryTarget {
    Chat(i64),
    Named(String),
}

impl FromStr for DeliveryTarget {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s.parse::<i64>() {
            Ok(id) => DeliveryTarget::Chat(id),
            Err(_) => DeliveryTarget::Named(s.to_string()),
        })
    }
}

// A chat id stored as a string ("42") is the same chat as 42.
impl<'de> Deserialize<'de> for DeliveryTarget {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Stored {
            Chat(i64),
            Named(String),
        }

        Ok(match Stored::deserialize(deserializer)? {
            Stored::Chat(id) => DeliveryTarget::Chat(id),
            Stored::Named(name) => match name.parse() {
                Ok(target) => target,
                Err(never) => match never {},
            },
        })
    }
}

impl fmt::Display for DeliveryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryTarget::Chat(id) => write!(f, "{}", id),
            DeliveryTarget::Named(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Added,
    AlreadyRegistered,
}

/// Append-only list of delivery targets, kept in one JSON file.
pub struct TargetRegistry {
    path: PathBuf,
}

impl TargetRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Registered targets in registration order. Never fails; a missing,
    /// corrupt or unreadable record yields no targets.
    pub async fn load(&self) -> (Vec<DeliveryTarget>, LoadOutcome) {
        let (entries, outcome) = self.load_entries().await;
        let mut targets: Vec<DeliveryTarget> = Vec::with_capacity(entries.len());
        for entry in entries {
            match serde_json::from_value::<DeliveryTarget>(entry) {
                Ok(target) if !targets.contains(&target) => targets.push(target),
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable target in {:?}: {}", self.path, e),
            }
        }
        (targets, outcome)
    }

    /// Add a target if absent and persist right away, so the next cycle
    /// delivers to it.
    ///
    /// Entries already on disk are written back untouched, including ones
    /// this version cannot interpret. A file that exists but cannot be read
    /// is an error rather than being replaced.
    pub async fn register(&self, target: DeliveryTarget) -> Result<Registration> {
        let (mut entries, outcome) = self.load_entries().await;
        match &outcome {
            LoadOutcome::Unreadable(reason) => {
                return Err(AggregatorError::Unreadable {
                    path: self.path.clone(),
                    reason: reason.clone(),
                });
            }
            LoadOutcome::Recovered(reason) => {
                warn!("Rewriting corrupt target registry {:?} ({})", self.path, reason);
            }
            LoadOutcome::Loaded | LoadOutcome::Missing => {}
        }

        let known = entries
            .iter()
            .any(|entry| serde_json::from_value::<DeliveryTarget>(entry.clone()).is_ok_and(|t| t == target));
        if known {
            return Ok(Registration::AlreadyRegistered);
        }

        entries.push(serde_json::to_value(&target)?);
        write_json_atomic(&self.path, &entries).await?;
        info!("Registered delivery target {} ({} entries)", target, entries.len());
        Ok(Registration::Added)
    }

    pub async fn is_registered(&self, target: &DeliveryTarget) -> bool {
        self.load().await.0.contains(target)
    }

    /// Raw list entries as stored.
    async fn load_entries(&self) -> (Vec<Value>, LoadOutcome) {
        match read_json(&self.path).await {
            (Some(Value::Array(entries)), outcome) => (entries, outcome),
            (Some(_), _) => {
                warn!("Target registry {:?} is not a list, ignoring it", self.path);
                (Vec::new(), LoadOutcome::Recovered("not a list".to_string()))
            }
            (None, outcome) => (Vec::new(), outcome),
        }
    }
}
