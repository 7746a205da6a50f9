use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use interfaces::defs::{SeenIds, SourceKind};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::storage::{read_json, write_json_atomic, LoadOutcome};
use crate::types::Result;

/// Seen item ids for every source, keyed by the source's state key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupState {
    sources: BTreeMap<String, SeenIds>,
}

impl DedupState {
    pub fn seen(&self, kind: SourceKind) -> SeenIds {
        self.sources.get(kind.state_key()).cloned().unwrap_or_default()
    }

    pub fn len(&self, kind: SourceKind) -> usize {
        self.sources.get(kind.state_key()).map_or(0, SeenIds::len)
    }

    /// Union `seen` into the source's set. Sets only ever grow.
    pub fn merge(&mut self, kind: SourceKind, seen: SeenIds) {
        self.sources
            .entry(kind.state_key().to_string())
            .or_default()
            .extend(seen);
    }

    fn from_value(value: Value) -> Self {
        let mut sources = BTreeMap::new();
        let Value::Object(map) = value else {
            warn!("State record is not an object, ignoring it");
            return Self { sources };
        };

        for (key, ids) in map {
            let Value::Array(ids) = ids else {
                warn!("State entry '{}' is not a list, ignoring it", key);
                continue;
            };
            let seen: SeenIds = ids
                .into_iter()
                .filter_map(|id| match id {
                    Value::String(s) => Some(s),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect();
            sources.insert(key, seen);
        }

        Self { sources }
    }

    fn to_value(&self) -> Value {
        let map: Map<String, Value> = self
            .sources
            .iter()
            .map(|(key, seen)| {
                let ids = seen.to_sorted_vec().into_iter().map(Value::String).collect();
                (key.clone(), Value::Array(ids))
            })
            .collect();
        Value::Object(map)
    }
}

/// Durable home of the dedup state, one JSON file.
pub struct DedupStore {
    path: PathBuf,
}

impl DedupStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Never fails; a missing or corrupt record yields an empty state.
    pub async fn load(&self) -> (DedupState, LoadOutcome) {
        let (value, outcome) = read_json(&self.path).await;
        let state = value.map(DedupState::from_value).unwrap_or_default();
        (state, outcome)
    }

    pub async fn save(&self, state: &DedupState) -> Result<()> {
        write_json_atomic(&self.path, &state.to_value()).await?;
        info!(
            "Saved dedup state to {:?} (feed: {}, mailbox: {})",
            self.path,
            state.len(SourceKind::Feed),
            state.len(SourceKind::Mailbox)
        );
        Ok(())
    }
}
