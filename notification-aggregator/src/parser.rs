use interfaces::defs::FeedCandidate;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::types::{AggregatorError, Result};

#[derive(Debug, Deserialize)]
struct RawNotification {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    repository: Option<RawRepository>,
    #[serde(default)]
    subject: Option<RawSubject>,
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    #[serde(default)]
    full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSubject {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

/// Lift the notifications payload into candidates, keeping the order the API
/// returned them in. Entries without an id are dropped.
pub fn parse_notifications(body: &str) -> Result<Vec<FeedCandidate>> {
    let items: Vec<Value> = serde_json::from_str(body)
        .map_err(|e| AggregatorError::Parse(format!("Notifications payload is not a list: {}", e)))?;

    let mut candidates = Vec::with_capacity(items.len());
    for item in items {
        let raw: RawNotification = match serde_json::from_value(item) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("Skipping malformed notification: {}", e);
                continue;
            }
        };

        let id = match raw.id {
            Some(Value::String(id)) if !id.is_empty() => id,
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                debug!("Skipping notification without id");
                continue;
            }
        };

        let repository = raw
            .repository
            .and_then(|r| r.full_name)
            .unwrap_or_else(|| "repo".to_string());
        let (title, subject_type) = match raw.subject {
            Some(subject) => (subject.title.unwrap_or_default(), subject.kind.unwrap_or_default()),
            None => (String::new(), String::new()),
        };

        candidates.push(FeedCandidate {
            id,
            repository,
            subject_type,
            title,
        });
    }

    Ok(candidates)
}
