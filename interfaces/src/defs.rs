use std::collections::HashSet;
use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Feed,
    Mailbox,
}

impl SourceKind {
    /// Key under which this source's seen ids live in the state record.
    pub fn state_key(self) -> &'static str {
        match self {
            SourceKind::Feed => "github_notif_ids",
            SourceKind::Mailbox => "email_uids",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Feed => "feed",
            SourceKind::Mailbox => "mailbox",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Classification {
    Feed,
    /// Mail from or about the freelance marketplace.
    MarketplaceMail,
    /// Mail sent by the code host.
    CodeHostMail,
}

impl Classification {
    pub fn tag(self) -> &'static str {
        match self {
            Classification::Feed => "feed",
            Classification::MarketplaceMail => "mailbox-marketplace",
            Classification::CodeHostMail => "mailbox-code-host",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventSummary {
    Feed {
        repository: String,
        subject_type: String,
        title: String,
    },
    Mail {
        from: String,
        subject: String,
    },
}

/// A newly observed item on its way to the delivery targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationEvent {
    pub source: SourceKind,
    pub item_id: String,
    pub classification: Classification,
    pub summary: EventSummary,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedCandidate {
    pub id: String,
    pub repository: String,
    pub subject_type: String,
    pub title: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailCandidate {
    pub uid: String,
    pub from: String,
    pub subject: String,
}

/// An item fetched from a source, already lifted out of the source's wire format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Candidate {
    Feed(FeedCandidate),
    Mail(MailCandidate),
}

impl Candidate {
    pub fn item_id(&self) -> &str {
        match self {
            Candidate::Feed(c) => &c.id,
            Candidate::Mail(c) => &c.uid,
        }
    }

    pub fn source(&self) -> SourceKind {
        match self {
            Candidate::Feed(_) => SourceKind::Feed,
            Candidate::Mail(_) => SourceKind::Mailbox,
        }
    }

    pub fn into_event(self, classification: Classification) -> NotificationEvent {
        let source = self.source();
        match self {
            Candidate::Feed(c) => NotificationEvent {
                source,
                item_id: c.id,
                classification,
                summary: EventSummary::Feed {
                    repository: c.repository,
                    subject_type: c.subject_type,
                    title: c.title,
                },
            },
            Candidate::Mail(c) => NotificationEvent {
                source,
                item_id: c.uid,
                classification,
                summary: EventSummary::Mail {
                    from: c.from,
                    subject: c.subject,
                },
            },
        }
    }
}

/// Item identifiers already delivered or already judged uninteresting.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SeenIds(HashSet<String>);

impl SeenIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    /// Returns true when the id was not already present.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.0.insert(id.into())
    }

    pub fn extend(&mut self, other: SeenIds) {
        self.0.extend(other.0);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    /// Ids in a stable order, for writing the state record.
    pub fn to_sorted_vec(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.0.iter().cloned().collect();
        ids.sort();
        ids
    }
}

impl<S: Into<String>> FromIterator<S> for SeenIds {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// What one source produced in one cycle.
#[derive(Clone, Debug)]
pub struct PollOutcome {
    pub events: Vec<NotificationEvent>,
    /// Prior ids plus everything this poll looked at.
    pub seen: SeenIds,
}

impl PollOutcome {
    pub fn starting_from(prior: &SeenIds) -> Self {
        Self {
            events: Vec::new(),
            seen: prior.clone(),
        }
    }

    /// Marks the candidate seen and queues an event for it when it was
    /// classified as worth forwarding.
    pub fn record(&mut self, candidate: Candidate, classification: Option<Classification>) {
        self.seen.insert(candidate.item_id());
        if let Some(classification) = classification {
            self.events.push(candidate.into_event(classification));
        }
    }
}

// Object style note:
// Adapters are built once per cycle from injected configuration and hold no
// state of their own between polls. Everything they need to know about the
// past arrives through the `prior` argument.

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Fetch a bounded batch from the source and classify whatever is new.
    ///
    /// Errors are reported to the caller, which keeps `prior` unchanged for
    /// this source and carries on with the rest of the cycle.
    async fn poll(&self, prior: &SeenIds) -> Result<PollOutcome>;
}
