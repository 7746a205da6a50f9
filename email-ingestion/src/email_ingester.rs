use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use interfaces::defs::{Candidate, MailCandidate, PollOutcome, SeenIds, SourceAdapter, SourceKind};
use mail_parser::{Addr, MessageParser};
use tracing::{debug, info, warn};
use url::Url;

use crate::classify::MailRules;
use crate::session::{ImapConnector, MailboxConnector};

pub const DEFAULT_IMAP_PORT: u16 = 993;
pub const DEFAULT_TAIL_LIMIT: usize = 50;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct EmailIngesterConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub mailbox: String,
    pub use_tls: bool,
    pub accept_invalid_certs: bool,
    pub accept_invalid_hostnames: bool,
    /// How many of the most recent messages one poll looks at.
    pub tail_limit: usize,
    /// Applied to connect, read and write on the IMAP socket.
    pub timeout: Duration,
    pub rules: MailRules,
}

impl EmailIngesterConfig {
    pub fn new(server: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            port: DEFAULT_IMAP_PORT,
            username: username.into(),
            password: password.into(),
            mailbox: "INBOX".to_string(),
            use_tls: true,
            accept_invalid_certs: false,
            accept_invalid_hostnames: false,
            tail_limit: DEFAULT_TAIL_LIMIT,
            timeout: DEFAULT_TIMEOUT,
            rules: MailRules::default(),
        }
    }

    /// Parse mailbox settings from a URI, with the password supplied separately.
    /// Expected URI format: email://username@server:port/mailbox?tls=true&tail=50
    pub fn from_uri(uri: &str, password: &str) -> Result<Self> {
        let parsed_uri = Url::parse(uri)
            .map_err(|e| anyhow::anyhow!("Invalid email URI '{}': {}", uri, e))?;

        if parsed_uri.scheme() != "email" {
            return Err(anyhow::anyhow!("URI must use 'email://' scheme, got: {}", parsed_uri.scheme()));
        }

        let server = parsed_uri.host_str()
            .ok_or_else(|| anyhow::anyhow!("No server specified in URI: {}", uri))?;

        let username = parsed_uri.username();
        if username.is_empty() {
            return Err(anyhow::anyhow!("No username in URI: {}", uri));
        }

        let mut config = Self::new(server, username, password);
        config.port = parsed_uri.port().unwrap_or(DEFAULT_IMAP_PORT);

        let path = parsed_uri.path().trim_start_matches('/');
        if !path.is_empty() {
            config.mailbox = path.to_string();
        }

        for (key, value) in parsed_uri.query_pairs() {
            match key.as_ref() {
                "tls" => config.use_tls = value.parse().unwrap_or(true),
                // Only meant for local test servers with self-signed certificates.
                "accept_invalid_certs" => config.accept_invalid_certs = value.parse().unwrap_or(false),
                "accept_invalid_hostnames" => config.accept_invalid_hostnames = value.parse().unwrap_or(false),
                "tail" => {
                    config.tail_limit = value.parse()
                        .map_err(|_| anyhow::anyhow!("tail must be a positive integer, got '{}'", value))?;
                }
                other => debug!("Ignoring unknown email URI parameter '{}'", other),
            }
        }

        Ok(config)
    }
}

/// Mailbox adapter: scans the newest messages and classifies the unseen ones.
pub struct EmailIngester {
    config: EmailIngesterConfig,
    connector: Arc<dyn MailboxConnector>,
}

impl EmailIngester {
    pub fn with_config(config: EmailIngesterConfig) -> Self {
        Self::with_connector(config, Arc::new(ImapConnector))
    }

    pub fn with_connector(config: EmailIngesterConfig, connector: Arc<dyn MailboxConnector>) -> Self {
        Self { config, connector }
    }

    pub fn config(&self) -> &EmailIngesterConfig {
        &self.config
    }
}

#[async_trait]
impl SourceAdapter for EmailIngester {
    fn kind(&self) -> SourceKind {
        SourceKind::Mailbox
    }

    async fn poll(&self, prior: &SeenIds) -> Result<PollOutcome> {
        let config = self.config.clone();
        let connector = Arc::clone(&self.connector);
        let prior = prior.clone();

        // The IMAP client blocks; keep it off the async workers.
        tokio::task::spawn_blocking(move || scan_mailbox(connector.as_ref(), &config, &prior))
            .await
            .map_err(|e| anyhow::anyhow!("Mailbox worker failed: {}", e))?
    }
}

fn scan_mailbox(connector: &dyn MailboxConnector, config: &EmailIngesterConfig, prior: &SeenIds) -> Result<PollOutcome> {
    let mut session = connector.open(config)?;

    let uids = match session.list_uids() {
        Ok(uids) => uids,
        Err(e) => {
            let _ = session.logout();
            return Err(e);
        }
    };
    let tail = recent_tail(uids, config.tail_limit);

    let mut outcome = PollOutcome::starting_from(prior);
    for uid in tail {
        let id = uid.to_string();
        if prior.contains(&id) {
            continue;
        }

        let raw = match session.fetch_message(uid) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                warn!("No body returned for message {}, will retry next cycle", uid);
                continue;
            }
            Err(e) => {
                let _ = session.logout();
                return Err(e);
            }
        };

        // An unparseable body will not parse next time either; record it with
        // empty headers so it is marked seen.
        let candidate = parse_message(&id, &raw).unwrap_or_else(|| {
            warn!("Could not parse message {}, marking it seen without headers", uid);
            MailCandidate {
                uid: id.clone(),
                from: String::new(),
                subject: String::new(),
            }
        });

        let classification = config.rules.classify(&candidate.from, &candidate.subject);
        debug!("Message {} from '{}' classified as {:?}", uid, candidate.from, classification);
        outcome.record(Candidate::Mail(candidate), classification);
    }

    if let Err(e) = session.logout() {
        warn!("IMAP logout failed: {}", e);
    }

    info!(
        "Mailbox {} yielded {} new events ({} ids seen)",
        config.mailbox,
        outcome.events.len(),
        outcome.seen.len()
    );
    Ok(outcome)
}

/// The `limit` highest UIDs, ascending.
fn recent_tail(mut uids: Vec<u32>, limit: usize) -> Vec<u32> {
    uids.sort_unstable();
    let skip = uids.len().saturating_sub(limit);
    uids.split_off(skip)
}

/// Lift sender and subject out of a raw message. Encoded words are decoded by
/// the parser; missing headers become empty strings.
pub fn parse_message(uid: &str, raw: &[u8]) -> Option<MailCandidate> {
    let parsed = MessageParser::default().parse(raw)?;

    let from = parsed.from()
        .and_then(|addrs| addrs.first())
        .map(format_sender)
        .unwrap_or_default();

    let subject = parsed.subject().unwrap_or("").to_string();

    Some(MailCandidate {
        uid: uid.to_string(),
        from,
        subject,
    })
}

fn format_sender(addr: &Addr) -> String {
    match (addr.name.as_deref(), addr.address.as_deref()) {
        (Some(name), Some(address)) => format!("{} <{}>", name, address),
        (None, Some(address)) => address.to_string(),
        (Some(name), None) => name.to_string(),
        (None, None) => String::new(),
    }
}
