use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

// Re-export commonly used test types
pub use email_ingestion::email_ingester::{EmailIngester, EmailIngesterConfig};
pub use email_ingestion::session::{MailboxConnector, MailboxSession};

/// Build a minimal RFC822 message.
pub fn raw_email(from: &str, subject: &str) -> Vec<u8> {
    format!(
        "From: {}\r\nTo: me@example.com\r\nSubject: {}\r\nMessage-ID: <{}@test>\r\n\r\nHello.\r\n",
        from,
        subject,
        subject.replace(' ', "-")
    )
    .into_bytes()
}

pub fn test_config() -> EmailIngesterConfig {
    EmailIngesterConfig::new("imap.test", "me@example.com", "secret")
}

#[derive(Default)]
struct MailboxState {
    messages: BTreeMap<u32, Option<Vec<u8>>>,
    refuse_connections: bool,
    broken_fetches: HashSet<u32>,
    fetched: Vec<u32>,
    logouts: usize,
}

/// In-memory mailbox standing in for an IMAP server.
#[derive(Clone, Default)]
pub struct FakeMailbox {
    state: Arc<Mutex<MailboxState>>,
}

impl FakeMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(self, uid: u32, raw: Vec<u8>) -> Self {
        self.state.lock().unwrap().messages.insert(uid, Some(raw));
        self
    }

    /// A message the server lists but returns no body for.
    pub fn with_empty_message(self, uid: u32) -> Self {
        self.state.lock().unwrap().messages.insert(uid, None);
        self
    }

    pub fn refusing_connections(self) -> Self {
        self.state.lock().unwrap().refuse_connections = true;
        self
    }

    pub fn breaking_fetch_of(self, uid: u32) -> Self {
        self.state.lock().unwrap().broken_fetches.insert(uid);
        self
    }

    pub fn fetched(&self) -> Vec<u32> {
        self.state.lock().unwrap().fetched.clone()
    }

    pub fn logouts(&self) -> usize {
        self.state.lock().unwrap().logouts
    }

    pub fn connector(&self) -> Arc<dyn MailboxConnector> {
        Arc::new(self.clone())
    }
}

impl MailboxConnector for FakeMailbox {
    fn open(&self, _config: &EmailIngesterConfig) -> Result<Box<dyn MailboxSession>> {
        if self.state.lock().unwrap().refuse_connections {
            return Err(anyhow!("Login failed: authentication rejected"));
        }
        Ok(Box::new(FakeSession {
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeSession {
    state: Arc<Mutex<MailboxState>>,
}

impl MailboxSession for FakeSession {
    fn list_uids(&mut self) -> Result<Vec<u32>> {
        Ok(self.state.lock().unwrap().messages.keys().copied().collect())
    }

    fn fetch_message(&mut self, uid: u32) -> Result<Option<Vec<u8>>> {
        let mut state = self.state.lock().unwrap();
        if state.broken_fetches.contains(&uid) {
            return Err(anyhow!("UID FETCH failed: connection lost"));
        }
        state.fetched.push(uid);
        Ok(state.messages.get(&uid).cloned().flatten())
    }

    fn logout(&mut self) -> Result<()> {
        self.state.lock().unwrap().logouts += 1;
        Ok(())
    }
}
