use std::net::{TcpStream, ToSocketAddrs};

use anyhow::{anyhow, Context, Result};
use native_tls::{TlsConnector, TlsStream};
use tracing::debug;

use crate::email_ingester::EmailIngesterConfig;

/// An authenticated session with the configured mailbox selected.
pub trait MailboxSession {
    /// UIDs of every message in the mailbox, ascending.
    fn list_uids(&mut self) -> Result<Vec<u32>>;

    /// Full RFC822 bytes of one message, `None` when the server sent no body.
    fn fetch_message(&mut self, uid: u32) -> Result<Option<Vec<u8>>>;

    fn logout(&mut self) -> Result<()>;
}

pub trait MailboxConnector: Send + Sync {
    /// Connect, log in and select the configured mailbox.
    fn open(&self, config: &EmailIngesterConfig) -> Result<Box<dyn MailboxSession>>;
}

/// Talks to a real IMAP server over TLS (implicit or STARTTLS).
pub struct ImapConnector;

impl MailboxConnector for ImapConnector {
    fn open(&self, config: &EmailIngesterConfig) -> Result<Box<dyn MailboxSession>> {
        let tls = TlsConnector::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .danger_accept_invalid_hostnames(config.accept_invalid_hostnames)
            .build()?;

        let tcp = connect_with_timeout(config)?;

        let client = if config.use_tls {
            let stream = tls
                .connect(&config.server, tcp)
                .map_err(|e| anyhow!("TLS handshake with {} failed: {}", config.server, e))?;
            let mut client = imap::Client::new(stream);
            client.read_greeting().map_err(imap_error("Reading greeting"))?;
            client
        } else {
            let mut client = imap::Client::new(tcp);
            client.read_greeting().map_err(imap_error("Reading greeting"))?;
            client
                .secure(&config.server, &tls)
                .map_err(imap_error("STARTTLS"))?
        };

        let mut session = client
            .login(&config.username, &config.password)
            .map_err(|(e, _)| anyhow!("Login failed for {}: {}", config.username, e))?;
        session
            .select(&config.mailbox)
            .map_err(imap_error("SELECT"))?;

        debug!("Opened IMAP session on {}:{}/{}", config.server, config.port, config.mailbox);
        Ok(Box::new(ImapSession { session }))
    }
}

struct ImapSession {
    session: imap::Session<TlsStream<TcpStream>>,
}

impl MailboxSession for ImapSession {
    fn list_uids(&mut self) -> Result<Vec<u32>> {
        let uids = self.session.uid_search("ALL").map_err(imap_error("UID SEARCH"))?;
        let mut uids: Vec<u32> = uids.into_iter().collect();
        uids.sort_unstable();
        Ok(uids)
    }

    fn fetch_message(&mut self, uid: u32) -> Result<Option<Vec<u8>>> {
        let fetches = self
            .session
            .uid_fetch(uid.to_string(), "RFC822")
            .map_err(imap_error("UID FETCH"))?;
        Ok(fetches.iter().find_map(|fetch| fetch.body()).map(|body| body.to_vec()))
    }

    fn logout(&mut self) -> Result<()> {
        self.session.logout().map_err(imap_error("LOGOUT"))
    }
}

fn imap_error(step: &'static str) -> impl FnOnce(imap::Error) -> anyhow::Error {
    move |e| anyhow!("{} failed: {}", step, e)
}

fn connect_with_timeout(config: &EmailIngesterConfig) -> Result<TcpStream> {
    let addrs = (config.server.as_str(), config.port)
        .to_socket_addrs()
        .with_context(|| format!("Resolving {}:{}", config.server, config.port))?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, config.timeout) {
            Ok(stream) => {
                stream.set_read_timeout(Some(config.timeout))?;
                stream.set_write_timeout(Some(config.timeout))?;
                return Ok(stream);
            }
            Err(e) => last_error = Some(e),
        }
    }

    match last_error {
        Some(e) => Err(anyhow!("Connecting to {}:{} failed: {}", config.server, config.port, e)),
        None => Err(anyhow!("No address found for {}", config.server)),
    }
}
