pub mod classify;
pub mod email_ingester;
pub mod session;

pub use classify::MailRules;
pub use email_ingester::{EmailIngester, EmailIngesterConfig};
pub use session::{ImapConnector, MailboxConnector, MailboxSession};
