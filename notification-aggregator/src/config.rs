use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use email_ingestion::email_ingester::EmailIngesterConfig;

use crate::types::{
    AggregatorError, FetchConfig, GithubConfig, Result, TelegramConfig, DEFAULT_GITHUB_API, DEFAULT_TELEGRAM_API,
};

/// Everything a poll cycle needs, loaded from environment variables.
///
/// A source whose credentials are absent is simply not polled.
#[derive(Clone)]
pub struct AppConfig {
    pub state_file: PathBuf,
    pub chat_ids_file: PathBuf,
    pub fetch: FetchConfig,
    pub github: Option<GithubConfig>,
    pub telegram: TelegramConfig,
    pub email: Option<EmailIngesterConfig>,
}

impl AppConfig {
    /// Load configuration from the process environment, after reading `.env`
    /// if one exists.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset.
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let timeout_seconds: u64 = parse_or(get("HTTP_TIMEOUT_SECONDS"), "HTTP_TIMEOUT_SECONDS", 10)?;
        if timeout_seconds == 0 {
            return Err(AggregatorError::Config("HTTP_TIMEOUT_SECONDS must be greater than zero".to_string()));
        }

        let fetch = FetchConfig {
            timeout_seconds,
            max_retries: parse_or(get("FETCH_MAX_RETRIES"), "FETCH_MAX_RETRIES", 1)?,
            page_size: parse_or(get("GITHUB_PAGE_SIZE"), "GITHUB_PAGE_SIZE", 50)?,
            ..FetchConfig::default()
        };

        let github = match (get("GITHUB_TOKEN"), get("GITHUB_USERNAME")) {
            (Some(token), Some(username)) => Some(GithubConfig {
                api_base: get("GITHUB_API_BASE").unwrap_or_else(|| DEFAULT_GITHUB_API.to_string()),
                token,
                username,
            }),
            _ => None,
        };

        let telegram = TelegramConfig {
            api_base: get("TELEGRAM_API_BASE").unwrap_or_else(|| DEFAULT_TELEGRAM_API.to_string()),
            bot_token: get("TELEGRAM_BOT_TOKEN"),
            timeout_seconds,
        };

        let email = match email_config(&get)? {
            Some(mut email) => {
                email.timeout = Duration::from_secs(timeout_seconds);
                if let Some(senders) = get("MAIL_MARKETPLACE_SENDERS") {
                    email.rules.marketplace_senders = split_list(&senders);
                }
                if let Some(subjects) = get("MAIL_MARKETPLACE_SUBJECTS") {
                    email.rules.marketplace_subjects = split_list(&subjects);
                }
                if let Some(senders) = get("MAIL_CODE_HOST_SENDERS") {
                    email.rules.code_host_senders = split_list(&senders);
                }
                Some(email)
            }
            None => None,
        };

        Ok(Self {
            state_file: get("STATE_FILE").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("state.json")),
            chat_ids_file: get("CHAT_IDS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("chat_ids.json")),
            fetch,
            github,
            telegram,
            email,
        })
    }
}

/// Mailbox settings come either from `IMAP_URI` or from the separate
/// `IMAP_HOST`/`IMAP_USER` variables; `IMAP_PASS` is required in both cases.
fn email_config<G>(get: &G) -> Result<Option<EmailIngesterConfig>>
where
    G: Fn(&str) -> Option<String>,
{
    let Some(password) = get("IMAP_PASS") else {
        return Ok(None);
    };

    let mut config = if let Some(uri) = get("IMAP_URI") {
        EmailIngesterConfig::from_uri(&uri, &password)
            .map_err(|e| AggregatorError::Config(format!("IMAP_URI: {}", e)))?
    } else {
        match (get("IMAP_HOST"), get("IMAP_USER")) {
            (Some(host), Some(user)) => {
                let mut config = EmailIngesterConfig::new(host, user, password);
                config.port = parse_or(get("IMAP_PORT"), "IMAP_PORT", config.port)?;
                if let Some(mailbox) = get("IMAP_MAILBOX") {
                    config.mailbox = mailbox;
                }
                config
            }
            _ => return Ok(None),
        }
    };

    config.tail_limit = parse_or(get("IMAP_TAIL"), "IMAP_TAIL", config.tail_limit)?;
    Ok(Some(config))
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|_| AggregatorError::Config(format!("{} has an invalid value '{}'", key, raw))),
        None => Ok(default),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_credentials() {
        let config = load(&[]).unwrap();
        assert!(config.github.is_none());
        assert!(config.email.is_none());
        assert!(config.telegram.bot_token.is_none());
        assert_eq!(config.state_file, PathBuf::from("state.json"));
        assert_eq!(config.chat_ids_file, PathBuf::from("chat_ids.json"));
        assert_eq!(config.fetch.timeout_seconds, 10);
        assert_eq!(config.fetch.page_size, 50);
    }

    #[test]
    fn github_needs_token_and_username() {
        let config = load(&[("GITHUB_TOKEN", "t")]).unwrap();
        assert!(config.github.is_none());

        let config = load(&[("GITHUB_TOKEN", "t"), ("GITHUB_USERNAME", "octo")]).unwrap();
        let github = config.github.unwrap();
        assert_eq!(github.api_base, DEFAULT_GITHUB_API);
        assert_eq!(github.username, "octo");
    }

    #[test]
    fn mailbox_from_separate_variables() {
        let config = load(&[
            ("IMAP_HOST", "imap.example.com"),
            ("IMAP_USER", "me@example.com"),
            ("IMAP_PASS", "pw"),
            ("IMAP_TAIL", "200"),
            ("HTTP_TIMEOUT_SECONDS", "5"),
            ("MAIL_CODE_HOST_SENDERS", "github.com, gitlab.com"),
        ])
        .unwrap();

        let email = config.email.unwrap();
        assert_eq!(email.server, "imap.example.com");
        assert_eq!(email.port, 993);
        assert_eq!(email.mailbox, "INBOX");
        assert_eq!(email.tail_limit, 200);
        assert_eq!(email.timeout, Duration::from_secs(5));
        assert_eq!(email.rules.code_host_senders, vec!["github.com", "gitlab.com"]);
    }

    #[test]
    fn mailbox_from_uri() {
        let config = load(&[("IMAP_URI", "email://me@imap.example.com:1993/Jobs"), ("IMAP_PASS", "pw")]).unwrap();
        let email = config.email.unwrap();
        assert_eq!(email.port, 1993);
        assert_eq!(email.mailbox, "Jobs");
    }

    #[test]
    fn mailbox_without_password_is_disabled() {
        let config = load(&[("IMAP_HOST", "imap.example.com"), ("IMAP_USER", "me")]).unwrap();
        assert!(config.email.is_none());
    }

    #[test]
    fn malformed_numbers_are_errors() {
        assert!(matches!(
            load(&[("GITHUB_PAGE_SIZE", "fifty")]),
            Err(AggregatorError::Config(_))
        ));
        assert!(matches!(
            load(&[("HTTP_TIMEOUT_SECONDS", "0")]),
            Err(AggregatorError::Config(_))
        ));
    }
}
