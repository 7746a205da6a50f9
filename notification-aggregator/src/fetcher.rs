use std::time::{Duration, Instant};

use backoff::{backoff::Backoff, ExponentialBackoff};
use chrono::{DateTime, Utc};
use reqwest::{header, Client, StatusCode};
use tracing::{debug, info, warn};
use url::Url;

use crate::types::{AggregatorError, FetchConfig, GithubConfig, Result};

#[derive(Debug, Clone)]
pub struct FetchResult {
    pub fetch_time: DateTime<Utc>,
    pub response_time_ms: u64,
    pub http_status: u16,
    pub body: String,
}

/// HTTP side of the feed adapter: one bounded, authenticated read per call.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// `GET {api_base}/notifications`, retrying transport errors, 5xx and 429
    /// responses with exponential backoff.
    pub async fn fetch_notifications(&self, github: &GithubConfig) -> Result<FetchResult> {
        let url = notifications_url(&github.api_base, self.config.page_size)?;
        let start_time = Instant::now();
        let fetch_time = Utc::now();

        debug!("Fetching notifications for {} from {}", github.username, url);

        let delay = Duration::from_millis(self.config.retry_delay_ms);
        let mut backoff = ExponentialBackoff {
            current_interval: delay,
            initial_interval: delay,
            max_interval: delay * 8,
            multiplier: 2.0,
            max_elapsed_time: Some(delay * 30),
            ..Default::default()
        };

        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            let retryable = match self.send(&url, &github.token).await {
                Ok((status, body)) if status.is_success() => {
                    let response_time_ms = start_time.elapsed().as_millis() as u64;
                    info!("Fetched notifications ({} bytes in {}ms)", body.len(), response_time_ms);
                    return Ok(FetchResult {
                        fetch_time,
                        response_time_ms,
                        http_status: status.as_u16(),
                        body,
                    });
                }
                Ok((status, _)) => {
                    last_error = Some(AggregatorError::HttpStatus {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
                }
                Err(e) => {
                    last_error = Some(e);
                    true
                }
            };

            if !retryable || attempt == self.config.max_retries {
                break;
            }
            match backoff.next_backoff() {
                Some(wait) => {
                    warn!("Attempt {} failed for {}, retrying in {:?}", attempt + 1, url, wait);
                    tokio::time::sleep(wait).await;
                }
                None => break,
            }
        }

        Err(last_error.unwrap_or_else(|| AggregatorError::General(format!("No response from {}", url))))
    }

    async fn send(&self, url: &Url, token: &str) -> Result<(StatusCode, String)> {
        let response = self
            .client
            .get(url.clone())
            .header(header::AUTHORIZATION, format!("token {}", token))
            .header(header::ACCEPT, "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }
}

fn notifications_url(api_base: &str, page_size: u32) -> Result<Url> {
    // Keep any path prefix (e.g. an enterprise `/api/v3`) when joining.
    let base = if api_base.ends_with('/') {
        Url::parse(api_base)?
    } else {
        Url::parse(&format!("{}/", api_base))?
    };
    let mut url = base.join("notifications")?;
    url.query_pairs_mut().append_pair("per_page", &page_size.to_string());
    Ok(url)
}
