use anyhow::Result;
use async_trait::async_trait;
use interfaces::defs::{Candidate, Classification, FeedCandidate, PollOutcome, SeenIds, SourceAdapter, SourceKind};
use tracing::info;

use crate::fetcher::Fetcher;
use crate::parser::parse_notifications;
use crate::types::{FetchConfig, GithubConfig};

/// Feed adapter over the GitHub notifications API.
pub struct GithubFeedSource {
    config: GithubConfig,
    fetcher: Fetcher,
}

impl GithubFeedSource {
    pub fn new(config: GithubConfig, fetch_config: FetchConfig) -> crate::types::Result<Self> {
        Ok(Self {
            config,
            fetcher: Fetcher::new(fetch_config)?,
        })
    }
}

#[async_trait]
impl SourceAdapter for GithubFeedSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Feed
    }

    async fn poll(&self, prior: &SeenIds) -> Result<PollOutcome> {
        let fetch_result = self.fetcher.fetch_notifications(&self.config).await?;
        let candidates = parse_notifications(&fetch_result.body)?;
        let found = candidates.len();

        let outcome = collect_new(prior, candidates);
        info!(
            "GitHub feed for {}: {} notifications, {} new",
            self.config.username,
            found,
            outcome.events.len()
        );
        Ok(outcome)
    }
}

/// One event per candidate not seen before, in the order given. Ids already
/// known stay known even when the feed no longer lists them.
pub fn collect_new(prior: &SeenIds, candidates: Vec<FeedCandidate>) -> PollOutcome {
    let mut outcome = PollOutcome::starting_from(prior);
    for candidate in candidates {
        if outcome.seen.contains(&candidate.id) {
            continue;
        }
        outcome.record(Candidate::Feed(candidate), Some(Classification::Feed));
    }
    outcome
}
