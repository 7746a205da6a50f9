use std::sync::Arc;

use chrono::{DateTime, Utc};
use email_ingestion::EmailIngester;
use interfaces::defs::{SourceAdapter, SourceKind};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::dispatcher::{DeliveryOutcome, Dispatcher, PushChannel};
use crate::registry::TargetRegistry;
use crate::sources::GithubFeedSource;
use crate::state::DedupStore;
use crate::storage::LoadOutcome;
use crate::telegram::TelegramChannel;
use crate::types::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    Polled,
    /// The adapter failed; its prior ids were kept as they were.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source: SourceKind,
    pub status: SourceStatus,
    pub events: usize,
    pub delivered: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl SourceReport {
    fn new(source: SourceKind) -> Self {
        Self {
            source,
            status: SourceStatus::Polled,
            events: 0,
            delivered: 0,
            failed: 0,
            skipped: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub targets: usize,
    pub sources: Vec<SourceReport>,
}

impl CycleReport {
    pub fn events(&self) -> usize {
        self.sources.iter().map(|s| s.events).sum()
    }

    pub fn delivered(&self) -> usize {
        self.sources.iter().map(|s| s.delivered).sum()
    }

    pub fn failed(&self) -> usize {
        self.sources.iter().map(|s| s.failed).sum()
    }

    pub fn skipped(&self) -> usize {
        self.sources.iter().map(|s| s.skipped).sum()
    }

    pub fn source(&self, kind: SourceKind) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.source == kind)
    }

    pub fn log(&self) {
        let elapsed = self.finished_at - self.started_at;
        info!(
            "Cycle {} finished in {}ms: {} events, {} delivered, {} failed, {} skipped across {} targets",
            self.cycle_id,
            elapsed.num_milliseconds(),
            self.events(),
            self.delivered(),
            self.failed(),
            self.skipped(),
            self.targets
        );
        for report in &self.sources {
            match &report.status {
                SourceStatus::Polled => info!(
                    "  {}: {} events, {} delivered, {} failed, {} skipped",
                    report.source, report.events, report.delivered, report.failed, report.skipped
                ),
                SourceStatus::Failed(reason) => warn!("  {}: failed ({})", report.source, reason),
            }
        }
    }
}

/// Runs poll cycles: every source in turn, then one durable state write.
pub struct NotificationAggregator {
    sources: Vec<Box<dyn SourceAdapter>>,
    dispatcher: Dispatcher,
    state_store: DedupStore,
    registry: TargetRegistry,
}

impl NotificationAggregator {
    pub fn new(channel: Arc<dyn PushChannel>, state_store: DedupStore, registry: TargetRegistry) -> Self {
        Self {
            sources: Vec::new(),
            dispatcher: Dispatcher::new(channel),
            state_store,
            registry,
        }
    }

    /// Sources are polled in the order they are added.
    pub fn with_source(mut self, source: Box<dyn SourceAdapter>) -> Self {
        self.sources.push(source);
        self
    }

    /// Wire up the feed and mailbox sources, each only when its credentials
    /// are configured, and the Telegram channel.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let channel = Arc::new(TelegramChannel::new(config.telegram.clone())?);
        let mut aggregator = Self::new(
            channel,
            DedupStore::new(&config.state_file),
            TargetRegistry::new(&config.chat_ids_file),
        );

        match &config.github {
            Some(github) => {
                let feed = GithubFeedSource::new(github.clone(), config.fetch.clone())?;
                aggregator = aggregator.with_source(Box::new(feed));
            }
            None => info!("GitHub credentials not set, feed source disabled"),
        }

        match &config.email {
            Some(email) => {
                aggregator = aggregator.with_source(Box::new(EmailIngester::with_config(email.clone())));
            }
            None => info!("IMAP credentials not set, mailbox source disabled"),
        }

        Ok(aggregator)
    }

    pub fn source_kinds(&self) -> Vec<SourceKind> {
        self.sources.iter().map(|s| s.kind()).collect()
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// One full poll cycle. Source and delivery failures are contained and
    /// reported; only a failure to persist the updated state is returned as
    /// an error.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let cycle_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!("Starting cycle {} with {} sources", cycle_id, self.sources.len());

        let (mut state, state_outcome) = self.state_store.load().await;
        log_load("dedup state", &state_outcome);
        let (targets, registry_outcome) = self.registry.load().await;
        log_load("target registry", &registry_outcome);

        let mut reports = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let kind = source.kind();
            let mut report = SourceReport::new(kind);
            let prior = state.seen(kind);

            let outcome = match source.poll(&prior).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("{} source failed, keeping its {} known ids: {:#}", kind, prior.len(), e);
                    report.status = SourceStatus::Failed(format!("{:#}", e));
                    reports.push(report);
                    continue;
                }
            };

            report.events = outcome.events.len();
            for event in &outcome.events {
                for delivery in self.dispatcher.dispatch(event, &targets).await {
                    match delivery.outcome {
                        DeliveryOutcome::Delivered => report.delivered += 1,
                        DeliveryOutcome::Failed(_) => report.failed += 1,
                        DeliveryOutcome::Skipped => report.skipped += 1,
                    }
                }
            }

            state.merge(kind, outcome.seen);
            reports.push(report);
        }

        if let Err(e) = self.state_store.save(&state).await {
            error!("Cycle {} could not persist dedup state: {}", cycle_id, e);
            return Err(e);
        }

        Ok(CycleReport {
            cycle_id,
            started_at,
            finished_at: Utc::now(),
            targets: targets.len(),
            sources: reports,
        })
    }
}

fn log_load(what: &str, outcome: &LoadOutcome) {
    match outcome {
        LoadOutcome::Loaded => {}
        LoadOutcome::Missing => info!("No {} on disk yet, starting empty", what),
        LoadOutcome::Recovered(reason) => warn!("Corrupt {} ({}), starting empty", what, reason),
        LoadOutcome::Unreadable(reason) => warn!("Unreadable {} ({}), starting empty", what, reason),
    }
}
