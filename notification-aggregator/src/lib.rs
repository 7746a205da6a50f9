pub mod types;
pub mod storage;
pub mod state;
pub mod registry;
pub mod fetcher;
pub mod parser;
pub mod sources;
pub mod message;
pub mod dispatcher;
pub mod telegram;
pub mod config;
pub mod aggregator;

pub use types::*;
pub use aggregator::{CycleReport, NotificationAggregator, SourceReport, SourceStatus};
pub use config::AppConfig;
pub use dispatcher::{DeliveryOutcome, Dispatcher, PushChannel, TargetDelivery};
pub use fetcher::Fetcher;
pub use registry::{DeliveryTarget, Registration, TargetRegistry};
pub use sources::GithubFeedSource;
pub use state::{DedupState, DedupStore};
pub use storage::LoadOutcome;
pub use telegram::TelegramChannel;
