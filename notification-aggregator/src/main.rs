use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use notification_aggregator::{AppConfig, DeliveryTarget, NotificationAggregator, Registration, TargetRegistry};
use tracing::info;

#[derive(Parser)]
#[command(name = "notification-aggregator", about = "Forward GitHub and mailbox notifications to Telegram chats")]
struct Cli {
    /// Dedup state file (overrides STATE_FILE)
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    /// Delivery target registry (overrides CHAT_IDS_FILE)
    #[arg(long, global = true)]
    chat_ids_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one poll cycle
    Poll,
    /// Register a chat to receive notifications
    Register {
        #[arg(allow_hyphen_values = true)]
        target: DeliveryTarget,
    },
    /// Report whether a chat is registered
    Status {
        #[arg(allow_hyphen_values = true)]
        target: DeliveryTarget,
    },
    /// List registered chats
    Targets,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("Failed to load configuration")?;
    if let Some(path) = cli.state_file {
        config.state_file = path;
    }
    if let Some(path) = cli.chat_ids_file {
        config.chat_ids_file = path;
    }

    match cli.command {
        Command::Poll => {
            let aggregator = NotificationAggregator::from_config(&config)?;
            info!("Polling sources: {:?}", aggregator.source_kinds());
            let report = aggregator.run_cycle().await.context("Poll cycle failed")?;
            report.log();
        }
        Command::Register { target } => {
            let registry = TargetRegistry::new(&config.chat_ids_file);
            match registry.register(target.clone()).await? {
                Registration::Added => println!("Registered {}", target),
                Registration::AlreadyRegistered => println!("{} is already registered", target),
            }
        }
        Command::Status { target } => {
            let registry = TargetRegistry::new(&config.chat_ids_file);
            if registry.is_registered(&target).await {
                println!("{} is registered", target);
            } else {
                println!("{} is not registered", target);
            }
        }
        Command::Targets => {
            let (targets, _) = TargetRegistry::new(&config.chat_ids_file).load().await;
            if targets.is_empty() {
                println!("No targets registered");
            }
            for target in targets {
                println!("{}", target);
            }
        }
    }

    Ok(())
}
