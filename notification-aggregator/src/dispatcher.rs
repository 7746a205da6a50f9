use std::sync::Arc;

use async_trait::async_trait;
use interfaces::defs::NotificationEvent;
use tracing::{debug, warn};

use crate::message::format_event;
use crate::registry::DeliveryTarget;
use crate::types::Result;

/// A push-messaging API able to put one text into one chat.
#[async_trait]
pub trait PushChannel: Send + Sync {
    fn channel_type(&self) -> &'static str;

    /// False when the channel lacks credentials; nothing is sent then.
    fn is_enabled(&self) -> bool;

    async fn send(&self, target: &DeliveryTarget, text: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed(String),
    /// The channel is disabled.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct TargetDelivery {
    pub target: DeliveryTarget,
    pub outcome: DeliveryOutcome,
}

/// Fans one event out to every target. Never fails as a whole: each target's
/// result is reported separately and one bad target does not stop the rest.
pub struct Dispatcher {
    channel: Arc<dyn PushChannel>,
}

impl Dispatcher {
    pub fn new(channel: Arc<dyn PushChannel>) -> Self {
        Self { channel }
    }

    pub async fn dispatch(&self, event: &NotificationEvent, targets: &[DeliveryTarget]) -> Vec<TargetDelivery> {
        if !self.channel.is_enabled() {
            debug!(
                "{} channel disabled, not delivering {} item {}",
                self.channel.channel_type(),
                event.source,
                event.item_id
            );
            return targets
                .iter()
                .map(|target| TargetDelivery {
                    target: target.clone(),
                    outcome: DeliveryOutcome::Skipped,
                })
                .collect();
        }

        let text = format_event(event);
        let mut deliveries = Vec::with_capacity(targets.len());

        for target in targets {
            let outcome = match self.channel.send(target, &text).await {
                Ok(()) => {
                    debug!("Delivered {} item {} to {}", event.source, event.item_id, target);
                    DeliveryOutcome::Delivered
                }
                Err(e) => {
                    warn!(
                        "Delivery of {} item {} to {} via {} failed: {}",
                        event.source,
                        event.item_id,
                        target,
                        self.channel.channel_type(),
                        e
                    );
                    DeliveryOutcome::Failed(e.to_string())
                }
            };
            deliveries.push(TargetDelivery {
                target: target.clone(),
                outcome,
            });
        }

        deliveries
    }
}
