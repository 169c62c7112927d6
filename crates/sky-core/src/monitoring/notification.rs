//! New-order notifications.
//!
//! The publisher announces orders that staff need to look at on the
//! order-arrived channel. The listener subscribes to that channel pattern
//! and hands every message to the registered sinks. Delivery is best effort
//! on both sides: publish failures are logged and swallowed, and messages
//! sent while nobody listens are lost.

use async_trait::async_trait;
use futures::StreamExt;
use sky_cache::CacheService;
use sky_types::{ChannelMessage, NotificationMessage, Order};
use std::sync::Arc;
use std::time::Duration;

/// Wait before subscribing again after a failed or closed subscription.
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(3);

/// Publishes order-arrived messages through the cache layer.
pub struct NotificationPublisher {
	cache: Arc<CacheService>,
	channel: String,
}

impl NotificationPublisher {
	pub fn new(cache: Arc<CacheService>, channel: impl Into<String>) -> Self {
		Self {
			cache,
			channel: channel.into(),
		}
	}

	pub fn channel(&self) -> &str {
		&self.channel
	}

	/// Announces an order. Returns whether the publish call succeeded.
	pub async fn order_arrived(&self, order: &Order) -> bool {
		let message = NotificationMessage::from(order);
		match self.cache.publish_json(&self.channel, &message).await {
			Ok(receivers) => {
				tracing::debug!(
					order_id = %order.id,
					channel = %self.channel,
					receivers = receivers,
					"Published order notification"
				);
				true
			},
			Err(e) => {
				tracing::warn!(
					order_id = %order.id,
					channel = %self.channel,
					error = %e,
					"Failed to publish order notification"
				);
				false
			},
		}
	}
}

/// Receiver of messages picked up by the listener.
#[async_trait]
pub trait NotificationSink: Send + Sync {
	async fn deliver(&self, message: &ChannelMessage);
}

/// Sink that writes every message to the log.
pub struct LoggingSink;

#[async_trait]
impl NotificationSink for LoggingSink {
	async fn deliver(&self, message: &ChannelMessage) {
		tracing::info!(
			channel = %message.channel,
			message = %message.payload,
			"Received notification"
		);
	}
}

/// Background subscriber for the notification channel pattern.
///
/// A failed subscribe or a dropped subscription is retried after a delay for
/// as long as the listener runs. Messages published in between are lost.
pub struct NotificationListener {
	cache: Arc<CacheService>,
	pattern: String,
	sinks: Vec<Arc<dyn NotificationSink>>,
	retry_delay: Duration,
}

impl NotificationListener {
	pub fn new(
		cache: Arc<CacheService>,
		pattern: impl Into<String>,
		sinks: Vec<Arc<dyn NotificationSink>>,
	) -> Self {
		Self {
			cache,
			pattern: pattern.into(),
			sinks,
			retry_delay: RESUBSCRIBE_DELAY,
		}
	}

	pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
		self.retry_delay = retry_delay;
		self
	}

	/// Forwards messages to the sinks, resubscribing whenever the
	/// subscription fails or ends. Runs until the task is aborted.
	pub async fn run(&self) {
		loop {
			match self.listen_once().await {
				Ok(()) => {
					tracing::warn!(pattern = %self.pattern, "Notification subscription closed, resubscribing");
				},
				Err(e) => {
					tracing::error!(
						pattern = %self.pattern,
						error = %e,
						"Failed to subscribe for notifications, retrying"
					);
				},
			}
			tokio::time::sleep(self.retry_delay).await;
		}
	}

	/// Subscribes once and forwards messages until the subscription ends.
	async fn listen_once(&self) -> Result<(), sky_cache::CacheError> {
		let mut messages = self.cache.psubscribe(&self.pattern).await?;
		tracing::info!(pattern = %self.pattern, "Listening for notifications");

		while let Some(message) = messages.next().await {
			for sink in &self.sinks {
				sink.deliver(&message).await;
			}
		}
		Ok(())
	}
}
