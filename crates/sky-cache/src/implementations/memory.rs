//! In-process cache backend.
//!
//! Keys expire lazily on read and in bulk through `cleanup_expired`. Expiry
//! is measured with the tokio clock, so tests can pause and advance time.
//! Pub/sub runs over a broadcast channel shared by all subscribers.

use crate::{glob_match, CacheError, CacheFactory, CacheInterface, CacheRegistry, MessageStream};
use async_trait::async_trait;
use futures::StreamExt;
use sky_types::{
	ChannelMessage, ConfigSchema, Field, FieldType, ImplementationRegistry, Schema,
	ValidationError,
};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::time::Instant;

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
enum Value {
	Text(String),
	Hash(BTreeMap<String, String>),
}

#[derive(Debug, Clone)]
struct Entry {
	value: Value,
	expires_at: Option<Instant>,
}

impl Entry {
	fn is_expired(&self, now: Instant) -> bool {
		self.expires_at.is_some_and(|at| at <= now)
	}
}

fn wrong_type(key: &str) -> CacheError {
	CacheError::Backend(format!(
		"WRONGTYPE key '{}' holds the wrong kind of value",
		key
	))
}

/// Cache held in process memory.
pub struct MemoryCache {
	entries: RwLock<HashMap<String, Entry>>,
	channel: broadcast::Sender<ChannelMessage>,
}

impl MemoryCache {
	pub fn new() -> Self {
		Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
	}

	/// Creates a cache whose pub/sub channel buffers `capacity` messages.
	pub fn with_capacity(capacity: usize) -> Self {
		let (channel, _) = broadcast::channel(capacity.max(1));
		Self {
			entries: RwLock::new(HashMap::new()),
			channel,
		}
	}

	/// Returns a live entry, dropping it first if it has expired.
	fn live<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
		if entries.get(key).is_some_and(|e| e.is_expired(Instant::now())) {
			entries.remove(key);
		}
		entries.get_mut(key)
	}
}

impl Default for MemoryCache {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl CacheInterface for MemoryCache {
	async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
		let mut entries = self.entries.write().await;
		match Self::live(&mut entries, key) {
			None => Ok(None),
			Some(Entry {
				value: Value::Text(text),
				..
			}) => Ok(Some(text.clone())),
			Some(_) => Err(wrong_type(key)),
		}
	}

	async fn set(
		&self,
		key: &str,
		value: String,
		ttl: Option<Duration>,
	) -> Result<(), CacheError> {
		let entry = Entry {
			value: Value::Text(value),
			expires_at: ttl.map(|ttl| Instant::now() + ttl),
		};
		self.entries.write().await.insert(key.to_string(), entry);
		Ok(())
	}

	async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, CacheError> {
		let mut entries = self.entries.write().await;
		match Self::live(&mut entries, key) {
			None => Ok(None),
			Some(Entry {
				value: Value::Hash(fields),
				..
			}) => Ok(fields.get(field).cloned()),
			Some(_) => Err(wrong_type(key)),
		}
	}

	async fn hset(&self, key: &str, field: &str, value: String) -> Result<(), CacheError> {
		let mut entries = self.entries.write().await;
		match Self::live(&mut entries, key) {
			Some(Entry {
				value: Value::Hash(fields),
				..
			}) => {
				fields.insert(field.to_string(), value);
				Ok(())
			},
			Some(_) => Err(wrong_type(key)),
			None => {
				let fields = BTreeMap::from([(field.to_string(), value)]);
				entries.insert(
					key.to_string(),
					Entry {
						value: Value::Hash(fields),
						expires_at: None,
					},
				);
				Ok(())
			},
		}
	}

	async fn hdel(&self, key: &str, field: &str) -> Result<(), CacheError> {
		let mut entries = self.entries.write().await;
		let now_empty = match Self::live(&mut entries, key) {
			None => return Ok(()),
			Some(Entry {
				value: Value::Hash(fields),
				..
			}) => {
				fields.remove(field);
				fields.is_empty()
			},
			Some(_) => return Err(wrong_type(key)),
		};
		// An emptied hash disappears, as it does in Redis.
		if now_empty {
			entries.remove(key);
		}
		Ok(())
	}

	async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>, CacheError> {
		let mut entries = self.entries.write().await;
		match Self::live(&mut entries, key) {
			None => Ok(Vec::new()),
			Some(Entry {
				value: Value::Hash(fields),
				..
			}) => Ok(fields
				.iter()
				.map(|(k, v)| (k.clone(), v.clone()))
				.collect()),
			Some(_) => Err(wrong_type(key)),
		}
	}

	async fn delete(&self, keys: &[String]) -> Result<usize, CacheError> {
		let mut entries = self.entries.write().await;
		let now = Instant::now();
		let removed = keys
			.iter()
			.filter_map(|key| entries.remove(key))
			.filter(|entry| !entry.is_expired(now))
			.count();
		Ok(removed)
	}

	async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
		let mut entries = self.entries.write().await;
		match Self::live(&mut entries, key) {
			Some(entry) => {
				entry.expires_at = Some(Instant::now() + ttl);
				Ok(true)
			},
			None => Ok(false),
		}
	}

	async fn publish(&self, channel: &str, message: String) -> Result<usize, CacheError> {
		let message = ChannelMessage {
			channel: channel.to_string(),
			payload: message,
		};
		// Sending with no subscribers is not an error, nobody received it.
		Ok(self.channel.send(message).unwrap_or(0))
	}

	async fn psubscribe(&self, pattern: &str) -> Result<MessageStream, CacheError> {
		let pattern = pattern.to_string();
		let receiver = self.channel.subscribe();

		let stream = futures::stream::unfold(receiver, |mut receiver| async move {
			loop {
				match receiver.recv().await {
					Ok(message) => return Some((message, receiver)),
					Err(broadcast::error::RecvError::Lagged(skipped)) => {
						tracing::warn!(skipped = %skipped, "Subscriber lagged, messages dropped");
					},
					Err(broadcast::error::RecvError::Closed) => return None,
				}
			}
		})
		.filter(move |message| futures::future::ready(glob_match(&pattern, &message.channel)));

		Ok(stream.boxed())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryCacheSchema)
	}

	async fn cleanup_expired(&self) -> Result<usize, CacheError> {
		let mut entries = self.entries.write().await;
		let now = Instant::now();
		let before = entries.len();
		entries.retain(|_, entry| !entry.is_expired(now));
		Ok(before - entries.len())
	}
}

/// Configuration schema for MemoryCache.
pub struct MemoryCacheSchema;

impl ConfigSchema for MemoryCacheSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new(
				"channel_capacity",
				FieldType::Integer {
					min: Some(1),
					max: Some(65536),
				},
			)],
		);
		schema.validate(config)
	}
}

/// Factory function to create a memory cache from configuration.
///
/// Configuration parameters:
/// - `channel_capacity`: Buffered pub/sub messages per subscriber (default: 256)
pub fn create_cache(config: &toml::Value) -> Result<Box<dyn CacheInterface>, CacheError> {
	MemoryCacheSchema
		.validate(config)
		.map_err(|e| CacheError::Configuration(format!("Invalid configuration: {}", e)))?;

	let capacity = config
		.get("channel_capacity")
		.and_then(|v| v.as_integer())
		.map(|v| v as usize)
		.unwrap_or(DEFAULT_CHANNEL_CAPACITY);

	Ok(Box::new(MemoryCache::with_capacity(capacity)))
}

/// Registry for the memory cache implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = CacheFactory;

	fn factory() -> Self::Factory {
		create_cache
	}
}

impl CacheRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test(start_paused = true)]
	async fn test_values_expire() {
		let cache = MemoryCache::new();
		cache
			.set("SHOP_STATUS", "1".into(), Some(Duration::from_secs(60)))
			.await
			.unwrap();
		cache.set("forever", "x".into(), None).await.unwrap();

		tokio::time::advance(Duration::from_secs(59)).await;
		assert_eq!(cache.get("SHOP_STATUS").await.unwrap().as_deref(), Some("1"));

		tokio::time::advance(Duration::from_secs(2)).await;
		assert_eq!(cache.get("SHOP_STATUS").await.unwrap(), None);
		assert_eq!(cache.get("forever").await.unwrap().as_deref(), Some("x"));
	}

	#[tokio::test(start_paused = true)]
	async fn test_hash_expiry_is_kept_across_hset_and_renewed_by_expire() {
		let cache = MemoryCache::new();
		cache.hset("cart", "dish_1", "a".into()).await.unwrap();
		assert!(cache.expire("cart", Duration::from_secs(30)).await.unwrap());

		tokio::time::advance(Duration::from_secs(20)).await;
		cache.hset("cart", "dish_2", "b".into()).await.unwrap();

		tokio::time::advance(Duration::from_secs(15)).await;
		assert!(cache.hgetall("cart").await.unwrap().is_empty());
		assert!(!cache.expire("cart", Duration::from_secs(30)).await.unwrap());
	}

	#[tokio::test(start_paused = true)]
	async fn test_cleanup_expired_counts_removed() {
		let cache = MemoryCache::new();
		cache
			.set("a", "1".into(), Some(Duration::from_secs(1)))
			.await
			.unwrap();
		cache
			.set("b", "1".into(), Some(Duration::from_secs(100)))
			.await
			.unwrap();

		tokio::time::advance(Duration::from_secs(5)).await;
		assert_eq!(cache.cleanup_expired().await.unwrap(), 1);
		assert_eq!(cache.cleanup_expired().await.unwrap(), 0);
	}

	#[tokio::test]
	async fn test_wrong_kind_is_an_error() {
		let cache = MemoryCache::new();
		cache.set("plain", "1".into(), None).await.unwrap();
		assert!(cache.hget("plain", "f").await.is_err());
		cache.hset("hash", "f", "1".into()).await.unwrap();
		assert!(cache.get("hash").await.is_err());
	}

	#[tokio::test]
	async fn test_hdel_removes_emptied_hash() {
		let cache = MemoryCache::new();
		cache.hset("cart", "dish_1", "a".into()).await.unwrap();
		cache.hdel("cart", "dish_1").await.unwrap();
		assert_eq!(cache.delete(&["cart".to_string()]).await.unwrap(), 0);
	}

	#[tokio::test]
	async fn test_pattern_subscription_filters_channels() {
		let cache = MemoryCache::new();
		let mut stream = cache.psubscribe("order:*").await.unwrap();

		assert_eq!(
			cache.publish("dish:changed", "ignored".into()).await.unwrap(),
			1
		);
		assert_eq!(
			cache.publish("order:arrived", "{}".into()).await.unwrap(),
			1
		);

		let message = stream.next().await.unwrap();
		assert_eq!(message.channel, "order:arrived");
		assert_eq!(message.payload, "{}");
	}

	#[tokio::test]
	async fn test_publish_without_subscribers() {
		let cache = MemoryCache::new();
		assert_eq!(cache.publish("order:arrived", "{}".into()).await.unwrap(), 0);
	}
}
