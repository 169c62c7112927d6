//! Cache layer for the sky take-out backend.
//!
//! The cache is never authoritative. It mirrors cart rows, holds per-category
//! dish listings and the shop status flag, and carries the pub/sub channel
//! used for new-order notifications. Backends implement [`CacheInterface`];
//! handlers use the typed helpers on [`CacheService`].

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{de::DeserializeOwned, Serialize};
use sky_types::{CacheKey, ChannelMessage, ConfigSchema, ImplementationRegistry};
use std::time::Duration;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod memory;
	pub mod redis;
}

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error reported by the cache backend or its connection.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Stream of messages from a pattern subscription.
pub type MessageStream = BoxStream<'static, ChannelMessage>;

/// Trait defining the low-level interface for cache backends.
///
/// Values are plain strings. Keys hold either a single value or a hash of
/// fields; using a key as the wrong kind is a backend error.
#[async_trait]
pub trait CacheInterface: Send + Sync {
	async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

	/// Stores a value, replacing any previous value and expiry.
	async fn set(&self, key: &str, value: String, ttl: Option<Duration>)
		-> Result<(), CacheError>;

	async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, CacheError>;

	/// Sets one field of a hash. An existing expiry on the key is kept.
	async fn hset(&self, key: &str, field: &str, value: String) -> Result<(), CacheError>;

	async fn hdel(&self, key: &str, field: &str) -> Result<(), CacheError>;

	/// Returns every field of a hash; empty when the key is absent.
	async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>, CacheError>;

	/// Deletes keys and returns how many existed.
	async fn delete(&self, keys: &[String]) -> Result<usize, CacheError>;

	/// Sets a key's expiry. Returns false if the key does not exist.
	async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError>;

	/// Publishes a message and returns the number of receivers.
	async fn publish(&self, channel: &str, message: String) -> Result<usize, CacheError>;

	/// Subscribes to every channel matching a glob pattern.
	async fn psubscribe(&self, pattern: &str) -> Result<MessageStream, CacheError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Removes expired entries from the cache (optional operation).
	/// Returns the number of entries removed.
	async fn cleanup_expired(&self) -> Result<usize, CacheError> {
		Ok(0)
	}
}

/// Type alias for cache factory functions.
pub type CacheFactory = fn(&toml::Value) -> Result<Box<dyn CacheInterface>, CacheError>;

/// Registry trait for cache implementations.
pub trait CacheRegistry: ImplementationRegistry<Factory = CacheFactory> {}

/// Get all registered cache implementations.
pub fn get_all_implementations() -> Vec<(&'static str, CacheFactory)> {
	use implementations::{memory, redis};

	vec![
		(memory::Registry::NAME, memory::Registry::factory()),
		(redis::Registry::NAME, redis::Registry::factory()),
	]
}

/// Typed cache operations over a backend.
///
/// Values are stored as JSON. A value that no longer decodes is treated as a
/// miss by the read helpers, so a format change never blocks a read-through.
pub struct CacheService {
	backend: Box<dyn CacheInterface>,
}

impl CacheService {
	pub fn new(backend: Box<dyn CacheInterface>) -> Self {
		Self { backend }
	}

	/// Reads and decodes a JSON value.
	pub async fn get_json<T: DeserializeOwned>(
		&self,
		key: &CacheKey,
	) -> Result<Option<T>, CacheError> {
		let key = key.to_string();
		let Some(raw) = self.backend.get(&key).await? else {
			return Ok(None);
		};
		match serde_json::from_str(&raw) {
			Ok(value) => Ok(Some(value)),
			Err(e) => {
				tracing::warn!(key = %key, error = %e, "Discarding undecodable cache value");
				Ok(None)
			},
		}
	}

	/// Encodes and stores a JSON value.
	pub async fn set_json<T: Serialize>(
		&self,
		key: &CacheKey,
		value: &T,
		ttl: Option<Duration>,
	) -> Result<(), CacheError> {
		let raw =
			serde_json::to_string(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
		self.backend.set(&key.to_string(), raw, ttl).await
	}

	pub async fn hget_json<T: DeserializeOwned>(
		&self,
		key: &CacheKey,
		field: &str,
	) -> Result<Option<T>, CacheError> {
		let key = key.to_string();
		let Some(raw) = self.backend.hget(&key, field).await? else {
			return Ok(None);
		};
		match serde_json::from_str(&raw) {
			Ok(value) => Ok(Some(value)),
			Err(e) => {
				tracing::warn!(key = %key, field = %field, error = %e, "Discarding undecodable cache field");
				Ok(None)
			},
		}
	}

	pub async fn hset_json<T: Serialize>(
		&self,
		key: &CacheKey,
		field: &str,
		value: &T,
	) -> Result<(), CacheError> {
		let raw =
			serde_json::to_string(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
		self.backend.hset(&key.to_string(), field, raw).await
	}

	pub async fn hdel(&self, key: &CacheKey, field: &str) -> Result<(), CacheError> {
		self.backend.hdel(&key.to_string(), field).await
	}

	/// Decodes every field of a hash, skipping fields that fail to decode.
	pub async fn hvalues_json<T: DeserializeOwned>(
		&self,
		key: &CacheKey,
	) -> Result<Vec<T>, CacheError> {
		let key = key.to_string();
		let fields = self.backend.hgetall(&key).await?;
		let mut values = Vec::with_capacity(fields.len());
		for (field, raw) in fields {
			match serde_json::from_str(&raw) {
				Ok(value) => values.push(value),
				Err(e) => {
					tracing::warn!(key = %key, field = %field, error = %e, "Skipping undecodable cache field");
				},
			}
		}
		Ok(values)
	}

	/// Deletes all given keys in one call.
	pub async fn delete(&self, keys: &[CacheKey]) -> Result<usize, CacheError> {
		if keys.is_empty() {
			return Ok(0);
		}
		let keys: Vec<String> = keys.iter().map(ToString::to_string).collect();
		self.backend.delete(&keys).await
	}

	pub async fn expire(&self, key: &CacheKey, ttl: Duration) -> Result<bool, CacheError> {
		self.backend.expire(&key.to_string(), ttl).await
	}

	/// Publishes a JSON-encoded message.
	pub async fn publish_json<T: Serialize>(
		&self,
		channel: &str,
		message: &T,
	) -> Result<usize, CacheError> {
		let raw = serde_json::to_string(message)
			.map_err(|e| CacheError::Serialization(e.to_string()))?;
		self.backend.publish(channel, raw).await
	}

	pub async fn psubscribe(&self, pattern: &str) -> Result<MessageStream, CacheError> {
		self.backend.psubscribe(pattern).await
	}

	pub async fn cleanup_expired(&self) -> Result<usize, CacheError> {
		self.backend.cleanup_expired().await
	}
}

/// Matches a channel name against a glob pattern with `*` and `?`.
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
	let pattern: Vec<char> = pattern.chars().collect();
	let text: Vec<char> = text.chars().collect();
	let (mut p, mut t) = (0, 0);
	let mut backtrack: Option<(usize, usize)> = None;

	while t < text.len() {
		match pattern.get(p) {
			Some('*') => {
				backtrack = Some((p, t));
				p += 1;
			},
			Some('?') => {
				p += 1;
				t += 1;
			},
			Some(c) if *c == text[t] => {
				p += 1;
				t += 1;
			},
			_ => match backtrack {
				Some((star, matched)) => {
					p = star + 1;
					t = matched + 1;
					backtrack = Some((star, matched + 1));
				},
				None => return false,
			},
		}
	}

	pattern[p..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
	use super::*;
	use implementations::memory::MemoryCache;
	use serde::Deserialize;

	#[derive(Debug, PartialEq, Serialize, Deserialize)]
	struct Row {
		name: String,
		number: u32,
	}

	#[test]
	fn test_glob_match() {
		assert!(glob_match("order:*", "order:arrived"));
		assert!(glob_match("*", "anything"));
		assert!(glob_match("order:?rrived", "order:arrived"));
		assert!(glob_match("a*b*c", "axxbyyc"));
		assert!(!glob_match("order:*", "dish:updated"));
		assert!(!glob_match("order:arrived", "order:arrived:late"));
	}

	#[tokio::test]
	async fn test_json_helpers() {
		let cache = CacheService::new(Box::new(MemoryCache::new()));
		let key = CacheKey::Cart(1);

		cache
			.hset_json(&key, "dish_1", &Row { name: "rice".into(), number: 2 })
			.await
			.unwrap();
		cache
			.hset_json(&key, "dish_2", &Row { name: "soup".into(), number: 1 })
			.await
			.unwrap();

		let row: Option<Row> = cache.hget_json(&key, "dish_1").await.unwrap();
		assert_eq!(row.unwrap().number, 2);

		let mut rows: Vec<Row> = cache.hvalues_json(&key).await.unwrap();
		rows.sort_by(|a, b| a.name.cmp(&b.name));
		assert_eq!(rows.len(), 2);
		assert_eq!(rows[0].name, "rice");

		assert_eq!(cache.delete(&[key, CacheKey::ShopStatus]).await.unwrap(), 1);
		assert!(cache.hvalues_json::<Row>(&key).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_undecodable_value_is_a_miss() {
		let backend = MemoryCache::new();
		backend
			.set("dish_3", "not json".to_string(), None)
			.await
			.unwrap();
		let cache = CacheService::new(Box::new(backend));

		let listing: Option<Vec<Row>> = cache.get_json(&CacheKey::DishCategory(3)).await.unwrap();
		assert!(listing.is_none());
	}
}
