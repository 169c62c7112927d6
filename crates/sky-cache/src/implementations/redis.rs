//! Redis cache backend.
//!
//! Commands go through a `ConnectionManager`, which reconnects on failure.
//! The manager is created on first use because factories are synchronous.
//! Each pattern subscription opens its own pub/sub connection.

use crate::{CacheError, CacheFactory, CacheInterface, CacheRegistry, MessageStream};
use ::redis::aio::{ConnectionManager, ConnectionManagerConfig};
use ::redis::{AsyncCommands, Client};
use async_trait::async_trait;
use futures::StreamExt;
use sky_types::{
	ChannelMessage, ConfigSchema, Field, FieldType, ImplementationRegistry, Schema,
	ValidationError,
};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::OnceCell;

const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 100;
const DEFAULT_RETRIES: usize = 1;

fn backend_error(e: ::redis::RedisError) -> CacheError {
	CacheError::Backend(e.to_string())
}

/// Cache backed by a Redis server.
pub struct RedisCache {
	client: Client,
	manager_config: ConnectionManagerConfig,
	connection: OnceCell<ConnectionManager>,
}

impl RedisCache {
	pub fn new(client: Client, connection_timeout: Duration, retries: usize) -> Self {
		let manager_config = ConnectionManagerConfig::new()
			.set_number_of_retries(retries)
			.set_connection_timeout(connection_timeout);

		Self {
			client,
			manager_config,
			connection: OnceCell::new(),
		}
	}

	async fn connection(&self) -> Result<ConnectionManager, CacheError> {
		let manager = self
			.connection
			.get_or_try_init(|| async {
				let manager = self
					.client
					.get_connection_manager_with_config(self.manager_config.clone())
					.await
					.map_err(backend_error)?;
				tracing::info!("Connected to redis");
				Ok::<_, CacheError>(manager)
			})
			.await?;
		Ok(manager.clone())
	}
}

#[async_trait]
impl CacheInterface for RedisCache {
	async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
		let mut conn = self.connection().await?;
		conn.get(key).await.map_err(backend_error)
	}

	async fn set(
		&self,
		key: &str,
		value: String,
		ttl: Option<Duration>,
	) -> Result<(), CacheError> {
		let mut conn = self.connection().await?;
		match ttl {
			Some(ttl) => {
				let _: () = conn
					.set_ex(key, value, ttl.as_secs().max(1))
					.await
					.map_err(backend_error)?;
			},
			None => {
				let _: () = conn.set(key, value).await.map_err(backend_error)?;
			},
		}
		Ok(())
	}

	async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, CacheError> {
		let mut conn = self.connection().await?;
		conn.hget(key, field).await.map_err(backend_error)
	}

	async fn hset(&self, key: &str, field: &str, value: String) -> Result<(), CacheError> {
		let mut conn = self.connection().await?;
		let _: () = conn.hset(key, field, value).await.map_err(backend_error)?;
		Ok(())
	}

	async fn hdel(&self, key: &str, field: &str) -> Result<(), CacheError> {
		let mut conn = self.connection().await?;
		let _: () = conn.hdel(key, field).await.map_err(backend_error)?;
		Ok(())
	}

	async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>, CacheError> {
		let mut conn = self.connection().await?;
		let fields: HashMap<String, String> = conn.hgetall(key).await.map_err(backend_error)?;
		Ok(fields.into_iter().collect())
	}

	async fn delete(&self, keys: &[String]) -> Result<usize, CacheError> {
		if keys.is_empty() {
			return Ok(0);
		}
		let mut conn = self.connection().await?;
		conn.del(keys).await.map_err(backend_error)
	}

	async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
		let mut conn = self.connection().await?;
		let seconds = i64::try_from(ttl.as_secs().max(1)).unwrap_or(i64::MAX);
		conn.expire(key, seconds).await.map_err(backend_error)
	}

	async fn publish(&self, channel: &str, message: String) -> Result<usize, CacheError> {
		let mut conn = self.connection().await?;
		conn.publish(channel, message).await.map_err(backend_error)
	}

	async fn psubscribe(&self, pattern: &str) -> Result<MessageStream, CacheError> {
		let mut pubsub = self.client.get_async_pubsub().await.map_err(backend_error)?;
		pubsub.psubscribe(pattern).await.map_err(backend_error)?;

		let stream = pubsub.into_on_message().filter_map(|msg| async move {
			match msg.get_payload::<String>() {
				Ok(payload) => Some(ChannelMessage {
					channel: msg.get_channel_name().to_string(),
					payload,
				}),
				Err(e) => {
					tracing::warn!(channel = %msg.get_channel_name(), error = %e, "Dropping non-text message");
					None
				},
			}
		});

		Ok(stream.boxed())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(RedisCacheSchema)
	}
}

/// Configuration schema for RedisCache.
pub struct RedisCacheSchema;

impl ConfigSchema for RedisCacheSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("url", FieldType::String).with_validator(|value| {
				let url = value.as_str().unwrap_or_default();
				if url.starts_with("redis://")
					|| url.starts_with("rediss://")
					|| url.starts_with("redis+unix://")
					|| url.starts_with("unix://")
				{
					Ok(())
				} else {
					Err("url must use a redis scheme".to_string())
				}
			})],
			vec![
				Field::new(
					"connection_timeout_ms",
					FieldType::Integer {
						min: Some(1),
						max: Some(60_000),
					},
				),
				Field::new(
					"retries",
					FieldType::Integer {
						min: Some(0),
						max: Some(10),
					},
				),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a redis cache from configuration.
///
/// Configuration parameters:
/// - `url`: Redis connection url, e.g. "redis://127.0.0.1:6379"
/// - `connection_timeout_ms`: Connect timeout in milliseconds (default: 100)
/// - `retries`: Reconnect attempts per command (default: 1)
pub fn create_cache(config: &toml::Value) -> Result<Box<dyn CacheInterface>, CacheError> {
	RedisCacheSchema
		.validate(config)
		.map_err(|e| CacheError::Configuration(format!("Invalid configuration: {}", e)))?;

	let url = config
		.get("url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| CacheError::Configuration("url is required".into()))?;
	let timeout_ms = config
		.get("connection_timeout_ms")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_CONNECTION_TIMEOUT_MS);
	let retries = config
		.get("retries")
		.and_then(|v| v.as_integer())
		.map(|v| v as usize)
		.unwrap_or(DEFAULT_RETRIES);

	let client = Client::open(url).map_err(|e| CacheError::Configuration(e.to_string()))?;

	Ok(Box::new(RedisCache::new(
		client,
		Duration::from_millis(timeout_ms),
		retries,
	)))
}

/// Registry for the redis cache implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "redis";
	type Factory = CacheFactory;

	fn factory() -> Self::Factory {
		create_cache
	}
}

impl CacheRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_factory_requires_url() {
		let config: toml::Value = toml::from_str("retries = 2").unwrap();
		assert!(matches!(
			create_cache(&config),
			Err(CacheError::Configuration(_))
		));
	}

	#[test]
	fn test_factory_rejects_foreign_scheme() {
		let config: toml::Value = toml::from_str("url = \"http://localhost:6379\"").unwrap();
		let err = create_cache(&config).err().unwrap();
		assert!(err.to_string().contains("redis scheme"));
	}

	#[test]
	fn test_factory_does_not_connect() {
		// Nothing listens on this port; construction must still succeed.
		let config: toml::Value =
			toml::from_str("url = \"redis://127.0.0.1:1\"\nconnection_timeout_ms = 50").unwrap();
		assert!(create_cache(&config).is_ok());
	}
}
