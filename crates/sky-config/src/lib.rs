//! Configuration module for the sky take-out backend.
//!
//! Configuration is read from TOML. Each pluggable concern (storage, cache,
//! catalog, payment) names a `primary` implementation and carries a raw table
//! per implementation that the backend validates itself.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Included files may include further files
//! - Each top-level section must be unique across all files

#[cfg(any(test, feature = "testing"))]
pub mod builders;
mod loader;

pub use loader::ConfigLoader;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sky_types::ORDER_ARRIVED_CHANNEL;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message only, the full input dump is noise
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Shop identity and cache policy.
	pub shop: ShopConfig,
	/// Order and cart store.
	pub storage: BackendConfig,
	/// Volatile cache and pub/sub layer.
	pub cache: BackendConfig,
	/// Menu and address book collaborator.
	pub catalog: BackendConfig,
	/// Payment gateway collaborator.
	pub payment: PaymentConfig,
	/// Stale-delivery sweep.
	#[serde(default)]
	pub reconciler: ReconcilerConfig,
	/// HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Shop-wide settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShopConfig {
	/// Identifier used in logs.
	pub id: String,
	/// Lifetime of a user's cart mirror, refreshed on every cart mutation.
	#[serde(default = "default_ttl_minutes")]
	pub cart_ttl_minutes: u64,
	/// Lifetime of a cached category listing.
	#[serde(default = "default_ttl_minutes")]
	pub dish_cache_ttl_minutes: u64,
	/// Channel new-order notifications are published on.
	#[serde(default = "default_notification_channel")]
	pub notification_channel: String,
	/// Interval of the expired-cache-entry sweep.
	#[serde(default = "default_cleanup_interval_seconds")]
	pub cleanup_interval_seconds: u64,
	/// How many order numbers to try before giving up on a collision.
	#[serde(default = "default_order_number_attempts")]
	pub order_number_attempts: u32,
}

fn default_ttl_minutes() -> u64 {
	30
}

fn default_notification_channel() -> String {
	ORDER_ARRIVED_CHANNEL.to_string()
}

fn default_cleanup_interval_seconds() -> u64 {
	60
}

fn default_order_number_attempts() -> u32 {
	5
}

/// A pluggable concern with a primary implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
	/// Which implementation to use.
	pub primary: String,
	/// Implementation name to raw configuration table.
	pub implementations: HashMap<String, toml::Value>,
}

/// Payment gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentConfig {
	pub primary: String,
	pub implementations: HashMap<String, toml::Value>,
	/// Description shown on the customer's payment screen.
	#[serde(default = "default_payment_description")]
	pub description: String,
}

fn default_payment_description() -> String {
	"sky take-out order".to_string()
}

/// Schedule and cutoff for the stale-delivery sweep.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconcilerConfig {
	#[serde(default = "default_true")]
	pub enabled: bool,
	/// Local hour of day the sweep fires.
	#[serde(default = "default_reconciler_hour")]
	pub hour: u32,
	#[serde(default)]
	pub minute: u32,
	/// Deliveries placed longer ago than this are force-completed.
	#[serde(default = "default_delivery_timeout_hours")]
	pub delivery_timeout_hours: u64,
}

impl Default for ReconcilerConfig {
	fn default() -> Self {
		Self {
			enabled: default_true(),
			hour: default_reconciler_hour(),
			minute: 0,
			delivery_timeout_hours: default_delivery_timeout_hours(),
		}
	}
}

fn default_true() -> bool {
	true
}

fn default_reconciler_hour() -> u32 {
	1
}

fn default_delivery_timeout_hours() -> u64 {
	24
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_api_host")]
	pub host: String,
	#[serde(default = "default_api_port")]
	pub port: u16,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	8080
}

/// Resolves environment variables in a string.
///
/// Replaces `${VAR_NAME}` with the value of the environment variable and
/// supports defaults with `${VAR_NAME:-default_value}`. Inputs are limited to
/// 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut resolved = String::with_capacity(input.len());
	let mut last = 0;
	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};
		resolved.push_str(&input[last..full_match.start()]);
		resolved.push_str(&value);
		last = full_match.end();
	}
	resolved.push_str(&input[last..]);

	Ok(resolved)
}

fn validate_backend(
	section: &str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
) -> Result<(), ConfigError> {
	if implementations.is_empty() {
		return Err(ConfigError::Validation(format!(
			"At least one {} implementation must be configured",
			section
		)));
	}
	if primary.is_empty() {
		return Err(ConfigError::Validation(format!(
			"{} primary implementation cannot be empty",
			section
		)));
	}
	if !implementations.contains_key(primary) {
		return Err(ConfigError::Validation(format!(
			"Primary {} '{}' not found in implementations",
			section, primary
		)));
	}
	Ok(())
}

impl Config {
	/// Loads configuration from a file, following include directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Validates cross-field constraints serde cannot express.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.shop.id.is_empty() {
			return Err(ConfigError::Validation("Shop ID cannot be empty".into()));
		}
		if self.shop.cart_ttl_minutes == 0 || self.shop.dish_cache_ttl_minutes == 0 {
			return Err(ConfigError::Validation(
				"Cache TTLs must be greater than 0 minutes".into(),
			));
		}
		if self.shop.notification_channel.is_empty() {
			return Err(ConfigError::Validation(
				"Notification channel cannot be empty".into(),
			));
		}
		if self.shop.cleanup_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"cleanup_interval_seconds must be greater than 0".into(),
			));
		}
		if self.shop.order_number_attempts == 0 {
			return Err(ConfigError::Validation(
				"order_number_attempts must be at least 1".into(),
			));
		}

		validate_backend("storage", &self.storage.primary, &self.storage.implementations)?;
		validate_backend("cache", &self.cache.primary, &self.cache.implementations)?;
		validate_backend("catalog", &self.catalog.primary, &self.catalog.implementations)?;
		validate_backend("payment", &self.payment.primary, &self.payment.implementations)?;

		if self.reconciler.hour > 23 {
			return Err(ConfigError::Validation(format!(
				"Reconciler hour must be below 24, got {}",
				self.reconciler.hour
			)));
		}
		if self.reconciler.minute > 59 {
			return Err(ConfigError::Validation(format!(
				"Reconciler minute must be below 60, got {}",
				self.reconciler.minute
			)));
		}
		if self.reconciler.delivery_timeout_hours == 0 {
			return Err(ConfigError::Validation(
				"delivery_timeout_hours must be greater than 0".into(),
			));
		}

		Ok(())
	}
}

/// Parses a TOML string, resolving environment variables and validating the
/// result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const MINIMAL: &str = r#"
[shop]
id = "sky-test"

[storage]
primary = "memory"
[storage.implementations.memory]

[cache]
primary = "memory"
[cache.implementations.memory]

[catalog]
primary = "memory"
[catalog.implementations.memory]

[payment]
primary = "mock"
[payment.implementations.mock]
"#;

	#[test]
	fn test_env_var_resolution() {
		std::env::set_var("SKY_TEST_HOST", "localhost");
		std::env::set_var("SKY_TEST_PORT", "6379");

		let input = "url = \"redis://${SKY_TEST_HOST}:${SKY_TEST_PORT}\"";
		let result = resolve_env_vars(input).unwrap();
		assert_eq!(result, "url = \"redis://localhost:6379\"");

		std::env::remove_var("SKY_TEST_HOST");
		std::env::remove_var("SKY_TEST_PORT");
	}

	#[test]
	fn test_env_var_with_default() {
		let input = "value = \"${SKY_MISSING_VAR:-fallback}\"";
		assert_eq!(resolve_env_vars(input).unwrap(), "value = \"fallback\"");
	}

	#[test]
	fn test_missing_env_var_error() {
		let result = resolve_env_vars("value = \"${SKY_MISSING_VAR}\"");
		assert!(result.unwrap_err().to_string().contains("SKY_MISSING_VAR"));
	}

	#[test]
	fn test_minimal_config_defaults() {
		let config: Config = MINIMAL.parse().unwrap();

		assert_eq!(config.shop.id, "sky-test");
		assert_eq!(config.shop.cart_ttl_minutes, 30);
		assert_eq!(config.shop.dish_cache_ttl_minutes, 30);
		assert_eq!(config.shop.notification_channel, "order:arrived");
		assert!(config.reconciler.enabled);
		assert_eq!(config.reconciler.hour, 1);
		assert_eq!(config.reconciler.minute, 0);
		assert_eq!(config.reconciler.delivery_timeout_hours, 24);
		assert!(config.api.is_none());
	}

	#[test]
	fn test_primary_must_be_configured() {
		let config_str = MINIMAL.replace(
			"[cache]\nprimary = \"memory\"",
			"[cache]\nprimary = \"redis\"",
		);
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err
			.to_string()
			.contains("Primary cache 'redis' not found in implementations"));
	}

	#[test]
	fn test_reconciler_hour_range() {
		let config_str = format!("{}\n[reconciler]\nhour = 24\n", MINIMAL);
		let err = Config::from_str(&config_str).unwrap_err();
		assert!(err.to_string().contains("hour must be below 24"));
	}

	#[test]
	fn test_zero_ttl_rejected() {
		let config_str = MINIMAL.replace(
			"id = \"sky-test\"",
			"id = \"sky-test\"\ncart_ttl_minutes = 0",
		);
		assert!(Config::from_str(&config_str).is_err());
	}
}
