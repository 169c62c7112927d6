//! Configuration builder for tests and local development.
//!
//! Produces a `Config` backed entirely by in-process implementations
//! (memory store, memory cache, memory catalog, mock payment) unless told
//! otherwise.

use crate::{ApiConfig, BackendConfig, Config, PaymentConfig, ReconcilerConfig, ShopConfig};
use std::collections::HashMap;

/// Builder for creating `Config` instances with a fluent API.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	shop_id: String,
	cart_ttl_minutes: u64,
	dish_cache_ttl_minutes: u64,
	storage: (String, toml::Value),
	cache: (String, toml::Value),
	catalog: (String, toml::Value),
	payment: (String, toml::Value),
	reconciler: ReconcilerConfig,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

fn empty_table() -> toml::Value {
	toml::Value::Table(toml::map::Map::new())
}

impl ConfigBuilder {
	pub fn new() -> Self {
		Self {
			shop_id: "test-shop".to_string(),
			cart_ttl_minutes: 30,
			dish_cache_ttl_minutes: 30,
			storage: ("memory".to_string(), empty_table()),
			cache: ("memory".to_string(), empty_table()),
			catalog: ("memory".to_string(), empty_table()),
			payment: ("mock".to_string(), empty_table()),
			reconciler: ReconcilerConfig::default(),
			api: None,
		}
	}

	pub fn shop_id(mut self, id: impl Into<String>) -> Self {
		self.shop_id = id.into();
		self
	}

	pub fn cart_ttl_minutes(mut self, minutes: u64) -> Self {
		self.cart_ttl_minutes = minutes;
		self
	}

	pub fn dish_cache_ttl_minutes(mut self, minutes: u64) -> Self {
		self.dish_cache_ttl_minutes = minutes;
		self
	}

	/// Sets the primary storage implementation and its table.
	pub fn storage(mut self, name: impl Into<String>, config: toml::Value) -> Self {
		self.storage = (name.into(), config);
		self
	}

	/// Sets the primary cache implementation and its table.
	pub fn cache(mut self, name: impl Into<String>, config: toml::Value) -> Self {
		self.cache = (name.into(), config);
		self
	}

	/// Sets the primary catalog implementation and its table.
	pub fn catalog(mut self, name: impl Into<String>, config: toml::Value) -> Self {
		self.catalog = (name.into(), config);
		self
	}

	/// Sets the primary payment implementation and its table.
	pub fn payment(mut self, name: impl Into<String>, config: toml::Value) -> Self {
		self.payment = (name.into(), config);
		self
	}

	pub fn reconciler(mut self, reconciler: ReconcilerConfig) -> Self {
		self.reconciler = reconciler;
		self
	}

	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	pub fn build(self) -> Config {
		let backend = |(name, table): (String, toml::Value)| BackendConfig {
			primary: name.clone(),
			implementations: HashMap::from([(name, table)]),
		};
		let (payment_name, payment_table) = self.payment;

		Config {
			shop: ShopConfig {
				id: self.shop_id,
				cart_ttl_minutes: self.cart_ttl_minutes,
				dish_cache_ttl_minutes: self.dish_cache_ttl_minutes,
				notification_channel: sky_types::ORDER_ARRIVED_CHANNEL.to_string(),
				cleanup_interval_seconds: 60,
				order_number_attempts: 5,
			},
			storage: backend(self.storage),
			cache: backend(self.cache),
			catalog: backend(self.catalog),
			payment: PaymentConfig {
				primary: payment_name.clone(),
				implementations: HashMap::from([(payment_name, payment_table)]),
				description: "sky take-out order".to_string(),
			},
			reconciler: self.reconciler,
			api: self.api,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_builder_defaults_pass_validation() {
		let config = ConfigBuilder::new().shop_id("built").build();
		let text = toml::to_string(&config).unwrap();
		let reparsed: Config = text.parse().unwrap();

		assert_eq!(reparsed.shop.id, "built");
		assert_eq!(reparsed.storage.primary, "memory");
		assert_eq!(reparsed.payment.primary, "mock");
	}
}
