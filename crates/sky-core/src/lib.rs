//! Core of the sky take-out backend.
//!
//! This crate holds the order state machine, the cart, catalog and shop
//! status handlers that keep the cache consistent with the store, the
//! background reconciler and notification tasks, and the builder that wires
//! everything to the configured backends.

pub mod builder;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod monitoring;
pub mod state;

pub use builder::{BuilderError, ShopBuilder, ShopFactories};
pub use engine::{EngineError, ShopEngine};
pub use error::ShopError;
pub use handlers::{CartHandler, CatalogHandler, OrderHandler, ShopHandler};
pub use monitoring::{LoggingSink, NotificationSink};

#[cfg(test)]
pub(crate) mod test_support {
	use crate::handlers::{CartHandler, CatalogHandler, OrderHandler, ShopHandler};
	use crate::monitoring::NotificationSink;
	use crate::state::OrderStateMachine;
	use crate::{ShopBuilder, ShopEngine, ShopFactories};
	use async_trait::async_trait;
	use chrono::Utc;
	use futures::StreamExt;
	use rust_decimal::Decimal;
	use sky_cache::{CacheError, CacheInterface, CacheService, MessageStream};
	use sky_config::builders::ConfigBuilder;
	use sky_storage::StorageService;
	use sky_types::{
		ChannelMessage, ConfigSchema, ItemSelector, NotificationMessage, Order, OrderLineItem,
		OrderStatus, PayMethod, PayStatus, UserContext, ORDER_ARRIVED_CHANNEL,
	};
	use std::collections::HashMap;
	use std::sync::Arc;
	use std::time::Duration;
	use tokio::sync::Mutex;

	/// Category 1 holds two enabled dishes, category 2 one disabled dish that
	/// is part of combo 1. Address 1 belongs to user 7.
	const MENU: &str = r#"
[[dishes]]
id = 1
name = "Kung Pao Chicken"
category_id = 1
price = "10.00"

[[dishes]]
id = 2
name = "Mapo Tofu"
category_id = 1
price = "8.00"

[[dishes]]
id = 3
name = "Rice"
category_id = 2
price = "2.00"
enabled = false

[[combos]]
id = 1
name = "Lunch Set"
category_id = 3
price = "5.00"
dish_ids = [3]

[[addresses]]
id = 1
user_id = 7
consignee = "Ann"
phone = "13800000000"
detail = "1 Main St"
"#;

	pub fn sample_order(status: OrderStatus, pay_status: PayStatus) -> Order {
		let now = Utc::now();
		Order {
			id: 0,
			number: "202403070900001230007".to_string(),
			status,
			user_id: 7,
			user_name: Some("Ann".to_string()),
			address_book_id: 1,
			consignee: Some("Ann".to_string()),
			phone: Some("13800000000".to_string()),
			address: Some("1 Main St".to_string()),
			order_time: now,
			checkout_time: (pay_status == PayStatus::Paid).then_some(now),
			pay_method: PayMethod::Wechat,
			pay_status,
			amount: Decimal::new(2500, 2),
			remark: None,
			cancel_reason: None,
			rejection_reason: None,
			cancel_time: None,
			delivery_time: None,
		}
	}

	/// Engine over in-process backends with direct access to its parts.
	pub struct Harness {
		pub engine: ShopEngine,
		pub storage: Arc<StorageService>,
		pub cache: Arc<CacheService>,
		pub state_machine: Arc<OrderStateMachine>,
		pub orders: Arc<OrderHandler>,
		pub carts: Arc<CartHandler>,
		pub dishes: Arc<CatalogHandler>,
		pub shop: Arc<ShopHandler>,
	}

	impl Harness {
		pub async fn new() -> Self {
			Self::build("memory", Vec::new())
		}

		/// Every cache call fails.
		pub async fn with_failing_cache() -> Self {
			Self::build("failing", Vec::new())
		}

		pub async fn with_sinks(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
			Self::build("memory", sinks)
		}

		fn build(cache: &str, sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
			let menu: toml::Value = toml::from_str(MENU).unwrap();
			let config = ConfigBuilder::new()
				.catalog("memory", menu)
				.cache(cache, toml::Value::Table(toml::map::Map::new()))
				.build();

			let mut cache_factories: HashMap<String, sky_cache::CacheFactory> =
				sky_cache::get_all_implementations()
					.into_iter()
					.map(|(name, factory)| (name.to_string(), factory))
					.collect();
			cache_factories.insert("failing".to_string(), |_| {
				Ok(Box::new(FailingCache) as Box<dyn CacheInterface>)
			});

			let factories = ShopFactories {
				storage_factories: HashMap::from([(
					"memory".to_string(),
					sky_storage::implementations::memory::create_storage as sky_storage::StorageFactory,
				)]),
				cache_factories,
				catalog_factories: HashMap::from([(
					"memory".to_string(),
					sky_catalog::implementations::memory::create_catalog as sky_catalog::CatalogFactory,
				)]),
				payment_factories: HashMap::from([(
					"mock".to_string(),
					sky_payment::implementations::mock::create_gateway as sky_payment::PaymentFactory,
				)]),
			};

			let mut builder = ShopBuilder::new(config);
			for sink in sinks {
				builder = builder.with_sink(sink);
			}
			let engine = builder.build(factories).unwrap();

			Self {
				storage: engine.storage().clone(),
				cache: engine.cache().clone(),
				state_machine: Arc::new(OrderStateMachine::new(engine.storage().clone())),
				orders: engine.orders().clone(),
				carts: engine.carts().clone(),
				dishes: engine.dishes().clone(),
				shop: engine.shop().clone(),
				engine,
			}
		}

		/// The user owning address 1.
		pub fn customer(&self) -> UserContext {
			UserContext::new(7).with_name("Ann")
		}

		/// Stores an order with a single line for dish 1.
		pub async fn place(&self, order: Order) -> Order {
			let line = OrderLineItem {
				id: 0,
				order_id: 0,
				name: "Kung Pao Chicken".to_string(),
				image: None,
				item: ItemSelector::Dish(1),
				number: 2,
				amount: Decimal::new(1000, 2),
			};
			self.storage.place_order(order, vec![line]).await.unwrap()
		}

		pub async fn subscribe(&self) -> MessageStream {
			self.cache.psubscribe(ORDER_ARRIVED_CHANNEL).await.unwrap()
		}

		pub async fn next_notification(&self, stream: &mut MessageStream) -> NotificationMessage {
			let message = tokio::time::timeout(Duration::from_secs(1), stream.next())
				.await
				.unwrap()
				.unwrap();
			serde_json::from_str(&message.payload).unwrap()
		}

		pub async fn no_notification(&self, stream: &mut MessageStream) -> bool {
			tokio::time::timeout(Duration::from_millis(50), stream.next())
				.await
				.is_err()
		}
	}

	/// Sink that keeps every delivered message.
	#[derive(Default)]
	pub struct RecordingSink {
		messages: Mutex<Vec<ChannelMessage>>,
	}

	impl RecordingSink {
		pub async fn messages(&self) -> Vec<ChannelMessage> {
			self.messages.lock().await.clone()
		}
	}

	#[async_trait]
	impl NotificationSink for RecordingSink {
		async fn deliver(&self, message: &ChannelMessage) {
			self.messages.lock().await.push(message.clone());
		}
	}

	/// Cache whose every call fails, standing in for an unreachable server.
	pub struct FailingCache;

	fn unavailable<T>() -> Result<T, CacheError> {
		Err(CacheError::Backend("connection refused".to_string()))
	}

	#[async_trait]
	impl CacheInterface for FailingCache {
		async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
			unavailable()
		}

		async fn set(
			&self,
			_key: &str,
			_value: String,
			_ttl: Option<Duration>,
		) -> Result<(), CacheError> {
			unavailable()
		}

		async fn hget(&self, _key: &str, _field: &str) -> Result<Option<String>, CacheError> {
			unavailable()
		}

		async fn hset(&self, _key: &str, _field: &str, _value: String) -> Result<(), CacheError> {
			unavailable()
		}

		async fn hdel(&self, _key: &str, _field: &str) -> Result<(), CacheError> {
			unavailable()
		}

		async fn hgetall(&self, _key: &str) -> Result<Vec<(String, String)>, CacheError> {
			unavailable()
		}

		async fn delete(&self, _keys: &[String]) -> Result<usize, CacheError> {
			unavailable()
		}

		async fn expire(&self, _key: &str, _ttl: Duration) -> Result<bool, CacheError> {
			unavailable()
		}

		async fn publish(&self, _channel: &str, _message: String) -> Result<usize, CacheError> {
			unavailable()
		}

		async fn psubscribe(&self, _pattern: &str) -> Result<MessageStream, CacheError> {
			unavailable()
		}

		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			Box::new(sky_cache::implementations::memory::MemoryCacheSchema)
		}
	}
}
