//! Shop engine wiring the handlers to the backends.
//!
//! The engine owns the long-lived services and handlers shared by every
//! request, and runs the background tasks: the cache sweep, the daily
//! delivery reconciler and the notification listener.

pub mod lifecycle;

use crate::handlers::{CartHandler, CatalogHandler, OrderHandler, ShopHandler};
use crate::monitoring::{
	NotificationListener, NotificationPublisher, NotificationSink, TimeoutReconciler,
};
use crate::state::OrderStateMachine;
use sky_cache::CacheService;
use sky_catalog::CatalogService;
use sky_config::Config;
use sky_payment::PaymentService;
use sky_storage::StorageService;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Service error: {0}")]
	Service(String),
}

/// Main engine holding the shop's services and handlers.
#[derive(Clone)]
pub struct ShopEngine {
	/// Shop configuration.
	pub(crate) config: Config,
	/// Order and cart store.
	pub(crate) storage: Arc<StorageService>,
	/// Cache and pub/sub layer.
	pub(crate) cache: Arc<CacheService>,
	pub(crate) order_handler: Arc<OrderHandler>,
	pub(crate) cart_handler: Arc<CartHandler>,
	pub(crate) catalog_handler: Arc<CatalogHandler>,
	pub(crate) shop_handler: Arc<ShopHandler>,
	pub(crate) reconciler: Arc<TimeoutReconciler>,
	pub(crate) listener: Arc<NotificationListener>,
}

impl ShopEngine {
	/// Creates a new engine with the given services
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		cache: Arc<CacheService>,
		catalog: Arc<CatalogService>,
		payment: Arc<PaymentService>,
		sinks: Vec<Arc<dyn NotificationSink>>,
	) -> Self {
		let state_machine = Arc::new(OrderStateMachine::new(storage.clone()));
		let channel = config.shop.notification_channel.clone();
		let publisher = Arc::new(NotificationPublisher::new(cache.clone(), channel.clone()));

		let order_handler = Arc::new(OrderHandler::new(
			storage.clone(),
			cache.clone(),
			catalog.clone(),
			payment,
			state_machine,
			publisher,
			config.shop.order_number_attempts,
		));

		let cart_handler = Arc::new(CartHandler::new(
			storage.clone(),
			cache.clone(),
			catalog.clone(),
			minutes(config.shop.cart_ttl_minutes),
		));

		let catalog_handler = Arc::new(CatalogHandler::new(
			catalog,
			cache.clone(),
			minutes(config.shop.dish_cache_ttl_minutes),
		));

		let shop_handler = Arc::new(ShopHandler::new(cache.clone()));

		let reconciler = Arc::new(TimeoutReconciler::new(
			storage.clone(),
			config.reconciler.hour,
			config.reconciler.minute,
			config.reconciler.delivery_timeout_hours,
		));

		let listener = Arc::new(NotificationListener::new(cache.clone(), channel, sinks));

		Self {
			config,
			storage,
			cache,
			order_handler,
			cart_handler,
			catalog_handler,
			shop_handler,
			reconciler,
			listener,
		}
	}

	/// Runs the background tasks until interrupted.
	pub async fn run(&self) -> Result<(), EngineError> {
		self.initialize().await?;
		let handles = self.spawn_background_tasks();

		let signal = tokio::signal::ctrl_c().await;

		for handle in &handles {
			handle.abort();
		}
		signal.map_err(|e| EngineError::Service(format!("Failed to wait for shutdown: {}", e)))?;

		self.shutdown().await
	}

	/// Starts the cache sweep, the listener and, when enabled, the
	/// reconciler. The caller owns the returned handles.
	pub(crate) fn spawn_background_tasks(&self) -> Vec<JoinHandle<()>> {
		let mut handles = Vec::new();

		let cache = self.cache.clone();
		let cleanup_interval = tokio::time::interval(Duration::from_secs(
			self.config.shop.cleanup_interval_seconds.max(1),
		));
		handles.push(tokio::spawn(async move {
			let mut interval = cleanup_interval;
			loop {
				interval.tick().await;
				match cache.cleanup_expired().await {
					Ok(count) if count > 0 => {
						tracing::debug!("Cache cleanup: removed {} expired entries", count);
					},
					Err(e) => {
						tracing::warn!("Cache cleanup failed: {}", e);
					},
					_ => {},
				}
			}
		}));

		let listener = self.listener.clone();
		handles.push(tokio::spawn(async move { listener.run().await }));

		if self.config.reconciler.enabled {
			let reconciler = self.reconciler.clone();
			handles.push(tokio::spawn(async move { reconciler.run().await }));
		} else {
			tracing::info!("Delivery reconciler disabled");
		}

		handles
	}

	/// Returns a reference to the configuration.
	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	pub fn cache(&self) -> &Arc<CacheService> {
		&self.cache
	}

	pub fn orders(&self) -> &Arc<OrderHandler> {
		&self.order_handler
	}

	pub fn carts(&self) -> &Arc<CartHandler> {
		&self.cart_handler
	}

	pub fn dishes(&self) -> &Arc<CatalogHandler> {
		&self.catalog_handler
	}

	pub fn shop(&self) -> &Arc<ShopHandler> {
		&self.shop_handler
	}

	pub fn reconciler(&self) -> &Arc<TimeoutReconciler> {
		&self.reconciler
	}
}

fn minutes(minutes: u64) -> Duration {
	Duration::from_secs(minutes.saturating_mul(60))
}
