//! Builder pattern for constructing shop engines.
//!
//! Composes a ShopEngine from pluggable storage, cache, catalog and payment
//! implementations using factory functions keyed by implementation name.

use crate::engine::ShopEngine;
use crate::monitoring::{LoggingSink, NotificationSink};
use sky_cache::{CacheError, CacheInterface, CacheService};
use sky_catalog::{CatalogError, CatalogInterface, CatalogService};
use sky_config::Config;
use sky_payment::{PaymentError, PaymentInterface, PaymentService};
use sky_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during shop engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Container for all factory functions needed to build a ShopEngine.
///
/// Each factory takes the implementation's TOML table and returns the
/// backend, validating the table on the way.
pub struct ShopFactories<SF, CF, CAF, PF> {
	pub storage_factories: HashMap<String, SF>,
	pub cache_factories: HashMap<String, CF>,
	pub catalog_factories: HashMap<String, CAF>,
	pub payment_factories: HashMap<String, PF>,
}

/// Builder for constructing a ShopEngine with pluggable implementations.
pub struct ShopBuilder {
	config: Config,
	sinks: Vec<Arc<dyn NotificationSink>>,
}

impl ShopBuilder {
	/// Creates a new builder. Notifications are logged unless other sinks
	/// are added.
	pub fn new(config: Config) -> Self {
		Self {
			config,
			sinks: vec![Arc::new(LoggingSink)],
		}
	}

	/// Adds a receiver for order notifications picked up by the listener.
	pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
		self.sinks.push(sink);
		self
	}

	/// Builds the ShopEngine using factories for each component type.
	pub fn build<SF, CF, CAF, PF>(
		self,
		factories: ShopFactories<SF, CF, CAF, PF>,
	) -> Result<ShopEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		CF: Fn(&toml::Value) -> Result<Box<dyn CacheInterface>, CacheError>,
		CAF: Fn(&toml::Value) -> Result<Box<dyn CatalogInterface>, CatalogError>,
		PF: Fn(&toml::Value) -> Result<Box<dyn PaymentInterface>, PaymentError>,
	{
		let storage_backend = load_primary(
			"storage",
			&self.config.storage.primary,
			&self.config.storage.implementations,
			&factories.storage_factories,
		)?;
		let storage = Arc::new(StorageService::new(storage_backend));

		let cache_backend = load_primary(
			"cache",
			&self.config.cache.primary,
			&self.config.cache.implementations,
			&factories.cache_factories,
		)?;
		let cache = Arc::new(CacheService::new(cache_backend));

		let catalog_backend = load_primary(
			"catalog",
			&self.config.catalog.primary,
			&self.config.catalog.implementations,
			&factories.catalog_factories,
		)?;
		let catalog = Arc::new(CatalogService::new(catalog_backend));

		let gateway = load_primary(
			"payment",
			&self.config.payment.primary,
			&self.config.payment.implementations,
			&factories.payment_factories,
		)?;
		let payment = Arc::new(PaymentService::new(
			gateway,
			self.config.payment.description.clone(),
		));

		Ok(ShopEngine::new(
			self.config,
			storage,
			cache,
			catalog,
			payment,
			self.sinks,
		))
	}
}

/// Instantiates every configured implementation that has a factory and
/// returns the primary one.
fn load_primary<T, E, F>(
	component: &'static str,
	primary: &str,
	implementations: &HashMap<String, toml::Value>,
	factories: &HashMap<String, F>,
) -> Result<Box<T>, BuilderError>
where
	T: ?Sized,
	E: Display,
	F: Fn(&toml::Value) -> Result<Box<T>, E>,
{
	let mut loaded = HashMap::new();
	for (name, config) in implementations {
		let Some(factory) = factories.get(name) else {
			tracing::warn!(component = component, implementation = %name, "No factory registered, skipping");
			continue;
		};
		match factory(config) {
			Ok(implementation) => {
				let is_primary = primary == name;
				tracing::info!(component = component, implementation = %name, enabled = %is_primary, "Loaded");
				loaded.insert(name.clone(), implementation);
			},
			Err(e) => {
				tracing::error!(
					component = component,
					implementation = %name,
					error = %e,
					"Failed to create implementation"
				);
				return Err(BuilderError::Config(format!(
					"Failed to create {} implementation '{}': {}",
					component, name, e
				)));
			},
		}
	}

	if loaded.is_empty() {
		return Err(BuilderError::MissingComponent(format!(
			"no {} implementation available",
			component
		)));
	}

	loaded.remove(primary).ok_or_else(|| {
		BuilderError::Config(format!(
			"Primary {} '{}' failed to load or has invalid configuration",
			component, primary
		))
	})
}
