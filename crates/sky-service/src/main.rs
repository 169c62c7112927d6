//! Main entry point for the sky take-out backend.
//!
//! This binary wires the order, cart, catalog and shop-status handlers to the
//! configured storage, cache, catalog and payment backends, runs the
//! background reconciler and notification listener, and serves the HTTP API
//! when it is enabled.

use clap::Parser;
use sky_config::Config;
use sky_core::{ShopBuilder, ShopEngine, ShopFactories};
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod server;

use sky_cache::implementations::memory::create_cache as create_memory_cache;
use sky_cache::implementations::redis::create_cache as create_redis_cache;
use sky_catalog::implementations::memory::create_catalog;
use sky_payment::implementations::mock::create_gateway as create_mock_gateway;
use sky_storage::implementations::file::create_storage as create_file_storage;
use sky_storage::implementations::memory::create_storage as create_memory_storage;

/// Command-line arguments for the take-out service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started take-out service");

	let config = Config::from_file(&args.config.to_string_lossy()).await?;
	tracing::info!("Loaded configuration [{}]", config.shop.id);

	let shop = Arc::new(build_shop(config.clone())?);

	match config.api.filter(|api| api.enabled) {
		Some(api_config) => {
			let api_shop = Arc::clone(&shop);

			tokio::select! {
				result = shop.run() => {
					tracing::info!("Engine finished");
					result?;
				}
				result = server::start_server(api_config, api_shop) => {
					tracing::info!("API server finished");
					result?;
				}
			}
		},
		None => {
			tracing::info!("Starting engine only");
			shop.run().await?;
		},
	}

	tracing::info!("Stopped take-out service");
	Ok(())
}

/// Macro to create a factory HashMap with the appropriate type aliases
macro_rules! create_factory_map {
    ($interface:path, $error:path, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};
}

/// Builds the engine with every backend this binary ships:
/// - Storage: in-memory, JSON file
/// - Cache: in-memory, Redis
/// - Catalog: in-memory menu from configuration
/// - Payment: mock gateway
fn build_shop(config: Config) -> Result<ShopEngine, Box<dyn std::error::Error>> {
	let builder = ShopBuilder::new(config);

	let storage_factories = create_factory_map!(
		sky_storage::StorageInterface,
		sky_storage::StorageError,
		"file" => create_file_storage,
		"memory" => create_memory_storage,
	);

	let cache_factories = create_factory_map!(
		sky_cache::CacheInterface,
		sky_cache::CacheError,
		"memory" => create_memory_cache,
		"redis" => create_redis_cache,
	);

	let catalog_factories = create_factory_map!(
		sky_catalog::CatalogInterface,
		sky_catalog::CatalogError,
		"memory" => create_catalog,
	);

	let payment_factories = create_factory_map!(
		sky_payment::PaymentInterface,
		sky_payment::PaymentError,
		"mock" => create_mock_gateway,
	);

	let factories = ShopFactories {
		storage_factories,
		cache_factories,
		catalog_factories,
		payment_factories,
	};

	Ok(builder.build(factories)?)
}
