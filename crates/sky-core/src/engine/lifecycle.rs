//! Lifecycle management for the shop engine.
//!
//! Handles the start-up and shutdown steps around the background tasks.

use super::{EngineError, ShopEngine};
use sky_types::ShopStatus;

impl ShopEngine {
	/// Performs any initialization required before running
	pub async fn initialize(&self) -> Result<(), EngineError> {
		let config = &self.config;
		tracing::info!(
			shop = %config.shop.id,
			storage = %config.storage.primary,
			cache = %config.cache.primary,
			catalog = %config.catalog.primary,
			payment = %config.payment.primary,
			"Initializing shop engine"
		);

		// The flag may survive a restart in a shared cache, report what staff will see.
		let status = self.shop_handler.status().await;
		tracing::info!(status = ?status, open = status == ShopStatus::Open, "Shop status");
		Ok(())
	}

	/// Performs cleanup operations
	pub async fn shutdown(&self) -> Result<(), EngineError> {
		tracing::info!(shop = %self.config.shop.id, "Shutting down shop engine");
		Ok(())
	}
}
