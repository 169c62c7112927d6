//! Shop open/closed flag.

use crate::ShopError;
use sky_cache::CacheService;
use sky_types::{CacheKey, ShopStatus};
use std::sync::Arc;

/// Reads and writes the shop status kept in the cache.
pub struct ShopHandler {
	cache: Arc<CacheService>,
}

impl ShopHandler {
	pub fn new(cache: Arc<CacheService>) -> Self {
		Self { cache }
	}

	/// Stores the status without expiry.
	pub async fn set_status(&self, status: ShopStatus) -> Result<(), ShopError> {
		self.cache
			.set_json(&CacheKey::ShopStatus, &status, None)
			.await?;
		tracing::info!(status = ?status, "Shop status changed");
		Ok(())
	}

	/// Current status. A missing key or an unreachable cache reads as closed.
	pub async fn status(&self) -> ShopStatus {
		match self.cache.get_json(&CacheKey::ShopStatus).await {
			Ok(Some(status)) => status,
			Ok(None) => ShopStatus::Closed,
			Err(e) => {
				tracing::warn!(error = %e, "Failed to read shop status, reporting closed");
				ShopStatus::Closed
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::Harness;

	#[tokio::test]
	async fn test_status_defaults_to_closed_and_round_trips() {
		let harness = Harness::new().await;
		assert_eq!(harness.shop.status().await, ShopStatus::Closed);

		harness.shop.set_status(ShopStatus::Open).await.unwrap();
		assert_eq!(harness.shop.status().await, ShopStatus::Open);

		harness.shop.set_status(ShopStatus::Closed).await.unwrap();
		assert_eq!(harness.shop.status().await, ShopStatus::Closed);
	}

	#[tokio::test]
	async fn test_cache_outage() {
		let harness = Harness::with_failing_cache().await;
		assert_eq!(harness.shop.status().await, ShopStatus::Closed);
		assert!(matches!(
			harness.shop.set_status(ShopStatus::Open).await,
			Err(ShopError::Storage(_))
		));
	}
}
