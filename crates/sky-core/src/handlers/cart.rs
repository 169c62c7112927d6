//! Shopping cart handler.
//!
//! Cart rows live in the store. The cache keeps a hash per user with one
//! field per item and a whole-key expiry that every mutation refreshes. Reads
//! serve a non-empty hash directly and rebuild it from the store otherwise.
//! A failing cache only costs performance: every cache call is logged and
//! skipped.

use crate::ShopError;
use chrono::Utc;
use sky_cache::CacheService;
use sky_catalog::{CatalogError, CatalogService};
use sky_storage::StorageService;
use sky_types::{CacheKey, CartItem, CartItemRequest, ItemSelector, UserContext};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Handler for cart mutations and listings.
pub struct CartHandler {
	storage: Arc<StorageService>,
	cache: Arc<CacheService>,
	catalog: Arc<CatalogService>,
	ttl: Duration,
}

impl CartHandler {
	pub fn new(
		storage: Arc<StorageService>,
		cache: Arc<CacheService>,
		catalog: Arc<CatalogService>,
		ttl: Duration,
	) -> Self {
		Self {
			storage,
			cache,
			catalog,
			ttl,
		}
	}

	/// Adds one unit of an item, creating the row on first add.
	#[instrument(skip_all, fields(user_id = %ctx.user_id))]
	pub async fn add(&self, ctx: &UserContext, request: &CartItemRequest) -> Result<CartItem, ShopError> {
		let item = request.selector().map_err(ShopError::InvalidRequest)?;

		let row = match self.storage.find_cart_item(ctx.user_id, &item).await? {
			Some(mut row) => {
				row.number += 1;
				self.storage
					.update_cart_item_number(row.id, row.number)
					.await?;
				row
			},
			None => {
				let snapshot = self.catalog.snapshot(item).await.map_err(|e| match e {
					CatalogError::NotFound(_) => ShopError::CatalogItemNotFound(item.to_string()),
					other => other.into(),
				})?;
				self.storage
					.insert_cart_item(CartItem {
						id: 0,
						user_id: ctx.user_id,
						item,
						name: snapshot.name,
						image: snapshot.image,
						number: 1,
						amount: snapshot.price,
						create_time: Utc::now(),
					})
					.await?
			},
		};

		tracing::debug!(item = %item, number = row.number, "Cart item added");
		self.mirror_row(&row).await;
		Ok(row)
	}

	/// Lists the caller's cart, preferring the cached mirror.
	#[instrument(skip_all, fields(user_id = %ctx.user_id))]
	pub async fn list(&self, ctx: &UserContext) -> Result<Vec<CartItem>, ShopError> {
		let key = CacheKey::Cart(ctx.user_id);
		match self.cache.hvalues_json::<CartItem>(&key).await {
			Ok(mut rows) if !rows.is_empty() => {
				rows.sort_by_key(|row| row.id);
				return Ok(rows);
			},
			Ok(_) => {},
			Err(e) => tracing::warn!(error = %e, "Cart cache read failed, using store"),
		}

		let rows = self.storage.list_cart(ctx.user_id).await?;
		if !rows.is_empty() {
			self.repopulate(ctx.user_id, &rows).await;
		}
		Ok(rows)
	}

	/// Removes one unit of an item. Returns the remaining row, or `None`
	/// when the last unit was removed.
	#[instrument(skip_all, fields(user_id = %ctx.user_id))]
	pub async fn sub(
		&self,
		ctx: &UserContext,
		request: &CartItemRequest,
	) -> Result<Option<CartItem>, ShopError> {
		let item = request.selector().map_err(ShopError::InvalidRequest)?;
		let Some(mut row) = self.storage.find_cart_item(ctx.user_id, &item).await? else {
			return Err(ShopError::NotFound(format!("cart item {}", item)));
		};

		if row.number > 1 {
			row.number -= 1;
			self.storage
				.update_cart_item_number(row.id, row.number)
				.await?;
			self.mirror_row(&row).await;
			return Ok(Some(row));
		}

		self.storage.delete_cart_item(row.id).await?;
		self.drop_field(ctx.user_id, &item).await;
		Ok(None)
	}

	/// Empties the caller's cart in the store and the cache.
	#[instrument(skip_all, fields(user_id = %ctx.user_id))]
	pub async fn clean(&self, ctx: &UserContext) -> Result<(), ShopError> {
		let removed = self.storage.clear_cart(ctx.user_id).await?;
		if let Err(e) = self.cache.delete(&[CacheKey::Cart(ctx.user_id)]).await {
			tracing::warn!(error = %e, "Failed to evict cart cache");
		}
		tracing::debug!(removed = removed, "Cart cleaned");
		Ok(())
	}

	async fn mirror_row(&self, row: &CartItem) {
		let key = CacheKey::Cart(row.user_id);
		if let Err(e) = self
			.cache
			.hset_json(&key, &row.item.cache_field(), row)
			.await
		{
			tracing::warn!(item = %row.item, error = %e, "Failed to mirror cart row");
			return;
		}
		self.refresh_ttl(&key).await;
	}

	async fn drop_field(&self, user_id: u64, item: &ItemSelector) {
		let key = CacheKey::Cart(user_id);
		if let Err(e) = self.cache.hdel(&key, &item.cache_field()).await {
			tracing::warn!(item = %item, error = %e, "Failed to drop cart field");
			return;
		}
		self.refresh_ttl(&key).await;
	}

	async fn repopulate(&self, user_id: u64, rows: &[CartItem]) {
		let key = CacheKey::Cart(user_id);
		for row in rows {
			if let Err(e) = self
				.cache
				.hset_json(&key, &row.item.cache_field(), row)
				.await
			{
				tracing::warn!(error = %e, "Failed to repopulate cart cache");
				return;
			}
		}
		self.refresh_ttl(&key).await;
	}

	async fn refresh_ttl(&self, key: &CacheKey) {
		// false only means the hash is gone, which is fine after a last delete
		if let Err(e) = self.cache.expire(key, self.ttl).await {
			tracing::warn!(key = %key, error = %e, "Failed to refresh cart expiry");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::Harness;
	use rust_decimal::Decimal;

	fn dish(id: u64) -> CartItemRequest {
		CartItemRequest {
			dish_id: Some(id),
			combo_id: None,
		}
	}

	async fn cached(harness: &Harness, user_id: u64) -> Vec<CartItem> {
		harness
			.cache
			.hvalues_json(&CacheKey::Cart(user_id))
			.await
			.unwrap()
	}

	#[tokio::test]
	async fn test_add_sub_add_returns_to_one() {
		let harness = Harness::new().await;
		let ctx = harness.customer();

		let first = harness.carts.add(&ctx, &dish(1)).await.unwrap();
		assert_eq!(first.number, 1);
		assert_eq!(first.amount, Decimal::new(1000, 2));
		assert!(harness.carts.sub(&ctx, &dish(1)).await.unwrap().is_none());
		assert!(cached(&harness, ctx.user_id).await.is_empty());

		let again = harness.carts.add(&ctx, &dish(1)).await.unwrap();
		assert_eq!(again.number, 1);

		let stored = harness.storage.list_cart(ctx.user_id).await.unwrap();
		assert_eq!(stored.len(), 1);
		assert_eq!(stored[0].number, 1);
		assert_eq!(cached(&harness, ctx.user_id).await, stored);
	}

	#[tokio::test]
	async fn test_repeated_add_increments_and_sub_decrements() {
		let harness = Harness::new().await;
		let ctx = harness.customer();

		harness.carts.add(&ctx, &dish(1)).await.unwrap();
		let row = harness.carts.add(&ctx, &dish(1)).await.unwrap();
		assert_eq!(row.number, 2);
		assert_eq!(cached(&harness, ctx.user_id).await[0].number, 2);

		let row = harness.carts.sub(&ctx, &dish(1)).await.unwrap().unwrap();
		assert_eq!(row.number, 1);
		assert_eq!(
			harness.storage.list_cart(ctx.user_id).await.unwrap()[0].number,
			1
		);
	}

	#[tokio::test]
	async fn test_list_serves_cache_then_rebuilds_from_store() {
		let harness = Harness::new().await;
		let ctx = harness.customer();
		harness.carts.add(&ctx, &dish(1)).await.unwrap();
		harness
			.carts
			.add(
				&ctx,
				&CartItemRequest {
					dish_id: None,
					combo_id: Some(1),
				},
			)
			.await
			.unwrap();

		// A warm cache answers without touching the store.
		harness.storage.clear_cart(ctx.user_id).await.unwrap();
		assert_eq!(harness.carts.list(&ctx).await.unwrap().len(), 2);

		harness
			.cache
			.delete(&[CacheKey::Cart(ctx.user_id)])
			.await
			.unwrap();
		assert!(harness.carts.list(&ctx).await.unwrap().is_empty());

		harness.carts.add(&ctx, &dish(2)).await.unwrap();
		harness
			.cache
			.delete(&[CacheKey::Cart(ctx.user_id)])
			.await
			.unwrap();
		let rows = harness.carts.list(&ctx).await.unwrap();
		assert_eq!(rows.len(), 1);
		assert_eq!(cached(&harness, ctx.user_id).await, rows);
	}

	#[tokio::test]
	async fn test_clean_empties_store_and_cache() {
		let harness = Harness::new().await;
		let ctx = harness.customer();
		harness.carts.add(&ctx, &dish(1)).await.unwrap();
		harness.carts.add(&ctx, &dish(2)).await.unwrap();

		harness.carts.clean(&ctx).await.unwrap();

		assert!(harness.storage.list_cart(ctx.user_id).await.unwrap().is_empty());
		assert!(cached(&harness, ctx.user_id).await.is_empty());
		assert!(harness.carts.list(&ctx).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_request_errors() {
		let harness = Harness::new().await;
		let ctx = harness.customer();

		let err = harness.carts.add(&ctx, &dish(99)).await.unwrap_err();
		assert!(matches!(err, ShopError::CatalogItemNotFound(_)));
		assert_eq!(err.to_string(), "dish 99 not found in catalog");

		let both = CartItemRequest {
			dish_id: Some(1),
			combo_id: Some(1),
		};
		assert!(matches!(
			harness.carts.add(&ctx, &both).await,
			Err(ShopError::InvalidRequest(_))
		));
		assert!(matches!(
			harness.carts.sub(&ctx, &dish(1)).await,
			Err(ShopError::NotFound(_))
		));
	}

	#[tokio::test(start_paused = true)]
	async fn test_mutations_refresh_expiry() {
		let harness = Harness::new().await;
		let ctx = harness.customer();

		harness.carts.add(&ctx, &dish(1)).await.unwrap();
		tokio::time::advance(Duration::from_secs(20 * 60)).await;
		harness.carts.add(&ctx, &dish(2)).await.unwrap();
		tokio::time::advance(Duration::from_secs(20 * 60)).await;
		assert_eq!(cached(&harness, ctx.user_id).await.len(), 2);

		tokio::time::advance(Duration::from_secs(11 * 60)).await;
		assert!(cached(&harness, ctx.user_id).await.is_empty());
		// The store still has the rows and the next listing rebuilds the mirror.
		assert_eq!(harness.carts.list(&ctx).await.unwrap().len(), 2);
	}

	#[tokio::test]
	async fn test_cart_works_without_cache() {
		let harness = Harness::with_failing_cache().await;
		let ctx = harness.customer();

		harness.carts.add(&ctx, &dish(1)).await.unwrap();
		let row = harness.carts.add(&ctx, &dish(1)).await.unwrap();
		assert_eq!(row.number, 2);
		assert_eq!(harness.carts.list(&ctx).await.unwrap().len(), 1);
		harness.carts.sub(&ctx, &dish(1)).await.unwrap();
		harness.carts.clean(&ctx).await.unwrap();
		assert!(harness.carts.list(&ctx).await.unwrap().is_empty());
	}
}
