//! Dish listings with read-through caching and write invalidation.

use crate::ShopError;
use sky_cache::CacheService;
use sky_catalog::CatalogService;
use sky_types::{CacheEviction, CacheKey, Dish, DishPageQuery, DishRequest, ItemStatus, Page};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Handler for the customer dish listing and staff dish maintenance.
pub struct CatalogHandler {
	catalog: Arc<CatalogService>,
	cache: Arc<CacheService>,
	ttl: Duration,
}

impl CatalogHandler {
	pub fn new(catalog: Arc<CatalogService>, cache: Arc<CacheService>, ttl: Duration) -> Self {
		Self {
			catalog,
			cache,
			ttl,
		}
	}

	/// Enabled dishes of a category, served from the cache when present.
	#[instrument(skip_all, fields(category_id = %category_id))]
	pub async fn list_dishes(&self, category_id: u64) -> Result<Vec<Dish>, ShopError> {
		let key = CacheKey::DishCategory(category_id);
		match self.cache.get_json::<Vec<Dish>>(&key).await {
			Ok(Some(dishes)) => return Ok(dishes),
			Ok(None) => {},
			Err(e) => tracing::warn!(error = %e, "Dish cache read failed, using catalog"),
		}

		let dishes = self
			.catalog
			.dishes_by_category(category_id, Some(ItemStatus::Enabled))
			.await?;
		if let Err(e) = self.cache.set_json(&key, &dishes, Some(self.ttl)).await {
			tracing::warn!(error = %e, "Failed to cache dish listing");
		}
		Ok(dishes)
	}

	/// Every dish of a category regardless of status. Never cached.
	pub async fn admin_list_dishes(&self, category_id: u64) -> Result<Vec<Dish>, ShopError> {
		Ok(self.catalog.dishes_by_category(category_id, None).await?)
	}

	/// Staff dish page filtered by name, category and status. Never cached.
	#[instrument(skip_all, fields(page = query.page, page_size = query.page_size))]
	pub async fn page_dishes(&self, query: &DishPageQuery) -> Result<Page<Dish>, ShopError> {
		if query.page_size == 0 {
			return Err(ShopError::InvalidRequest("page size must be positive".into()));
		}
		Ok(self.catalog.search_dishes(query).await?)
	}

	pub async fn dish(&self, id: u64) -> Result<Dish, ShopError> {
		Ok(self.catalog.dish(id).await?)
	}

	#[instrument(skip_all)]
	pub async fn save_dish(&self, request: DishRequest) -> Result<Dish, ShopError> {
		let dish = self.catalog.save_dish(request).await?;
		tracing::info!(dish_id = %dish.id, category_id = %dish.category_id, "Dish created");

		let categories = self
			.categories_for(&[CacheEviction::ByCategoryId(dish.category_id)])
			.await;
		self.evict(categories).await;
		Ok(dish)
	}

	/// Updates a dish. Moving it to another category evicts both listings.
	#[instrument(skip_all)]
	pub async fn update_dish(&self, request: DishRequest) -> Result<Dish, ShopError> {
		let id = request
			.id
			.ok_or_else(|| ShopError::InvalidRequest("dish id is required for update".into()))?;
		let previous = self.catalog.dish(id).await?;
		let dish = self.catalog.update_dish(request).await?;
		tracing::info!(dish_id = %dish.id, "Dish updated");

		let categories = self
			.categories_for(&[
				CacheEviction::ByCategoryId(previous.category_id),
				CacheEviction::ByDishId(dish.id),
			])
			.await;
		self.evict(categories).await;
		Ok(dish)
	}

	/// Deletes a batch of dishes.
	#[instrument(skip_all, fields(count = ids.len()))]
	pub async fn delete_dishes(&self, ids: &[u64]) -> Result<(), ShopError> {
		if ids.is_empty() {
			return Err(ShopError::InvalidRequest("no dish ids given".into()));
		}
		// Resolve first, the dishes are gone afterwards.
		let categories = self
			.categories_for(&[CacheEviction::ByDishIds(ids.to_vec())])
			.await;
		self.catalog.delete_dishes(ids).await?;
		tracing::info!(ids = ?ids, "Dishes deleted");

		self.evict(categories).await;
		Ok(())
	}

	#[instrument(skip_all, fields(dish_id = %id))]
	pub async fn set_dish_status(&self, id: u64, status: ItemStatus) -> Result<Dish, ShopError> {
		let dish = self.catalog.set_dish_status(id, status).await?;
		tracing::info!(status = ?status, "Dish status changed");

		let categories = self.categories_for(&[CacheEviction::ByDishId(id)]).await;
		self.evict(categories).await;
		Ok(dish)
	}

	/// Resolves eviction requests to the distinct categories they touch.
	/// Dish ids the catalog cannot resolve are skipped.
	async fn categories_for(&self, evictions: &[CacheEviction]) -> BTreeSet<u64> {
		let mut categories = BTreeSet::new();
		for eviction in evictions {
			match eviction {
				CacheEviction::ByCategoryId(category_id) => {
					categories.insert(*category_id);
				},
				CacheEviction::ByDishId(id) => {
					categories.extend(self.category_of(*id).await);
				},
				CacheEviction::ByDishIds(ids) => {
					for id in ids {
						categories.extend(self.category_of(*id).await);
					}
				},
			}
		}
		categories
	}

	async fn category_of(&self, dish_id: u64) -> Option<u64> {
		match self.catalog.dish(dish_id).await {
			Ok(dish) => Some(dish.category_id),
			Err(e) => {
				tracing::warn!(dish_id = %dish_id, error = %e, "Skipping eviction for unresolved dish");
				None
			},
		}
	}

	async fn evict(&self, categories: BTreeSet<u64>) {
		let keys: Vec<CacheKey> = categories
			.into_iter()
			.map(CacheKey::DishCategory)
			.collect();
		match self.cache.delete(&keys).await {
			Ok(removed) => {
				tracing::debug!(keys = keys.len(), removed = removed, "Evicted dish listings");
			},
			Err(e) => tracing::warn!(error = %e, "Failed to evict dish listings"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::Harness;
	use rust_decimal::Decimal;

	fn request(id: Option<u64>, name: &str, category_id: u64, price: i64) -> DishRequest {
		DishRequest {
			id,
			name: name.into(),
			category_id,
			price: Decimal::new(price, 2),
			image: None,
			description: None,
			status: Some(ItemStatus::Enabled),
		}
	}

	async fn is_cached(harness: &Harness, category_id: u64) -> bool {
		harness
			.cache
			.get_json::<Vec<Dish>>(&CacheKey::DishCategory(category_id))
			.await
			.unwrap()
			.is_some()
	}

	#[tokio::test]
	async fn test_listing_is_cached_and_refreshed_on_update() {
		let harness = Harness::new().await;

		let dishes = harness.dishes.list_dishes(1).await.unwrap();
		assert_eq!(dishes.len(), 2);
		assert!(is_cached(&harness, 1).await);

		harness
			.dishes
			.update_dish(request(Some(1), "Kung Pao Chicken", 1, 1200))
			.await
			.unwrap();
		assert!(!is_cached(&harness, 1).await);

		let dishes = harness.dishes.list_dishes(1).await.unwrap();
		assert_eq!(dishes[0].price, Decimal::new(1200, 2));
	}

	#[tokio::test]
	async fn test_listing_hides_disabled_dishes() {
		let harness = Harness::new().await;
		assert!(harness.dishes.list_dishes(2).await.unwrap().is_empty());
		assert_eq!(harness.dishes.admin_list_dishes(2).await.unwrap().len(), 1);

		harness
			.dishes
			.set_dish_status(2, ItemStatus::Disabled)
			.await
			.unwrap();
		assert_eq!(harness.dishes.list_dishes(1).await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_page_dishes_includes_disabled() {
		let harness = Harness::new().await;
		harness.dishes.list_dishes(2).await.unwrap();

		let page = harness
			.dishes
			.page_dishes(&DishPageQuery {
				status: Some(ItemStatus::Disabled),
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(page.total, 1);
		assert_eq!(page.records[0].name, "Rice");

		let page = harness
			.dishes
			.page_dishes(&DishPageQuery { page_size: 1, ..Default::default() })
			.await
			.unwrap();
		assert_eq!(page.total, 3);
		assert_eq!(page.records[0].id, 3);

		let err = harness
			.dishes
			.page_dishes(&DishPageQuery { page_size: 0, ..Default::default() })
			.await
			.unwrap_err();
		assert!(matches!(err, ShopError::InvalidRequest(_)));
	}

	#[tokio::test]
	async fn test_category_move_evicts_both_listings() {
		let harness = Harness::new().await;
		harness.dishes.list_dishes(1).await.unwrap();
		harness.dishes.list_dishes(2).await.unwrap();

		harness
			.dishes
			.update_dish(request(Some(2), "Mapo Tofu", 2, 800))
			.await
			.unwrap();

		assert!(!is_cached(&harness, 1).await);
		assert!(!is_cached(&harness, 2).await);
		assert_eq!(harness.dishes.list_dishes(1).await.unwrap().len(), 1);
		assert_eq!(harness.dishes.list_dishes(2).await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_delete_resolves_categories_before_removal() {
		let harness = Harness::new().await;
		let dumplings = harness
			.dishes
			.save_dish(DishRequest {
				status: None,
				..request(None, "Dumplings", 4, 1500)
			})
			.await
			.unwrap();
		harness.dishes.admin_list_dishes(4).await.unwrap();
		harness.dishes.list_dishes(4).await.unwrap();
		assert!(is_cached(&harness, 4).await);

		harness
			.dishes
			.delete_dishes(&[dumplings.id, 404])
			.await
			.unwrap();
		assert!(!is_cached(&harness, 4).await);
		assert!(matches!(
			harness.dishes.dish(dumplings.id).await,
			Err(ShopError::NotFound(_))
		));
	}

	#[tokio::test]
	async fn test_delete_refusals_keep_cache() {
		let harness = Harness::new().await;
		harness.dishes.list_dishes(1).await.unwrap();

		let err = harness.dishes.delete_dishes(&[1]).await.unwrap_err();
		assert_eq!(err.to_string(), "dish is on sale and cannot be deleted");
		let err = harness.dishes.delete_dishes(&[3]).await.unwrap_err();
		assert_eq!(err.to_string(), "dish is linked to a combo and cannot be deleted");
		assert!(is_cached(&harness, 1).await);
	}

	#[tokio::test]
	async fn test_undecodable_cache_value_is_a_miss() {
		let harness = Harness::new().await;
		harness
			.cache
			.set_json(&CacheKey::DishCategory(1), &"garbage", None)
			.await
			.unwrap();

		let dishes = harness.dishes.list_dishes(1).await.unwrap();
		assert_eq!(dishes.len(), 2);
		assert!(is_cached(&harness, 1).await);
	}

	#[tokio::test]
	async fn test_mutations_survive_cache_outage() {
		let harness = Harness::with_failing_cache().await;

		assert_eq!(harness.dishes.list_dishes(1).await.unwrap().len(), 2);
		let dish = harness
			.dishes
			.save_dish(request(None, "Dumplings", 1, 1500))
			.await
			.unwrap();
		harness
			.dishes
			.set_dish_status(dish.id, ItemStatus::Disabled)
			.await
			.unwrap();
		harness.dishes.delete_dishes(&[dish.id]).await.unwrap();
	}
}
