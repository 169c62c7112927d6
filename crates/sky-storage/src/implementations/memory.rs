//! In-memory storage backend implementation.
//!
//! Records live in process memory and are lost on restart. Used for tests and
//! local development.

use crate::tables::Tables;
use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sky_types::{
	CartItem, ConfigSchema, ImplementationRegistry, ItemSelector, Order, OrderLineItem, OrderQuery,
	OrderStatus, Page, Schema, ValidationError,
};
use tokio::sync::RwLock;

/// In-memory storage implementation.
///
/// A single write lock around all tables makes each operation atomic.
#[derive(Default)]
pub struct MemoryStorage {
	tables: RwLock<Tables>,
}

impl MemoryStorage {
	/// Creates a new MemoryStorage instance.
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn place_order(
		&self,
		order: Order,
		items: Vec<OrderLineItem>,
	) -> Result<Order, StorageError> {
		self.tables.write().await.place_order(order, items)
	}

	async fn get_order(&self, id: u64) -> Result<Order, StorageError> {
		self.tables.read().await.get_order(id)
	}

	async fn find_order_by_number(&self, number: &str) -> Result<Option<Order>, StorageError> {
		Ok(self.tables.read().await.find_order_by_number(number))
	}

	async fn update_order(
		&self,
		order: &Order,
		expected: OrderStatus,
	) -> Result<(), StorageError> {
		self.tables.write().await.update_order(order, expected)
	}

	async fn order_items(&self, order_id: u64) -> Result<Vec<OrderLineItem>, StorageError> {
		Ok(self.tables.read().await.order_items(order_id))
	}

	async fn query_orders(&self, query: &OrderQuery) -> Result<Page<Order>, StorageError> {
		Ok(self.tables.read().await.query_orders(query))
	}

	async fn count_orders(
		&self,
		status: OrderStatus,
		placed_before: Option<DateTime<Utc>>,
	) -> Result<u64, StorageError> {
		Ok(self.tables.read().await.count_orders(status, placed_before))
	}

	async fn complete_stale_deliveries(
		&self,
		cutoff: DateTime<Utc>,
		completed_at: DateTime<Utc>,
	) -> Result<u64, StorageError> {
		Ok(self
			.tables
			.write()
			.await
			.complete_stale_deliveries(cutoff, completed_at))
	}

	async fn find_cart_item(
		&self,
		user_id: u64,
		item: &ItemSelector,
	) -> Result<Option<CartItem>, StorageError> {
		Ok(self.tables.read().await.find_cart_item(user_id, item))
	}

	async fn insert_cart_item(&self, row: CartItem) -> Result<CartItem, StorageError> {
		self.tables.write().await.insert_cart_item(row)
	}

	async fn insert_cart_items(&self, rows: Vec<CartItem>) -> Result<Vec<CartItem>, StorageError> {
		self.tables.write().await.insert_cart_items(rows)
	}

	async fn update_cart_item_number(&self, id: u64, number: u32) -> Result<(), StorageError> {
		self.tables.write().await.update_cart_item_number(id, number)
	}

	async fn delete_cart_item(&self, id: u64) -> Result<(), StorageError> {
		self.tables.write().await.delete_cart_item(id)
	}

	async fn list_cart(&self, user_id: u64) -> Result<Vec<CartItem>, StorageError> {
		Ok(self.tables.read().await.list_cart(user_id))
	}

	async fn clear_cart(&self, user_id: u64) -> Result<usize, StorageError> {
		Ok(self.tables.write().await.clear_cart(user_id))
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStorageSchema)
	}
}

/// Configuration schema for MemoryStorage.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// No required fields
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Factory function to create a memory storage backend from configuration.
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	MemoryStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(format!("Invalid configuration: {}", e)))?;

	Ok(Box::new(MemoryStorage::new()))
}

/// Registry for the memory storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{cart_row, line, order};
	use chrono::{Duration, TimeZone};

	#[tokio::test]
	async fn test_place_order_assigns_ids_and_clears_cart() {
		let storage = MemoryStorage::new();
		storage
			.insert_cart_item(cart_row(7, ItemSelector::Dish(1), 2))
			.await
			.unwrap();
		storage
			.insert_cart_item(cart_row(8, ItemSelector::Dish(1), 1))
			.await
			.unwrap();

		let placed = storage
			.place_order(
				order("N1", 7, OrderStatus::ToBeConfirmed, 9),
				vec![line(ItemSelector::Dish(1), 2), line(ItemSelector::Combo(3), 1)],
			)
			.await
			.unwrap();

		assert_eq!(placed.id, 1);
		let items = storage.order_items(placed.id).await.unwrap();
		assert_eq!(items.len(), 2);
		assert!(items.iter().all(|i| i.order_id == placed.id));
		assert_ne!(items[0].id, items[1].id);
		assert!(storage.list_cart(7).await.unwrap().is_empty());
		assert_eq!(storage.list_cart(8).await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_place_order_rejects_duplicate_number_without_side_effects() {
		let storage = MemoryStorage::new();
		storage
			.place_order(
				order("DUP", 1, OrderStatus::ToBeConfirmed, 9),
				vec![line(ItemSelector::Dish(1), 1)],
			)
			.await
			.unwrap();
		storage
			.insert_cart_item(cart_row(2, ItemSelector::Dish(4), 1))
			.await
			.unwrap();

		let err = storage
			.place_order(
				order("DUP", 2, OrderStatus::ToBeConfirmed, 10),
				vec![line(ItemSelector::Dish(4), 1)],
			)
			.await
			.unwrap_err();

		assert!(matches!(err, StorageError::Conflict(_)));
		assert_eq!(storage.list_cart(2).await.unwrap().len(), 1);
		assert!(storage.get_order(2).await.is_err());
	}

	#[tokio::test]
	async fn test_update_order_compares_status() {
		let storage = MemoryStorage::new();
		let mut placed = storage
			.place_order(
				order("N1", 1, OrderStatus::ToBeConfirmed, 9),
				vec![line(ItemSelector::Dish(1), 1)],
			)
			.await
			.unwrap();

		placed.status = OrderStatus::Confirmed;
		storage
			.update_order(&placed, OrderStatus::ToBeConfirmed)
			.await
			.unwrap();

		placed.status = OrderStatus::Cancelled;
		let err = storage
			.update_order(&placed, OrderStatus::ToBeConfirmed)
			.await
			.unwrap_err();
		assert!(matches!(err, StorageError::Conflict(_)));
		assert_eq!(
			storage.get_order(placed.id).await.unwrap().status,
			OrderStatus::Confirmed
		);
	}

	#[tokio::test]
	async fn test_query_orders_newest_first_with_paging() {
		let storage = MemoryStorage::new();
		for (i, hour) in [8, 11, 9, 10].into_iter().enumerate() {
			storage
				.place_order(
					order(&format!("N{}", i), 1, OrderStatus::ToBeConfirmed, hour),
					vec![line(ItemSelector::Dish(1), 1)],
				)
				.await
				.unwrap();
		}

		let query = OrderQuery {
			page: 1,
			page_size: 2,
			..OrderQuery::default()
		};
		let page = storage.query_orders(&query).await.unwrap();

		assert_eq!(page.total, 4);
		let numbers: Vec<_> = page.records.iter().map(|o| o.number.as_str()).collect();
		assert_eq!(numbers, vec!["N1", "N3"]);
	}

	#[tokio::test]
	async fn test_complete_stale_deliveries() {
		let storage = MemoryStorage::new();
		let stale = storage
			.place_order(
				order("OLD", 1, OrderStatus::DeliveryInProgress, 8),
				vec![line(ItemSelector::Dish(1), 1)],
			)
			.await
			.unwrap();
		let fresh = storage
			.place_order(
				order("NEW", 1, OrderStatus::DeliveryInProgress, 20),
				vec![line(ItemSelector::Dish(1), 1)],
			)
			.await
			.unwrap();

		let cutoff = Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap();
		let now = cutoff + Duration::hours(24);
		let completed = storage.complete_stale_deliveries(cutoff, now).await.unwrap();

		assert_eq!(completed, 1);
		let stale = storage.get_order(stale.id).await.unwrap();
		assert_eq!(stale.status, OrderStatus::Completed);
		assert_eq!(stale.delivery_time, Some(now));
		assert_eq!(
			storage.get_order(fresh.id).await.unwrap().status,
			OrderStatus::DeliveryInProgress
		);
		assert_eq!(
			storage
				.count_orders(OrderStatus::Completed, Some(cutoff))
				.await
				.unwrap(),
			1
		);
	}

	#[tokio::test]
	async fn test_cart_row_lifecycle() {
		let storage = MemoryStorage::new();
		let row = storage
			.insert_cart_item(cart_row(5, ItemSelector::Combo(2), 1))
			.await
			.unwrap();

		let duplicate = storage
			.insert_cart_item(cart_row(5, ItemSelector::Combo(2), 1))
			.await;
		assert!(matches!(duplicate, Err(StorageError::Conflict(_))));

		storage.update_cart_item_number(row.id, 3).await.unwrap();
		let found = storage
			.find_cart_item(5, &ItemSelector::Combo(2))
			.await
			.unwrap()
			.unwrap();
		assert_eq!(found.number, 3);

		assert!(storage.update_cart_item_number(row.id, 0).await.is_err());

		storage.delete_cart_item(row.id).await.unwrap();
		assert!(storage
			.find_cart_item(5, &ItemSelector::Combo(2))
			.await
			.unwrap()
			.is_none());
		assert!(matches!(
			storage.delete_cart_item(row.id).await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_insert_cart_items_folds_existing_rows() {
		let storage = MemoryStorage::new();
		storage
			.insert_cart_item(cart_row(3, ItemSelector::Dish(1), 1))
			.await
			.unwrap();

		let stored = storage
			.insert_cart_items(vec![
				cart_row(3, ItemSelector::Dish(1), 2),
				cart_row(3, ItemSelector::Dish(2), 1),
			])
			.await
			.unwrap();

		assert_eq!(stored.len(), 2);
		let cart = storage.list_cart(3).await.unwrap();
		assert_eq!(cart.len(), 2);
		assert_eq!(cart[0].number, 3);
		assert_eq!(storage.clear_cart(3).await.unwrap(), 2);
		assert!(storage.list_cart(3).await.unwrap().is_empty());
	}
}
