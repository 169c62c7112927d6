//! File-backed storage implementation.
//!
//! All tables are kept in memory and written to a JSON snapshot after every
//! mutation. The snapshot is written to a temporary file and renamed over the
//! previous one, so a crash mid-write leaves the last complete snapshot in
//! place. The snapshot is read lazily on first access.

use crate::tables::Tables;
use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sky_types::{
	CartItem, ConfigSchema, Field, FieldType, ImplementationRegistry, ItemSelector, Order,
	OrderLineItem, OrderQuery, OrderStatus, Page, Schema, ValidationError,
};
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;

const SNAPSHOT_FILE: &str = "sky-store.json";

/// File-based storage implementation.
pub struct FileStorage {
	/// Base directory holding the snapshot.
	base_path: PathBuf,
	/// Loaded tables, `None` until the snapshot has been read.
	tables: Mutex<Option<Tables>>,
}

impl FileStorage {
	pub fn new(base_path: PathBuf) -> Self {
		Self {
			base_path,
			tables: Mutex::new(None),
		}
	}

	fn snapshot_path(&self) -> PathBuf {
		self.base_path.join(SNAPSHOT_FILE)
	}

	async fn load(&self) -> Result<Tables, StorageError> {
		match fs::read(self.snapshot_path()).await {
			Ok(bytes) => serde_json::from_slice(&bytes)
				.map_err(|e| StorageError::Serialization(e.to_string())),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				tracing::debug!(path = ?self.snapshot_path(), "No snapshot yet, starting empty");
				Ok(Tables::default())
			},
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn persist(&self, tables: &Tables) -> Result<(), StorageError> {
		fs::create_dir_all(&self.base_path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		let bytes =
			serde_json::to_vec(tables).map_err(|e| StorageError::Serialization(e.to_string()))?;

		// Write atomically by writing to temp file then renaming
		let path = self.snapshot_path();
		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, bytes)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}

	async fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> Result<R, StorageError> {
		let mut guard = self.tables.lock().await;
		if guard.is_none() {
			*guard = Some(self.load().await?);
		}
		match guard.as_ref() {
			Some(tables) => Ok(f(tables)),
			None => Err(StorageError::Backend("storage snapshot not loaded".into())),
		}
	}

	/// Applies a mutation to a copy of the tables and only swaps the copy in
	/// once it has been persisted.
	async fn write<R>(
		&self,
		f: impl FnOnce(&mut Tables) -> Result<R, StorageError>,
	) -> Result<R, StorageError> {
		let mut guard = self.tables.lock().await;
		let mut tables = match guard.as_ref() {
			Some(tables) => tables.clone(),
			None => self.load().await?,
		};

		let result = f(&mut tables)?;
		self.persist(&tables).await?;
		*guard = Some(tables);

		Ok(result)
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn place_order(
		&self,
		order: Order,
		items: Vec<OrderLineItem>,
	) -> Result<Order, StorageError> {
		self.write(|t| t.place_order(order, items)).await
	}

	async fn get_order(&self, id: u64) -> Result<Order, StorageError> {
		self.read(|t| t.get_order(id)).await?
	}

	async fn find_order_by_number(&self, number: &str) -> Result<Option<Order>, StorageError> {
		self.read(|t| t.find_order_by_number(number)).await
	}

	async fn update_order(
		&self,
		order: &Order,
		expected: OrderStatus,
	) -> Result<(), StorageError> {
		self.write(|t| t.update_order(order, expected)).await
	}

	async fn order_items(&self, order_id: u64) -> Result<Vec<OrderLineItem>, StorageError> {
		self.read(|t| t.order_items(order_id)).await
	}

	async fn query_orders(&self, query: &OrderQuery) -> Result<Page<Order>, StorageError> {
		self.read(|t| t.query_orders(query)).await
	}

	async fn count_orders(
		&self,
		status: OrderStatus,
		placed_before: Option<DateTime<Utc>>,
	) -> Result<u64, StorageError> {
		self.read(|t| t.count_orders(status, placed_before)).await
	}

	async fn complete_stale_deliveries(
		&self,
		cutoff: DateTime<Utc>,
		completed_at: DateTime<Utc>,
	) -> Result<u64, StorageError> {
		self.write(|t| Ok(t.complete_stale_deliveries(cutoff, completed_at)))
			.await
	}

	async fn find_cart_item(
		&self,
		user_id: u64,
		item: &ItemSelector,
	) -> Result<Option<CartItem>, StorageError> {
		self.read(|t| t.find_cart_item(user_id, item)).await
	}

	async fn insert_cart_item(&self, row: CartItem) -> Result<CartItem, StorageError> {
		self.write(|t| t.insert_cart_item(row)).await
	}

	async fn insert_cart_items(&self, rows: Vec<CartItem>) -> Result<Vec<CartItem>, StorageError> {
		self.write(|t| t.insert_cart_items(rows)).await
	}

	async fn update_cart_item_number(&self, id: u64, number: u32) -> Result<(), StorageError> {
		self.write(|t| t.update_cart_item_number(id, number)).await
	}

	async fn delete_cart_item(&self, id: u64) -> Result<(), StorageError> {
		self.write(|t| t.delete_cart_item(id)).await
	}

	async fn list_cart(&self, user_id: u64) -> Result<Vec<CartItem>, StorageError> {
		self.read(|t| t.list_cart(user_id)).await
	}

	async fn clear_cart(&self, user_id: u64) -> Result<usize, StorageError> {
		self.write(|t| Ok(t.clear_cart(user_id))).await
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![], // No required fields
			vec![Field::new("storage_path", FieldType::String)],
		);
		schema.validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Directory holding the snapshot (default: "./data/storage")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(format!("Invalid configuration: {}", e)))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/storage")
		.to_string();

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
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
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_records_survive_reopen() {
		let temp_dir = TempDir::new().unwrap();

		let placed = {
			let storage = FileStorage::new(temp_dir.path().to_path_buf());
			storage
				.insert_cart_item(cart_row(4, ItemSelector::Dish(9), 2))
				.await
				.unwrap();
			storage
				.insert_cart_item(cart_row(5, ItemSelector::Dish(9), 1))
				.await
				.unwrap();
			storage
				.place_order(
					order("FILE1", 4, OrderStatus::ToBeConfirmed, 9),
					vec![line(ItemSelector::Dish(9), 2)],
				)
				.await
				.unwrap()
		};

		let reopened = FileStorage::new(temp_dir.path().to_path_buf());
		let found = reopened
			.find_order_by_number("FILE1")
			.await
			.unwrap()
			.unwrap();
		assert_eq!(found.id, placed.id);
		assert_eq!(reopened.order_items(placed.id).await.unwrap().len(), 1);
		assert!(reopened.list_cart(4).await.unwrap().is_empty());
		assert_eq!(reopened.list_cart(5).await.unwrap().len(), 1);

		// Id sequences continue from the snapshot.
		let next = reopened
			.place_order(
				order("FILE2", 5, OrderStatus::ToBeConfirmed, 10),
				vec![line(ItemSelector::Dish(9), 1)],
			)
			.await
			.unwrap();
		assert_eq!(next.id, placed.id + 1);
	}

	#[tokio::test]
	async fn test_failed_mutation_is_not_persisted() {
		let temp_dir = TempDir::new().unwrap();
		let storage = FileStorage::new(temp_dir.path().to_path_buf());

		let err = storage.update_cart_item_number(42, 3).await.unwrap_err();
		assert!(matches!(err, StorageError::NotFound));
		assert!(!temp_dir.path().join(SNAPSHOT_FILE).exists());
	}

	#[test]
	fn test_factory_rejects_non_string_path() {
		let config: toml::Value = toml::from_str("storage_path = 5").unwrap();
		assert!(matches!(
			create_storage(&config),
			Err(StorageError::Configuration(_))
		));
	}
}
