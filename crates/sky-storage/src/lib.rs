//! Storage module for the sky take-out backend.
//!
//! This module provides the authoritative record store for orders, order line
//! items and cart rows. Backends implement [`StorageInterface`]; the rest of
//! the system talks to them through [`StorageService`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sky_types::{
	CartItem, ConfigSchema, ImplementationRegistry, ItemSelector, Order, OrderLineItem, OrderQuery,
	OrderStatus, Page,
};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

mod tables;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested record is not found.
	#[error("Not found")]
	NotFound,
	/// A write lost against a concurrent change or a uniqueness rule.
	#[error("Conflict: {0}")]
	Conflict(String),
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for record store backends.
///
/// Each method is a single transaction: it either applies completely or
/// leaves the store unchanged.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Inserts an order and its line items and deletes the owner's cart rows.
	///
	/// Assigns the order id and line item ids. Fails with `Conflict` if the
	/// order number is already taken.
	async fn place_order(
		&self,
		order: Order,
		items: Vec<OrderLineItem>,
	) -> Result<Order, StorageError>;

	async fn get_order(&self, id: u64) -> Result<Order, StorageError>;

	async fn find_order_by_number(&self, number: &str) -> Result<Option<Order>, StorageError>;

	/// Writes back an order, provided its stored status is still `expected`.
	async fn update_order(&self, order: &Order, expected: OrderStatus)
		-> Result<(), StorageError>;

	async fn order_items(&self, order_id: u64) -> Result<Vec<OrderLineItem>, StorageError>;

	/// Returns one page of matching orders, newest first.
	async fn query_orders(&self, query: &OrderQuery) -> Result<Page<Order>, StorageError>;

	/// Counts orders in `status`, optionally only those placed before a time.
	async fn count_orders(
		&self,
		status: OrderStatus,
		placed_before: Option<DateTime<Utc>>,
	) -> Result<u64, StorageError>;

	/// Completes every in-delivery order placed before `cutoff`.
	async fn complete_stale_deliveries(
		&self,
		cutoff: DateTime<Utc>,
		completed_at: DateTime<Utc>,
	) -> Result<u64, StorageError>;

	async fn find_cart_item(
		&self,
		user_id: u64,
		item: &ItemSelector,
	) -> Result<Option<CartItem>, StorageError>;

	async fn insert_cart_item(&self, row: CartItem) -> Result<CartItem, StorageError>;

	/// Inserts a batch of rows in one transaction.
	async fn insert_cart_items(&self, rows: Vec<CartItem>) -> Result<Vec<CartItem>, StorageError>;

	async fn update_cart_item_number(&self, id: u64, number: u32) -> Result<(), StorageError>;

	async fn delete_cart_item(&self, id: u64) -> Result<(), StorageError>;

	async fn list_cart(&self, user_id: u64) -> Result<Vec<CartItem>, StorageError>;

	/// Deletes all of a user's cart rows and returns how many there were.
	async fn clear_cart(&self, user_id: u64) -> Result<usize, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
///
/// Returns a vector of (name, factory) tuples for all available storage implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

/// High-level storage service used by the handlers.
pub struct StorageService {
	/// The underlying storage backend implementation.
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	pub async fn place_order(
		&self,
		order: Order,
		items: Vec<OrderLineItem>,
	) -> Result<Order, StorageError> {
		self.backend.place_order(order, items).await
	}

	pub async fn get_order(&self, id: u64) -> Result<Order, StorageError> {
		self.backend.get_order(id).await
	}

	pub async fn find_order_by_number(&self, number: &str) -> Result<Option<Order>, StorageError> {
		self.backend.find_order_by_number(number).await
	}

	pub async fn update_order(
		&self,
		order: &Order,
		expected: OrderStatus,
	) -> Result<(), StorageError> {
		self.backend.update_order(order, expected).await
	}

	pub async fn order_items(&self, order_id: u64) -> Result<Vec<OrderLineItem>, StorageError> {
		self.backend.order_items(order_id).await
	}

	/// Loads an order together with its line items.
	pub async fn order_with_items(
		&self,
		id: u64,
	) -> Result<(Order, Vec<OrderLineItem>), StorageError> {
		let order = self.backend.get_order(id).await?;
		let items = self.backend.order_items(id).await?;
		Ok((order, items))
	}

	pub async fn query_orders(&self, query: &OrderQuery) -> Result<Page<Order>, StorageError> {
		self.backend.query_orders(query).await
	}

	pub async fn count_orders(
		&self,
		status: OrderStatus,
		placed_before: Option<DateTime<Utc>>,
	) -> Result<u64, StorageError> {
		self.backend.count_orders(status, placed_before).await
	}

	pub async fn complete_stale_deliveries(
		&self,
		cutoff: DateTime<Utc>,
		completed_at: DateTime<Utc>,
	) -> Result<u64, StorageError> {
		self.backend
			.complete_stale_deliveries(cutoff, completed_at)
			.await
	}

	pub async fn find_cart_item(
		&self,
		user_id: u64,
		item: &ItemSelector,
	) -> Result<Option<CartItem>, StorageError> {
		self.backend.find_cart_item(user_id, item).await
	}

	pub async fn insert_cart_item(&self, row: CartItem) -> Result<CartItem, StorageError> {
		self.backend.insert_cart_item(row).await
	}

	pub async fn insert_cart_items(
		&self,
		rows: Vec<CartItem>,
	) -> Result<Vec<CartItem>, StorageError> {
		self.backend.insert_cart_items(rows).await
	}

	pub async fn update_cart_item_number(&self, id: u64, number: u32) -> Result<(), StorageError> {
		self.backend.update_cart_item_number(id, number).await
	}

	pub async fn delete_cart_item(&self, id: u64) -> Result<(), StorageError> {
		self.backend.delete_cart_item(id).await
	}

	pub async fn list_cart(&self, user_id: u64) -> Result<Vec<CartItem>, StorageError> {
		self.backend.list_cart(user_id).await
	}

	pub async fn clear_cart(&self, user_id: u64) -> Result<usize, StorageError> {
		self.backend.clear_cart(user_id).await
	}
}
