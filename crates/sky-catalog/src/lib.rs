//! Catalog and address book collaborators.
//!
//! The menu (dishes and combos) and customer addresses are owned outside the
//! order pipeline. This crate exposes them through [`CatalogInterface`] so
//! the cart and order handlers can snapshot prices and addresses, and so the
//! catalog handler can drive dish mutations.

use async_trait::async_trait;
use sky_types::{
	Address, Combo, ConfigSchema, Dish, DishPageQuery, DishRequest, ImplementationRegistry,
	ItemSelector, ItemStatus, Page,
};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod memory;
}

/// Errors that can occur during catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
	/// The named record does not exist.
	#[error("Not found: {0}")]
	NotFound(String),
	/// The mutation is not allowed in the record's current state.
	#[error("Rejected: {0}")]
	Rejected(String),
	#[error("Backend error: {0}")]
	Backend(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for catalog backends.
#[async_trait]
pub trait CatalogInterface: Send + Sync {
	async fn dish(&self, id: u64) -> Result<Dish, CatalogError>;

	async fn combo(&self, id: u64) -> Result<Combo, CatalogError>;

	/// Dishes of one category, optionally restricted to one status.
	async fn dishes_by_category(
		&self,
		category_id: u64,
		status: Option<ItemStatus>,
	) -> Result<Vec<Dish>, CatalogError>;

	/// Dishes matching the filter, one page at a time, newest first.
	async fn search_dishes(&self, query: &DishPageQuery) -> Result<Page<Dish>, CatalogError>;

	/// Creates a dish and returns it with its assigned id.
	async fn save_dish(&self, request: DishRequest) -> Result<Dish, CatalogError>;

	/// Replaces the dish named by `request.id`.
	async fn update_dish(&self, request: DishRequest) -> Result<Dish, CatalogError>;

	/// Deletes dishes in one step. Nothing is deleted if any dish is on sale
	/// or part of a combo.
	async fn delete_dishes(&self, ids: &[u64]) -> Result<(), CatalogError>;

	async fn set_dish_status(&self, id: u64, status: ItemStatus) -> Result<Dish, CatalogError>;

	async fn address(&self, id: u64) -> Result<Address, CatalogError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for catalog factory functions.
pub type CatalogFactory = fn(&toml::Value) -> Result<Box<dyn CatalogInterface>, CatalogError>;

/// Registry trait for catalog implementations.
pub trait CatalogRegistry: ImplementationRegistry<Factory = CatalogFactory> {}

/// Get all registered catalog implementations.
pub fn get_all_implementations() -> Vec<(&'static str, CatalogFactory)> {
	use implementations::memory;

	vec![(memory::Registry::NAME, memory::Registry::factory())]
}

/// A purchasable item resolved from a selector.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemSnapshot {
	pub item: ItemSelector,
	pub name: String,
	pub image: Option<String>,
	pub price: rust_decimal::Decimal,
}

/// Catalog access used by the handlers.
pub struct CatalogService {
	backend: Box<dyn CatalogInterface>,
}

impl CatalogService {
	pub fn new(backend: Box<dyn CatalogInterface>) -> Self {
		Self { backend }
	}

	/// Resolves a dish or combo into the fields a cart row snapshots.
	pub async fn snapshot(&self, item: ItemSelector) -> Result<ItemSnapshot, CatalogError> {
		match item {
			ItemSelector::Dish(id) => {
				let dish = self.backend.dish(id).await?;
				Ok(ItemSnapshot {
					item,
					name: dish.name,
					image: dish.image,
					price: dish.price,
				})
			},
			ItemSelector::Combo(id) => {
				let combo = self.backend.combo(id).await?;
				Ok(ItemSnapshot {
					item,
					name: combo.name,
					image: combo.image,
					price: combo.price,
				})
			},
		}
	}

	pub async fn dish(&self, id: u64) -> Result<Dish, CatalogError> {
		self.backend.dish(id).await
	}

	pub async fn dishes_by_category(
		&self,
		category_id: u64,
		status: Option<ItemStatus>,
	) -> Result<Vec<Dish>, CatalogError> {
		self.backend.dishes_by_category(category_id, status).await
	}

	pub async fn search_dishes(&self, query: &DishPageQuery) -> Result<Page<Dish>, CatalogError> {
		self.backend.search_dishes(query).await
	}

	pub async fn save_dish(&self, request: DishRequest) -> Result<Dish, CatalogError> {
		self.backend.save_dish(request).await
	}

	pub async fn update_dish(&self, request: DishRequest) -> Result<Dish, CatalogError> {
		self.backend.update_dish(request).await
	}

	pub async fn delete_dishes(&self, ids: &[u64]) -> Result<(), CatalogError> {
		self.backend.delete_dishes(ids).await
	}

	pub async fn set_dish_status(
		&self,
		id: u64,
		status: ItemStatus,
	) -> Result<Dish, CatalogError> {
		self.backend.set_dish_status(id, status).await
	}

	pub async fn address(&self, id: u64) -> Result<Address, CatalogError> {
		self.backend.address(id).await
	}
}
