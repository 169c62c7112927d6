//! In-memory catalog seeded from configuration.

use crate::{CatalogError, CatalogFactory, CatalogInterface, CatalogRegistry};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use sky_types::{
	Address, Combo, ConfigSchema, Dish, DishPageQuery, DishRequest, Field, FieldType,
	ImplementationRegistry, ItemStatus, Page, Schema, ValidationError,
};
use std::collections::BTreeMap;
use std::str::FromStr;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Menu {
	next_dish_id: u64,
	dishes: BTreeMap<u64, Dish>,
	combos: BTreeMap<u64, Combo>,
	addresses: BTreeMap<u64, Address>,
}

/// Catalog held in process memory.
pub struct MemoryCatalog {
	menu: RwLock<Menu>,
}

impl MemoryCatalog {
	pub fn new(dishes: Vec<Dish>, combos: Vec<Combo>, addresses: Vec<Address>) -> Self {
		let next_dish_id = dishes.iter().map(|d| d.id).max().unwrap_or(0);
		Self {
			menu: RwLock::new(Menu {
				next_dish_id,
				dishes: dishes.into_iter().map(|d| (d.id, d)).collect(),
				combos: combos.into_iter().map(|c| (c.id, c)).collect(),
				addresses: addresses.into_iter().map(|a| (a.id, a)).collect(),
			}),
		}
	}
}

#[async_trait]
impl CatalogInterface for MemoryCatalog {
	async fn dish(&self, id: u64) -> Result<Dish, CatalogError> {
		self.menu
			.read()
			.await
			.dishes
			.get(&id)
			.cloned()
			.ok_or_else(|| CatalogError::NotFound(format!("dish {}", id)))
	}

	async fn combo(&self, id: u64) -> Result<Combo, CatalogError> {
		self.menu
			.read()
			.await
			.combos
			.get(&id)
			.cloned()
			.ok_or_else(|| CatalogError::NotFound(format!("combo {}", id)))
	}

	async fn dishes_by_category(
		&self,
		category_id: u64,
		status: Option<ItemStatus>,
	) -> Result<Vec<Dish>, CatalogError> {
		Ok(self
			.menu
			.read()
			.await
			.dishes
			.values()
			.filter(|d| d.category_id == category_id)
			.filter(|d| status.is_none_or(|s| d.status == s))
			.cloned()
			.collect())
	}

	async fn search_dishes(&self, query: &DishPageQuery) -> Result<Page<Dish>, CatalogError> {
		let menu = self.menu.read().await;
		// Ids grow with creation, so reverse id order is newest first.
		let matching: Vec<&Dish> = menu.dishes.values().rev().filter(|d| query.matches(d)).collect();

		Ok(Page {
			total: matching.len() as u64,
			records: matching
				.into_iter()
				.skip(query.offset())
				.take(query.limit())
				.cloned()
				.collect(),
		})
	}

	async fn save_dish(&self, request: DishRequest) -> Result<Dish, CatalogError> {
		let mut menu = self.menu.write().await;
		menu.next_dish_id += 1;
		let dish = Dish {
			id: menu.next_dish_id,
			name: request.name,
			category_id: request.category_id,
			price: request.price,
			image: request.image,
			description: request.description,
			status: request.status.unwrap_or(ItemStatus::Disabled),
		};
		menu.dishes.insert(dish.id, dish.clone());
		Ok(dish)
	}

	async fn update_dish(&self, request: DishRequest) -> Result<Dish, CatalogError> {
		let id = request
			.id
			.ok_or_else(|| CatalogError::Rejected("dish id is required for update".into()))?;
		let mut menu = self.menu.write().await;
		let dish = menu
			.dishes
			.get_mut(&id)
			.ok_or_else(|| CatalogError::NotFound(format!("dish {}", id)))?;

		dish.name = request.name;
		dish.category_id = request.category_id;
		dish.price = request.price;
		dish.image = request.image;
		dish.description = request.description;
		if let Some(status) = request.status {
			dish.status = status;
		}
		Ok(dish.clone())
	}

	async fn delete_dishes(&self, ids: &[u64]) -> Result<(), CatalogError> {
		let mut menu = self.menu.write().await;

		let on_sale = ids.iter().any(|id| {
			menu.dishes
				.get(id)
				.is_some_and(|d| d.status == ItemStatus::Enabled)
		});
		if on_sale {
			return Err(CatalogError::Rejected(
				"dish is on sale and cannot be deleted".into(),
			));
		}

		let linked = menu
			.combos
			.values()
			.any(|combo| combo.dish_ids.iter().any(|id| ids.contains(id)));
		if linked {
			return Err(CatalogError::Rejected(
				"dish is linked to a combo and cannot be deleted".into(),
			));
		}

		for id in ids {
			menu.dishes.remove(id);
		}
		Ok(())
	}

	async fn set_dish_status(&self, id: u64, status: ItemStatus) -> Result<Dish, CatalogError> {
		let mut menu = self.menu.write().await;
		let dish = menu
			.dishes
			.get_mut(&id)
			.ok_or_else(|| CatalogError::NotFound(format!("dish {}", id)))?;
		dish.status = status;
		Ok(dish.clone())
	}

	async fn address(&self, id: u64) -> Result<Address, CatalogError> {
		self.menu
			.read()
			.await
			.addresses
			.get(&id)
			.cloned()
			.ok_or_else(|| CatalogError::NotFound(format!("address {}", id)))
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryCatalogSchema)
	}
}

#[derive(Debug, Deserialize)]
struct DishSeed {
	id: u64,
	name: String,
	category_id: u64,
	price: String,
	image: Option<String>,
	description: Option<String>,
	#[serde(default = "enabled")]
	enabled: bool,
}

#[derive(Debug, Deserialize)]
struct ComboSeed {
	id: u64,
	name: String,
	category_id: u64,
	price: String,
	image: Option<String>,
	#[serde(default = "enabled")]
	enabled: bool,
	#[serde(default)]
	dish_ids: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct AddressSeed {
	id: u64,
	user_id: u64,
	consignee: String,
	phone: String,
	detail: String,
}

fn enabled() -> bool {
	true
}

fn status(enabled: bool) -> ItemStatus {
	if enabled {
		ItemStatus::Enabled
	} else {
		ItemStatus::Disabled
	}
}

fn price(text: &str) -> Result<Decimal, CatalogError> {
	Decimal::from_str(text)
		.map_err(|e| CatalogError::Configuration(format!("invalid price '{}': {}", text, e)))
}

fn seeds<T: for<'de> Deserialize<'de>>(
	config: &toml::Value,
	key: &str,
) -> Result<Vec<T>, CatalogError> {
	match config.get(key) {
		None => Ok(Vec::new()),
		Some(value) => value
			.clone()
			.try_into()
			.map_err(|e| CatalogError::Configuration(format!("invalid {}: {}", key, e))),
	}
}

/// Configuration schema for MemoryCatalog.
pub struct MemoryCatalogSchema;

impl ConfigSchema for MemoryCatalogSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let id = || FieldType::Integer {
			min: Some(1),
			max: None,
		};
		let dish = Schema::new(
			vec![
				Field::new("id", id()),
				Field::new("name", FieldType::String),
				Field::new("category_id", id()),
				Field::new("price", FieldType::Decimal),
			],
			vec![
				Field::new("image", FieldType::String),
				Field::new("description", FieldType::String),
				Field::new("enabled", FieldType::Boolean),
			],
		);
		let combo = Schema::new(
			vec![
				Field::new("id", id()),
				Field::new("name", FieldType::String),
				Field::new("category_id", id()),
				Field::new("price", FieldType::Decimal),
			],
			vec![
				Field::new("image", FieldType::String),
				Field::new("enabled", FieldType::Boolean),
				Field::new("dish_ids", FieldType::Array(Box::new(id()))),
			],
		);
		let address = Schema::new(
			vec![
				Field::new("id", id()),
				Field::new("user_id", id()),
				Field::new("consignee", FieldType::String),
				Field::new("phone", FieldType::String),
				Field::new("detail", FieldType::String),
			],
			vec![],
		);

		let schema = Schema::new(
			vec![],
			vec![
				Field::new("dishes", FieldType::Array(Box::new(FieldType::Table(dish)))),
				Field::new("combos", FieldType::Array(Box::new(FieldType::Table(combo)))),
				Field::new(
					"addresses",
					FieldType::Array(Box::new(FieldType::Table(address))),
				),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a memory catalog from configuration.
///
/// Configuration parameters:
/// - `dishes`: array of {id, name, category_id, price, image?, description?, enabled?}
/// - `combos`: array of {id, name, category_id, price, image?, enabled?, dish_ids?}
/// - `addresses`: array of {id, user_id, consignee, phone, detail}
pub fn create_catalog(config: &toml::Value) -> Result<Box<dyn CatalogInterface>, CatalogError> {
	MemoryCatalogSchema
		.validate(config)
		.map_err(|e| CatalogError::Configuration(format!("Invalid configuration: {}", e)))?;

	let dishes = seeds::<DishSeed>(config, "dishes")?
		.into_iter()
		.map(|seed| {
			Ok(Dish {
				id: seed.id,
				name: seed.name,
				category_id: seed.category_id,
				price: price(&seed.price)?,
				image: seed.image,
				description: seed.description,
				status: status(seed.enabled),
			})
		})
		.collect::<Result<Vec<_>, CatalogError>>()?;

	let combos = seeds::<ComboSeed>(config, "combos")?
		.into_iter()
		.map(|seed| {
			Ok(Combo {
				id: seed.id,
				name: seed.name,
				category_id: seed.category_id,
				price: price(&seed.price)?,
				image: seed.image,
				status: status(seed.enabled),
				dish_ids: seed.dish_ids,
			})
		})
		.collect::<Result<Vec<_>, CatalogError>>()?;

	let addresses = seeds::<AddressSeed>(config, "addresses")?
		.into_iter()
		.map(|seed| Address {
			id: seed.id,
			user_id: seed.user_id,
			consignee: seed.consignee,
			phone: seed.phone,
			detail: seed.detail,
		})
		.collect();

	tracing::debug!(
		dishes = dishes.len(),
		combos = combos.len(),
		"Seeded memory catalog"
	);

	Ok(Box::new(MemoryCatalog::new(dishes, combos, addresses)))
}

/// Registry for the memory catalog implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = CatalogFactory;

	fn factory() -> Self::Factory {
		create_catalog
	}
}

impl CatalogRegistry for Registry {}
