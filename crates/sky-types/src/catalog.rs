//! Catalog and address book records.
//!
//! These records are owned by the menu collaborator. The order and cart
//! handlers only read them, while the catalog handler drives dish mutations
//! and the cache invalidation around them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Sale status of a dish or combo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ItemStatus {
	Disabled = 0,
	Enabled = 1,
}

impl TryFrom<u8> for ItemStatus {
	type Error = String;

	fn try_from(code: u8) -> Result<Self, Self::Error> {
		match code {
			0 => Ok(ItemStatus::Disabled),
			1 => Ok(ItemStatus::Enabled),
			other => Err(format!("unknown item status code {}", other)),
		}
	}
}

impl From<ItemStatus> for u8 {
	fn from(status: ItemStatus) -> Self {
		status as u8
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dish {
	pub id: u64,
	pub name: String,
	pub category_id: u64,
	pub price: Decimal,
	#[serde(default)]
	pub image: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
	pub status: ItemStatus,
}

/// A fixed bundle of dishes sold as one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Combo {
	pub id: u64,
	pub name: String,
	pub category_id: u64,
	pub price: Decimal,
	#[serde(default)]
	pub image: Option<String>,
	pub status: ItemStatus,
	/// Dishes contained in the combo.
	#[serde(default)]
	pub dish_ids: Vec<u64>,
}

/// A customer's delivery address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
	pub id: u64,
	pub user_id: u64,
	pub consignee: String,
	pub phone: String,
	/// Full address text copied onto orders.
	pub detail: String,
}

/// Staff request to create or update a dish.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DishRequest {
	/// Present on update, ignored on create.
	#[serde(default)]
	pub id: Option<u64>,
	pub name: String,
	pub category_id: u64,
	pub price: Decimal,
	#[serde(default)]
	pub image: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
	/// New dishes start disabled unless stated otherwise.
	#[serde(default)]
	pub status: Option<ItemStatus>,
}

/// Staff dish listing filter, paged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DishPageQuery {
	#[serde(default = "first_page")]
	pub page: u64,
	#[serde(default = "default_page_size")]
	pub page_size: u64,
	/// Substring of the dish name.
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub category_id: Option<u64>,
	#[serde(default)]
	pub status: Option<ItemStatus>,
}

fn first_page() -> u64 {
	1
}

fn default_page_size() -> u64 {
	10
}

impl Default for DishPageQuery {
	fn default() -> Self {
		Self {
			page: first_page(),
			page_size: default_page_size(),
			name: None,
			category_id: None,
			status: None,
		}
	}
}

impl DishPageQuery {
	pub fn matches(&self, dish: &Dish) -> bool {
		self.name.as_deref().is_none_or(|name| dish.name.contains(name))
			&& self.category_id.is_none_or(|id| dish.category_id == id)
			&& self.status.is_none_or(|status| dish.status == status)
	}

	pub fn offset(&self) -> usize {
		(self.page.max(1) - 1).saturating_mul(self.page_size) as usize
	}

	pub fn limit(&self) -> usize {
		self.page_size.max(1) as usize
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn dish(id: u64, name: &str, category_id: u64, status: ItemStatus) -> Dish {
		Dish {
			id,
			name: name.to_string(),
			category_id,
			price: Decimal::new(100, 2),
			image: None,
			description: None,
			status,
		}
	}

	#[test]
	fn test_dish_page_query_filters() {
		let tofu = dish(1, "Mapo Tofu", 1, ItemStatus::Enabled);
		let rice = dish(2, "Rice", 2, ItemStatus::Disabled);

		let query: DishPageQuery = serde_json::from_str(r#"{"name": "Tofu"}"#).unwrap();
		assert_eq!((query.page, query.page_size), (1, 10));
		assert!(query.matches(&tofu));
		assert!(!query.matches(&rice));

		let query = DishPageQuery {
			category_id: Some(2),
			status: Some(ItemStatus::Disabled),
			..Default::default()
		};
		assert!(!query.matches(&tofu));
		assert!(query.matches(&rice));

		let query = DishPageQuery { page: 3, page_size: 5, ..Default::default() };
		assert_eq!(query.offset(), 10);
	}
}
