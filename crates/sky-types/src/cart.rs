//! Shopping cart types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to exactly one purchasable item: a dish or a combo.
///
/// Serialized as the two nullable id columns of a cart or order row, so
/// rows embed it with `#[serde(flatten)]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ItemColumns", into = "ItemColumns")]
pub enum ItemSelector {
	Dish(u64),
	Combo(u64),
}

/// Row layout of an [`ItemSelector`]: exactly one column is set.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemColumns {
	#[serde(default)]
	dish_id: Option<u64>,
	#[serde(default)]
	setmeal_id: Option<u64>,
}

impl TryFrom<ItemColumns> for ItemSelector {
	type Error = String;

	fn try_from(columns: ItemColumns) -> Result<Self, Self::Error> {
		match (columns.dish_id, columns.setmeal_id) {
			(Some(dish), None) => Ok(ItemSelector::Dish(dish)),
			(None, Some(combo)) => Ok(ItemSelector::Combo(combo)),
			(Some(_), Some(_)) => Err("row references both a dish and a combo".into()),
			(None, None) => Err("row references neither a dish nor a combo".into()),
		}
	}
}

impl From<ItemSelector> for ItemColumns {
	fn from(item: ItemSelector) -> Self {
		ItemColumns {
			dish_id: item.dish_id(),
			setmeal_id: item.combo_id(),
		}
	}
}

impl ItemSelector {
	/// Field name of this item inside a user's cart hash.
	pub fn cache_field(&self) -> String {
		match self {
			ItemSelector::Dish(id) => format!("dish_{}", id),
			ItemSelector::Combo(id) => format!("combo_{}", id),
		}
	}

	pub fn dish_id(&self) -> Option<u64> {
		match self {
			ItemSelector::Dish(id) => Some(*id),
			ItemSelector::Combo(_) => None,
		}
	}

	pub fn combo_id(&self) -> Option<u64> {
		match self {
			ItemSelector::Combo(id) => Some(*id),
			ItemSelector::Dish(_) => None,
		}
	}
}

impl fmt::Display for ItemSelector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ItemSelector::Dish(id) => write!(f, "dish {}", id),
			ItemSelector::Combo(id) => write!(f, "combo {}", id),
		}
	}
}

/// A pending cart row.
///
/// The store row is authoritative; the cache holds a mirror of it under the
/// owner's cart hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
	/// Store-assigned row id.
	pub id: u64,
	pub user_id: u64,
	#[serde(flatten)]
	pub item: ItemSelector,
	pub name: String,
	pub image: Option<String>,
	/// Quantity, always at least one while the row exists.
	pub number: u32,
	/// Unit price snapshot.
	pub amount: Decimal,
	pub create_time: DateTime<Utc>,
}

impl CartItem {
	/// Line total for this row.
	pub fn subtotal(&self) -> Decimal {
		self.amount * Decimal::from(self.number)
	}
}

/// Request body for cart add/sub. Exactly one of the ids must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemRequest {
	#[serde(default)]
	pub dish_id: Option<u64>,
	#[serde(default, alias = "setmealId")]
	pub combo_id: Option<u64>,
}

impl CartItemRequest {
	/// Resolves the request into a selector, rejecting ambiguous input.
	pub fn selector(&self) -> Result<ItemSelector, String> {
		match (self.dish_id, self.combo_id) {
			(Some(dish), None) => Ok(ItemSelector::Dish(dish)),
			(None, Some(combo)) => Ok(ItemSelector::Combo(combo)),
			(Some(_), Some(_)) => Err("cart item must reference a dish or a combo, not both".into()),
			(None, None) => Err("cart item must reference a dish or a combo".into()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_selector_requires_exactly_one_id() {
		let dish = CartItemRequest {
			dish_id: Some(3),
			combo_id: None,
		};
		assert_eq!(dish.selector().unwrap(), ItemSelector::Dish(3));

		let both = CartItemRequest {
			dish_id: Some(3),
			combo_id: Some(4),
		};
		assert!(both.selector().is_err());
		assert!(CartItemRequest::default().selector().is_err());
	}

	#[test]
	fn test_legacy_combo_field_name() {
		let request: CartItemRequest = serde_json::from_str(r#"{"setmealId": 9}"#).unwrap();
		assert_eq!(request.selector().unwrap(), ItemSelector::Combo(9));
	}

	#[test]
	fn test_cart_row_uses_flat_id_columns() {
		let row = CartItem {
			id: 1,
			user_id: 7,
			item: ItemSelector::Combo(4),
			name: "Lunch Set".into(),
			image: None,
			number: 2,
			amount: Decimal::new(3000, 2),
			create_time: Utc::now(),
		};

		let value = serde_json::to_value(&row).unwrap();
		assert_eq!(value["dishId"], serde_json::Value::Null);
		assert_eq!(value["setmealId"], 4);
		assert!(value.get("item").is_none());

		let back: CartItem = serde_json::from_value(value.clone()).unwrap();
		assert_eq!(back, row);

		let mut both = value;
		both["dishId"] = serde_json::json!(1);
		assert!(serde_json::from_value::<CartItem>(both).is_err());
	}

	#[test]
	fn test_cache_field_names() {
		assert_eq!(ItemSelector::Dish(12).cache_field(), "dish_12");
		assert_eq!(ItemSelector::Combo(5).cache_field(), "combo_5");
	}
}
