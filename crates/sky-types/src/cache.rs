//! Cache key layout.
//!
//! All keys the backend writes to the cache layer are produced here so the
//! cart, catalog and shop-status handlers agree on the format.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Keys written to the cache layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
	/// Single integer flag, 1 for open. Absence means closed.
	ShopStatus,
	/// Hash mirror of one user's cart rows.
	Cart(u64),
	/// JSON listing of the enabled dishes of one category.
	DishCategory(u64),
}

impl fmt::Display for CacheKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CacheKey::ShopStatus => write!(f, "SHOP_STATUS"),
			CacheKey::Cart(user_id) => write!(f, "user_{}_shopping_cart", user_id),
			CacheKey::DishCategory(category_id) => write!(f, "dish_{}", category_id),
		}
	}
}

/// Which category listings a dish mutation invalidates.
///
/// Mutations that know the category pass it directly. Mutations addressed by
/// dish id are resolved to categories through the catalog before eviction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEviction {
	ByCategoryId(u64),
	ByDishId(u64),
	ByDishIds(Vec<u64>),
}

/// Whether the shop accepts orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ShopStatus {
	Closed = 0,
	Open = 1,
}

impl TryFrom<u8> for ShopStatus {
	type Error = String;

	fn try_from(code: u8) -> Result<Self, Self::Error> {
		match code {
			0 => Ok(ShopStatus::Closed),
			1 => Ok(ShopStatus::Open),
			other => Err(format!("unknown shop status code {}", other)),
		}
	}
}

impl From<ShopStatus> for u8 {
	fn from(status: ShopStatus) -> Self {
		status as u8
	}
}
