//! Record tables shared by the storage backends.
//!
//! `Tables` holds every order, line item and cart row and implements the
//! store operations synchronously. Backends wrap it in a lock and decide how
//! (and whether) to persist it. Every mutating method validates its input
//! before touching any table, so a returned error leaves the tables as they
//! were.

use crate::StorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sky_types::{CartItem, ItemSelector, Order, OrderLineItem, OrderQuery, OrderStatus, Page};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Tables {
	next_order_id: u64,
	next_line_id: u64,
	next_cart_id: u64,
	orders: BTreeMap<u64, Order>,
	/// Line items keyed by their order id.
	order_items: BTreeMap<u64, Vec<OrderLineItem>>,
	cart_items: BTreeMap<u64, CartItem>,
}

impl Tables {
	/// Inserts an order with its line items and clears the owner's cart.
	pub fn place_order(
		&mut self,
		mut order: Order,
		items: Vec<OrderLineItem>,
	) -> Result<Order, StorageError> {
		if items.is_empty() {
			return Err(StorageError::Backend(
				"an order needs at least one line item".into(),
			));
		}
		if self.orders.values().any(|o| o.number == order.number) {
			return Err(StorageError::Conflict(format!(
				"order number {} already exists",
				order.number
			)));
		}

		self.next_order_id += 1;
		order.id = self.next_order_id;

		let mut stored_items = Vec::with_capacity(items.len());
		for mut item in items {
			self.next_line_id += 1;
			item.id = self.next_line_id;
			item.order_id = order.id;
			stored_items.push(item);
		}

		self.cart_items.retain(|_, row| row.user_id != order.user_id);
		self.order_items.insert(order.id, stored_items);
		self.orders.insert(order.id, order.clone());

		Ok(order)
	}

	pub fn get_order(&self, id: u64) -> Result<Order, StorageError> {
		self.orders.get(&id).cloned().ok_or(StorageError::NotFound)
	}

	pub fn find_order_by_number(&self, number: &str) -> Option<Order> {
		self.orders.values().find(|o| o.number == number).cloned()
	}

	/// Replaces an order if its stored status still equals `expected`.
	pub fn update_order(&mut self, order: &Order, expected: OrderStatus) -> Result<(), StorageError> {
		let stored = self.orders.get_mut(&order.id).ok_or(StorageError::NotFound)?;
		if stored.status != expected {
			return Err(StorageError::Conflict(format!(
				"order {} is {}, expected {}",
				order.id, stored.status, expected
			)));
		}
		*stored = order.clone();
		Ok(())
	}

	pub fn order_items(&self, order_id: u64) -> Vec<OrderLineItem> {
		self.order_items.get(&order_id).cloned().unwrap_or_default()
	}

	/// Matching orders, newest placement first.
	pub fn query_orders(&self, query: &OrderQuery) -> Page<Order> {
		let mut matching: Vec<&Order> = self.orders.values().filter(|o| query.matches(o)).collect();
		matching.sort_by(|a, b| b.order_time.cmp(&a.order_time).then(b.id.cmp(&a.id)));

		Page {
			total: matching.len() as u64,
			records: matching
				.into_iter()
				.skip(query.offset())
				.take(query.limit())
				.cloned()
				.collect(),
		}
	}

	pub fn count_orders(&self, status: OrderStatus, placed_before: Option<DateTime<Utc>>) -> u64 {
		self.orders
			.values()
			.filter(|o| o.status == status)
			.filter(|o| placed_before.is_none_or(|cutoff| o.order_time < cutoff))
			.count() as u64
	}

	/// Moves every delivery placed before `cutoff` to completed.
	pub fn complete_stale_deliveries(
		&mut self,
		cutoff: DateTime<Utc>,
		completed_at: DateTime<Utc>,
	) -> u64 {
		let mut completed = 0;
		for order in self.orders.values_mut() {
			if order.status == OrderStatus::DeliveryInProgress && order.order_time < cutoff {
				order.status = OrderStatus::Completed;
				order.delivery_time = Some(completed_at);
				completed += 1;
			}
		}
		completed
	}

	pub fn find_cart_item(&self, user_id: u64, item: &ItemSelector) -> Option<CartItem> {
		self.cart_items
			.values()
			.find(|row| row.user_id == user_id && row.item == *item)
			.cloned()
	}

	pub fn insert_cart_item(&mut self, mut row: CartItem) -> Result<CartItem, StorageError> {
		if row.number == 0 {
			return Err(StorageError::Backend("cart rows need a positive quantity".into()));
		}
		if self.find_cart_item(row.user_id, &row.item).is_some() {
			return Err(StorageError::Conflict(format!(
				"user {} already has a cart row for {}",
				row.user_id, row.item
			)));
		}
		self.next_cart_id += 1;
		row.id = self.next_cart_id;
		self.cart_items.insert(row.id, row.clone());
		Ok(row)
	}

	/// Inserts several rows, folding duplicates into existing quantities.
	pub fn insert_cart_items(&mut self, rows: Vec<CartItem>) -> Result<Vec<CartItem>, StorageError> {
		if rows.iter().any(|row| row.number == 0) {
			return Err(StorageError::Backend("cart rows need a positive quantity".into()));
		}
		let mut stored = Vec::with_capacity(rows.len());
		for row in rows {
			let existing = self
				.cart_items
				.values_mut()
				.find(|r| r.user_id == row.user_id && r.item == row.item);
			match existing {
				Some(existing) => {
					existing.number += row.number;
					stored.push(existing.clone());
				},
				None => {
					self.next_cart_id += 1;
					let mut row = row;
					row.id = self.next_cart_id;
					self.cart_items.insert(row.id, row.clone());
					stored.push(row);
				},
			}
		}
		Ok(stored)
	}

	pub fn update_cart_item_number(&mut self, id: u64, number: u32) -> Result<(), StorageError> {
		if number == 0 {
			return Err(StorageError::Backend("cart rows need a positive quantity".into()));
		}
		let row = self.cart_items.get_mut(&id).ok_or(StorageError::NotFound)?;
		row.number = number;
		Ok(())
	}

	pub fn delete_cart_item(&mut self, id: u64) -> Result<(), StorageError> {
		self.cart_items
			.remove(&id)
			.map(|_| ())
			.ok_or(StorageError::NotFound)
	}

	/// The user's cart rows in insertion order.
	pub fn list_cart(&self, user_id: u64) -> Vec<CartItem> {
		self.cart_items
			.values()
			.filter(|row| row.user_id == user_id)
			.cloned()
			.collect()
	}

	pub fn clear_cart(&mut self, user_id: u64) -> usize {
		let before = self.cart_items.len();
		self.cart_items.retain(|_, row| row.user_id != user_id);
		before - self.cart_items.len()
	}
}
