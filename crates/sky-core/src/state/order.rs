//! Order state machine implementation.
//!
//! Orders move through `PendingPayment -> ToBeConfirmed -> Confirmed ->
//! DeliveryInProgress -> Completed`. `Cancelled` is reachable from the first
//! two states only. `Completed` and `Cancelled` are terminal.
//!
//! Every transition loads the order, checks the transition table and an
//! operation-specific guard, applies one mutation and writes the order back
//! with a compare-and-set on the status it was loaded with. A refused or lost
//! transition leaves the stored order untouched.

use once_cell::sync::Lazy;
use sky_storage::{StorageError, StorageService};
use sky_types::{Order, OrderStatus};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during order state management.
#[derive(Debug, Error)]
pub enum OrderStateError {
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Order not found: {0}")]
	OrderNotFound(u64),
	/// The transition is not allowed; carries the reason shown to callers.
	#[error("{0}")]
	Refused(String),
}

/// Static transition table - each state maps to allowed next states.
static TRANSITIONS: Lazy<HashMap<OrderStatus, HashSet<OrderStatus>>> = Lazy::new(|| {
	let mut m = HashMap::new();
	m.insert(
		OrderStatus::PendingPayment,
		HashSet::from([OrderStatus::ToBeConfirmed, OrderStatus::Cancelled]),
	);
	m.insert(
		OrderStatus::ToBeConfirmed,
		HashSet::from([OrderStatus::Confirmed, OrderStatus::Cancelled]),
	);
	m.insert(
		OrderStatus::Confirmed,
		HashSet::from([OrderStatus::DeliveryInProgress]),
	);
	m.insert(
		OrderStatus::DeliveryInProgress,
		HashSet::from([OrderStatus::Completed]),
	);
	m.insert(OrderStatus::Completed, HashSet::new()); // terminal
	m.insert(OrderStatus::Cancelled, HashSet::new()); // terminal
	m
});

/// Reason given when `action` is not allowed in the order's current state.
pub fn refusal(order: &Order, action: &str) -> String {
	match order.status {
		OrderStatus::Cancelled => format!("order already cancelled, cannot {}", action),
		OrderStatus::Completed => format!("order already completed, cannot {}", action),
		status => format!("order is {}, cannot {}", status, action),
	}
}

/// Guard requiring the order to be paid.
pub fn require_paid(action: &'static str) -> impl FnOnce(&Order) -> Result<(), String> {
	move |order| {
		if order.is_paid() {
			Ok(())
		} else {
			Err(format!("order not paid, cannot {}", action))
		}
	}
}

/// Guard requiring the order to be unpaid.
pub fn require_unpaid(action: &'static str) -> impl FnOnce(&Order) -> Result<(), String> {
	move |order| {
		if order.is_paid() {
			Err(format!("order already paid, cannot {}", action))
		} else {
			Ok(())
		}
	}
}

/// Guard that accepts any order the transition table accepts.
pub fn unguarded(_: &Order) -> Result<(), String> {
	Ok(())
}

/// Manages order state transitions and persistence
pub struct OrderStateMachine {
	storage: Arc<StorageService>,
}

impl OrderStateMachine {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Checks if a state transition is valid
	pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
		TRANSITIONS.get(&from).is_some_and(|set| set.contains(&to))
	}

	/// Gets an order by ID
	pub async fn get_order(&self, order_id: u64) -> Result<Order, OrderStateError> {
		self.storage
			.get_order(order_id)
			.await
			.map_err(|e| match e {
				StorageError::NotFound => OrderStateError::OrderNotFound(order_id),
				other => OrderStateError::Storage(other.to_string()),
			})
	}

	/// Moves an order to `to` if the table and `guard` allow it, applying
	/// `updater` to the loaded order before it is written back.
	pub async fn transition<G, F>(
		&self,
		order_id: u64,
		to: OrderStatus,
		action: &str,
		guard: G,
		updater: F,
	) -> Result<Order, OrderStateError>
	where
		G: FnOnce(&Order) -> Result<(), String>,
		F: FnOnce(&mut Order),
	{
		let mut order = self.get_order(order_id).await?;
		self.apply(&mut order, to, action, guard, updater).await?;
		Ok(order)
	}

	/// Same as [`transition`](Self::transition) for an order already loaded.
	pub async fn apply<G, F>(
		&self,
		order: &mut Order,
		to: OrderStatus,
		action: &str,
		guard: G,
		updater: F,
	) -> Result<(), OrderStateError>
	where
		G: FnOnce(&Order) -> Result<(), String>,
		F: FnOnce(&mut Order),
	{
		if !Self::is_valid_transition(order.status, to) {
			return Err(OrderStateError::Refused(refusal(order, action)));
		}
		guard(order).map_err(OrderStateError::Refused)?;

		let expected = order.status;
		let mut updated = order.clone();
		updater(&mut updated);
		updated.status = to;

		self.write(&updated, expected, action).await?;
		tracing::debug!(
			order_id = %updated.id,
			from = %expected,
			to = %to,
			"Order transitioned"
		);
		*order = updated;
		Ok(())
	}

	/// Updates an order's fields without moving it to another state.
	///
	/// The write is still a compare-and-set on the status the order was
	/// loaded with, so a concurrent transition makes this fail.
	pub async fn amend<G, F>(
		&self,
		order_id: u64,
		action: &str,
		guard: G,
		updater: F,
	) -> Result<Order, OrderStateError>
	where
		G: FnOnce(&Order) -> Result<(), String>,
		F: FnOnce(&mut Order),
	{
		let order = self.get_order(order_id).await?;
		if matches!(order.status, OrderStatus::Completed | OrderStatus::Cancelled) {
			return Err(OrderStateError::Refused(refusal(&order, action)));
		}
		guard(&order).map_err(OrderStateError::Refused)?;

		let mut updated = order.clone();
		updater(&mut updated);
		updated.status = order.status;

		self.write(&updated, order.status, action).await?;
		tracing::debug!(order_id = %updated.id, status = %updated.status, "Order amended");
		Ok(updated)
	}

	async fn write(
		&self,
		updated: &Order,
		expected: OrderStatus,
		action: &str,
	) -> Result<(), OrderStateError> {
		self.storage
			.update_order(updated, expected)
			.await
			.map_err(|e| match e {
				StorageError::Conflict(_) => OrderStateError::Refused(format!(
					"order changed concurrently, cannot {}",
					action
				)),
				StorageError::NotFound => OrderStateError::OrderNotFound(updated.id),
				other => OrderStateError::Storage(other.to_string()),
			})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{sample_order, Harness};
	use sky_types::PayStatus;

	#[test]
	fn test_transition_table() {
		use OrderStatus::*;
		assert!(OrderStateMachine::is_valid_transition(PendingPayment, ToBeConfirmed));
		assert!(OrderStateMachine::is_valid_transition(ToBeConfirmed, Cancelled));
		assert!(OrderStateMachine::is_valid_transition(Confirmed, DeliveryInProgress));
		assert!(!OrderStateMachine::is_valid_transition(Confirmed, Cancelled));
		assert!(!OrderStateMachine::is_valid_transition(ToBeConfirmed, DeliveryInProgress));
		for to in [PendingPayment, ToBeConfirmed, Confirmed, DeliveryInProgress, Completed] {
			assert!(!OrderStateMachine::is_valid_transition(Cancelled, to));
			assert!(!OrderStateMachine::is_valid_transition(Completed, to));
		}
	}

	#[tokio::test]
	async fn test_refused_transition_leaves_order_unchanged() {
		let harness = Harness::new().await;
		let placed = harness
			.place(sample_order(OrderStatus::Cancelled, PayStatus::Paid))
			.await;

		let err = harness
			.state_machine
			.transition(placed.id, OrderStatus::Confirmed, "confirm", unguarded, |o| {
				o.remark = Some("changed".into())
			})
			.await
			.unwrap_err();

		assert_eq!(err.to_string(), "order already cancelled, cannot confirm");
		let stored = harness.storage.get_order(placed.id).await.unwrap();
		assert_eq!(stored, placed);
	}

	#[tokio::test]
	async fn test_guard_refusal() {
		let harness = Harness::new().await;
		let placed = harness
			.place(sample_order(OrderStatus::ToBeConfirmed, PayStatus::Unpaid))
			.await;

		let err = harness
			.state_machine
			.transition(
				placed.id,
				OrderStatus::Confirmed,
				"confirm",
				require_paid("confirm"),
				|_| {},
			)
			.await
			.unwrap_err();
		assert!(matches!(err, OrderStateError::Refused(r) if r == "order not paid, cannot confirm"));
	}

	#[tokio::test]
	async fn test_stale_copy_loses_compare_and_set() {
		let harness = Harness::new().await;
		let placed = harness
			.place(sample_order(OrderStatus::ToBeConfirmed, PayStatus::Paid))
			.await;

		let mut stale = placed.clone();
		harness
			.state_machine
			.transition(placed.id, OrderStatus::Cancelled, "cancel", unguarded, |_| {})
			.await
			.unwrap();

		let err = harness
			.state_machine
			.apply(&mut stale, OrderStatus::Confirmed, "confirm", unguarded, |_| {})
			.await
			.unwrap_err();
		assert!(err.to_string().contains("changed concurrently"));
		assert_eq!(stale.status, OrderStatus::ToBeConfirmed);
		assert_eq!(
			harness.storage.get_order(placed.id).await.unwrap().status,
			OrderStatus::Cancelled
		);
	}

	#[tokio::test]
	async fn test_amend_keeps_status() {
		let harness = Harness::new().await;
		let placed = harness
			.place(sample_order(OrderStatus::ToBeConfirmed, PayStatus::Unpaid))
			.await;

		let amended = harness
			.state_machine
			.amend(placed.id, "pay", require_unpaid("pay"), |o| {
				o.pay_status = PayStatus::Paid
			})
			.await
			.unwrap();
		assert_eq!(amended.status, OrderStatus::ToBeConfirmed);
		assert_eq!(harness.storage.get_order(placed.id).await.unwrap(), amended);

		let err = harness
			.state_machine
			.amend(placed.id, "pay", require_unpaid("pay"), |_| {})
			.await
			.unwrap_err();
		assert_eq!(err.to_string(), "order already paid, cannot pay");
	}

	#[tokio::test]
	async fn test_amend_refuses_terminal_orders() {
		let harness = Harness::new().await;
		let placed = harness
			.place(sample_order(OrderStatus::Cancelled, PayStatus::Unpaid))
			.await;

		let err = harness
			.state_machine
			.amend(placed.id, "pay", unguarded, |o| o.pay_status = PayStatus::Paid)
			.await
			.unwrap_err();
		assert_eq!(err.to_string(), "order already cancelled, cannot pay");
		assert_eq!(harness.storage.get_order(placed.id).await.unwrap(), placed);
	}

	#[tokio::test]
	async fn test_missing_order() {
		let harness = Harness::new().await;
		let err = harness.state_machine.get_order(404).await.unwrap_err();
		assert!(matches!(err, OrderStateError::OrderNotFound(404)));
	}
}
