//! Notification payloads.
//!
//! When an order becomes visible to staff a flat JSON message is published
//! on the order-arrived channel. Delivery is best effort and nothing is
//! persisted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Order, OrderStatus};

/// Default channel for new-order notifications.
pub const ORDER_ARRIVED_CHANNEL: &str = "order:arrived";

/// Message broadcast to staff observers when an order arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
	pub id: u64,
	pub number: String,
	pub amount: Decimal,
	pub user_name: Option<String>,
	pub address: Option<String>,
	pub order_time: DateTime<Utc>,
	pub status: OrderStatus,
}

impl From<&Order> for NotificationMessage {
	fn from(order: &Order) -> Self {
		Self {
			id: order.id,
			number: order.number.clone(),
			amount: order.amount,
			user_name: order.user_name.clone(),
			address: order.address.clone(),
			order_time: order.order_time,
			status: order.status,
		}
	}
}

/// A raw message received from a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
	pub channel: String,
	pub payload: String,
}
