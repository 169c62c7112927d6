//! Order types for the take-out backend.
//!
//! This module defines persisted orders, their immutable line items, the
//! lifecycle and payment status codes, and the query/report shapes used by
//! the order endpoints.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ItemSelector;

/// A placed order.
///
/// Orders are never deleted. The status only moves forward along the
/// lifecycle graph, except for the absorbing `Cancelled` state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
	/// Store-assigned identifier.
	pub id: u64,
	/// Human-facing order number, see [`OrderNumber`].
	pub number: String,
	/// Current lifecycle status.
	pub status: OrderStatus,
	/// Owner of the order.
	pub user_id: u64,
	/// Display name of the owner at placement time.
	pub user_name: Option<String>,
	/// Address book entry the order ships to.
	pub address_book_id: u64,
	pub consignee: Option<String>,
	pub phone: Option<String>,
	/// Address text snapshot.
	pub address: Option<String>,
	/// Placement time.
	pub order_time: DateTime<Utc>,
	/// Time the payment was recorded.
	pub checkout_time: Option<DateTime<Utc>>,
	pub pay_method: PayMethod,
	pub pay_status: PayStatus,
	/// Amount charged for the order.
	pub amount: Decimal,
	pub remark: Option<String>,
	pub cancel_reason: Option<String>,
	pub rejection_reason: Option<String>,
	pub cancel_time: Option<DateTime<Utc>>,
	pub delivery_time: Option<DateTime<Utc>>,
}

impl Order {
	/// Whether the payment for this order has been recorded.
	pub fn is_paid(&self) -> bool {
		self.pay_status == PayStatus::Paid
	}
}

/// One line of an order, snapshotted from the cart at submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
	pub id: u64,
	pub order_id: u64,
	pub name: String,
	pub image: Option<String>,
	/// The dish or combo this line refers to.
	#[serde(flatten)]
	pub item: ItemSelector,
	/// Quantity ordered.
	pub number: u32,
	/// Unit price at submission.
	pub amount: Decimal,
}

/// Lifecycle status of an order.
///
/// Serialized as the numeric code so persisted data and API payloads stay
/// stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum OrderStatus {
	PendingPayment = 1,
	ToBeConfirmed = 2,
	Confirmed = 3,
	DeliveryInProgress = 4,
	Completed = 5,
	Cancelled = 6,
}

impl OrderStatus {
	/// Numeric status code.
	pub fn code(self) -> u8 {
		self as u8
	}

	/// Terminal states accept no further transitions.
	pub fn is_terminal(self) -> bool {
		matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
	}
}

impl TryFrom<u8> for OrderStatus {
	type Error = String;

	fn try_from(code: u8) -> Result<Self, Self::Error> {
		match code {
			1 => Ok(OrderStatus::PendingPayment),
			2 => Ok(OrderStatus::ToBeConfirmed),
			3 => Ok(OrderStatus::Confirmed),
			4 => Ok(OrderStatus::DeliveryInProgress),
			5 => Ok(OrderStatus::Completed),
			6 => Ok(OrderStatus::Cancelled),
			other => Err(format!("unknown order status code {}", other)),
		}
	}
}

impl From<OrderStatus> for u8 {
	fn from(status: OrderStatus) -> Self {
		status.code()
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OrderStatus::PendingPayment => write!(f, "pending payment"),
			OrderStatus::ToBeConfirmed => write!(f, "to be confirmed"),
			OrderStatus::Confirmed => write!(f, "confirmed"),
			OrderStatus::DeliveryInProgress => write!(f, "delivery in progress"),
			OrderStatus::Completed => write!(f, "completed"),
			OrderStatus::Cancelled => write!(f, "cancelled"),
		}
	}
}

/// Payment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PayStatus {
	Unpaid = 0,
	Paid = 1,
}

impl TryFrom<u8> for PayStatus {
	type Error = String;

	fn try_from(code: u8) -> Result<Self, Self::Error> {
		match code {
			0 => Ok(PayStatus::Unpaid),
			1 => Ok(PayStatus::Paid),
			other => Err(format!("unknown pay status code {}", other)),
		}
	}
}

impl From<PayStatus> for u8 {
	fn from(status: PayStatus) -> Self {
		status as u8
	}
}

/// Payment channel chosen by the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayMethod {
	Wechat,
	Alipay,
}

/// Generator and parser for order numbers.
///
/// Layout: `yyyyMMddHHmmssSSS` placement timestamp, a three digit random
/// salt in `100..=999`, then the low four digits of the user id, zero padded.
pub struct OrderNumber;

impl OrderNumber {
	/// Total length of a generated order number.
	pub const LEN: usize = 17 + 3 + 4;

	/// Formats an order number from its parts.
	pub fn format(placed_at: DateTime<Utc>, salt: u16, user_id: u64) -> String {
		format!(
			"{}{:03}{:04}",
			placed_at.format("%Y%m%d%H%M%S%3f"),
			salt,
			user_id % 10_000
		)
	}
}

/// Receipt returned to the customer after a successful submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReceipt {
	pub id: u64,
	pub order_number: String,
	pub order_amount: Decimal,
	pub order_time: DateTime<Utc>,
}

/// An order together with its line items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
	#[serde(flatten)]
	pub order: Order,
	/// Compact `name*qty;` summary of the line items for staff listings.
	pub order_dishes: String,
	pub items: Vec<OrderLineItem>,
}

impl OrderDetail {
	pub fn new(order: Order, items: Vec<OrderLineItem>) -> Self {
		let order_dishes = items
			.iter()
			.map(|item| format!("{}*{};", item.name, item.number))
			.collect();
		Self {
			order,
			order_dishes,
			items,
		}
	}
}

/// Filter and paging parameters for order listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQuery {
	#[serde(default = "default_page")]
	pub page: u64,
	#[serde(default = "default_page_size")]
	pub page_size: u64,
	/// Restricts the listing to one customer.
	#[serde(default)]
	pub user_id: Option<u64>,
	/// Substring of the order number.
	#[serde(default)]
	pub number: Option<String>,
	/// Substring of the contact phone.
	#[serde(default)]
	pub phone: Option<String>,
	#[serde(default)]
	pub status: Option<OrderStatus>,
	/// Inclusive lower bound on placement time.
	#[serde(default)]
	pub begin_time: Option<DateTime<Utc>>,
	/// Inclusive upper bound on placement time.
	#[serde(default)]
	pub end_time: Option<DateTime<Utc>>,
}

fn default_page() -> u64 {
	1
}

fn default_page_size() -> u64 {
	10
}

impl Default for OrderQuery {
	fn default() -> Self {
		Self {
			page: default_page(),
			page_size: default_page_size(),
			user_id: None,
			number: None,
			phone: None,
			status: None,
			begin_time: None,
			end_time: None,
		}
	}
}

impl OrderQuery {
	/// Whether the order passes every filter of this query.
	pub fn matches(&self, order: &Order) -> bool {
		if self.user_id.is_some_and(|id| id != order.user_id) {
			return false;
		}
		if self.status.is_some_and(|status| status != order.status) {
			return false;
		}
		if let Some(number) = self.number.as_deref() {
			if !order.number.contains(number) {
				return false;
			}
		}
		if let Some(phone) = self.phone.as_deref() {
			if !order.phone.as_deref().is_some_and(|p| p.contains(phone)) {
				return false;
			}
		}
		if self.begin_time.is_some_and(|begin| order.order_time < begin) {
			return false;
		}
		if self.end_time.is_some_and(|end| order.order_time > end) {
			return false;
		}
		true
	}

	/// Number of records to skip for the requested page.
	pub fn offset(&self) -> usize {
		(self.page.max(1) - 1).saturating_mul(self.page_size) as usize
	}

	/// Page size clamped to at least one record.
	pub fn limit(&self) -> usize {
		self.page_size.max(1) as usize
	}
}

/// One page of a listing plus the total number of matching records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
	pub total: u64,
	pub records: Vec<T>,
}

impl<T> Page<T> {
	pub fn empty() -> Self {
		Self {
			total: 0,
			records: Vec::new(),
		}
	}
}

/// Counts of orders awaiting staff action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatistics {
	pub to_be_confirmed: u64,
	pub confirmed: u64,
	pub delivery_in_progress: u64,
}

/// Pre-payment payload handed back to the client app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepayPayload {
	pub nonce_str: String,
	pub package: String,
	pub sign_type: String,
	pub pay_sign: String,
	pub time_stamp: String,
}
