//! Order handler covering submission, payment and every staff action.
//!
//! Submission writes the order, its line items and the cart deletion in one
//! store transaction. The cart cache eviction and the staff notification that
//! follow are best effort and never fail the submission.

use crate::monitoring::NotificationPublisher;
use crate::state::order::{require_paid, require_unpaid, unguarded};
use crate::state::OrderStateMachine;
use crate::ShopError;
use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use sky_cache::CacheService;
use sky_catalog::{CatalogError, CatalogService};
use sky_payment::PaymentService;
use sky_storage::{StorageError, StorageService};
use sky_types::{
	CacheKey, CartItem, Order, OrderDetail, OrderLineItem, OrderNumber, OrderQuery, OrderReceipt,
	OrderStatistics, OrderStatus, Page, PayStatus, PaymentRequest, PrepayPayload,
	SubmitOrderRequest, UserContext,
};
use std::sync::Arc;
use tracing::instrument;

/// Handler for the order lifecycle.
pub struct OrderHandler {
	storage: Arc<StorageService>,
	cache: Arc<CacheService>,
	catalog: Arc<CatalogService>,
	payment: Arc<PaymentService>,
	state_machine: Arc<OrderStateMachine>,
	publisher: Arc<NotificationPublisher>,
	/// How many order numbers to try before giving up on a submission.
	order_number_attempts: u32,
}

impl OrderHandler {
	pub fn new(
		storage: Arc<StorageService>,
		cache: Arc<CacheService>,
		catalog: Arc<CatalogService>,
		payment: Arc<PaymentService>,
		state_machine: Arc<OrderStateMachine>,
		publisher: Arc<NotificationPublisher>,
		order_number_attempts: u32,
	) -> Self {
		Self {
			storage,
			cache,
			catalog,
			payment,
			state_machine,
			publisher,
			order_number_attempts: order_number_attempts.max(1),
		}
	}

	/// Places an order from the caller's cart.
	#[instrument(skip_all, fields(user_id = %ctx.user_id))]
	pub async fn submit(
		&self,
		ctx: &UserContext,
		request: SubmitOrderRequest,
	) -> Result<OrderReceipt, ShopError> {
		let address = match self.catalog.address(request.address_book_id).await {
			Ok(address) if address.user_id == ctx.user_id => address,
			Ok(_) | Err(CatalogError::NotFound(_)) => {
				return Err(ShopError::InvalidRequest(
					"address book entry not found".into(),
				));
			},
			Err(e) => return Err(e.into()),
		};

		let cart = self.storage.list_cart(ctx.user_id).await?;
		if cart.is_empty() {
			return Err(ShopError::InvalidRequest("shopping cart is empty".into()));
		}

		let cart_total: Decimal = cart.iter().map(CartItem::subtotal).sum();
		if cart_total != request.amount {
			tracing::warn!(
				requested = %request.amount,
				cart_total = %cart_total,
				"Submitted amount differs from cart total"
			);
		}

		let now = Utc::now();
		let order = Order {
			id: 0,
			number: String::new(),
			// Submission records the order as already paid.
			status: OrderStatus::ToBeConfirmed,
			user_id: ctx.user_id,
			user_name: ctx.user_name.clone(),
			address_book_id: address.id,
			consignee: Some(address.consignee),
			phone: Some(address.phone),
			address: Some(address.detail),
			order_time: now,
			checkout_time: Some(now),
			pay_method: request.pay_method,
			pay_status: PayStatus::Paid,
			amount: request.amount,
			remark: request.remark,
			cancel_reason: None,
			rejection_reason: None,
			cancel_time: None,
			delivery_time: None,
		};
		let items: Vec<OrderLineItem> = cart
			.into_iter()
			.map(|row| OrderLineItem {
				id: 0,
				order_id: 0,
				name: row.name,
				image: row.image,
				item: row.item,
				number: row.number,
				amount: row.amount,
			})
			.collect();

		let placed = self.place_with_unique_number(order, items).await?;
		tracing::info!(order_id = %placed.id, order_number = %placed.number, "Order submitted");

		self.evict_cart(ctx.user_id).await;
		self.publisher.order_arrived(&placed).await;

		Ok(OrderReceipt {
			id: placed.id,
			order_number: placed.number,
			order_amount: placed.amount,
			order_time: placed.order_time,
		})
	}

	/// Inserts the order, drawing a fresh number whenever one is taken.
	async fn place_with_unique_number(
		&self,
		order: Order,
		items: Vec<OrderLineItem>,
	) -> Result<Order, ShopError> {
		for attempt in 1..=self.order_number_attempts {
			let salt = rand::thread_rng().gen_range(100..=999);
			let mut candidate = order.clone();
			candidate.number = OrderNumber::format(order.order_time, salt, order.user_id);

			match self.storage.place_order(candidate, items.clone()).await {
				Ok(placed) => return Ok(placed),
				Err(StorageError::Conflict(reason)) => {
					tracing::warn!(attempt = attempt, reason = %reason, "Order number collision");
				},
				Err(e) => return Err(e.into()),
			}
		}
		Err(ShopError::Storage(format!(
			"no unique order number after {} attempts",
			self.order_number_attempts
		)))
	}

	/// Requests a prepay payload for one of the caller's orders.
	#[instrument(skip_all, fields(user_id = %ctx.user_id, order_number = %request.order_number))]
	pub async fn pay(
		&self,
		ctx: &UserContext,
		request: PaymentRequest,
	) -> Result<PrepayPayload, ShopError> {
		let order = self
			.storage
			.find_order_by_number(&request.order_number)
			.await?
			.filter(|order| order.user_id == ctx.user_id)
			.ok_or_else(|| ShopError::NotFound(format!("order {}", request.order_number)))?;

		if order.is_paid() {
			return Err(ShopError::OrderState("order already paid".into()));
		}

		let payload = self
			.payment
			.initiate_payment(&order.number, order.amount, &ctx.user_id.to_string())
			.await?;
		Ok(payload)
	}

	/// Records a successful payment reported by the gateway.
	///
	/// An unpaid order waiting for payment moves to `ToBeConfirmed`; one that
	/// already waits for staff is only marked paid. Unknown, already paid and
	/// cancelled or later orders are ignored, so repeated callbacks are
	/// harmless. Failures are logged, never returned.
	#[instrument(skip_all, fields(order_number = %order_number))]
	pub async fn confirm_payment(&self, order_number: &str) {
		let order = match self.storage.find_order_by_number(order_number).await {
			Ok(Some(order)) => order,
			Ok(None) => {
				tracing::warn!("Payment callback for unknown order");
				return;
			},
			Err(e) => {
				tracing::error!(error = %e, "Failed to load order for payment callback");
				return;
			},
		};

		if order.is_paid() {
			tracing::debug!(order_id = %order.id, "Order already paid, ignoring callback");
			return;
		}

		const ACTION: &str = "confirm payment";
		let now = Utc::now();
		let mark_paid = move |o: &mut Order| {
			o.pay_status = PayStatus::Paid;
			o.checkout_time = Some(now);
		};
		let result = match order.status {
			OrderStatus::PendingPayment => {
				self.state_machine
					.transition(
						order.id,
						OrderStatus::ToBeConfirmed,
						ACTION,
						require_unpaid(ACTION),
						mark_paid,
					)
					.await
			},
			// Already waiting for staff, only the payment fields change.
			OrderStatus::ToBeConfirmed => {
				self.state_machine
					.amend(order.id, ACTION, require_unpaid(ACTION), mark_paid)
					.await
			},
			status => {
				tracing::warn!(
					order_id = %order.id,
					status = %status,
					"Payment callback for an order past payment, ignoring"
				);
				return;
			},
		};

		match result {
			Ok(order) => {
				tracing::info!(order_id = %order.id, "Payment confirmed");
				self.publisher.order_arrived(&order).await;
			},
			Err(e) => {
				tracing::error!(order_id = %order.id, error = %e, "Failed to confirm payment");
			},
		}
	}

	/// Staff accepts a paid order.
	#[instrument(skip_all, fields(order_id = %order_id))]
	pub async fn confirm(&self, order_id: u64) -> Result<Order, ShopError> {
		let order = self
			.state_machine
			.transition(
				order_id,
				OrderStatus::Confirmed,
				"confirm",
				require_paid("confirm"),
				|_| {},
			)
			.await?;
		Ok(order)
	}

	/// Staff refuses a paid order with a reason.
	#[instrument(skip_all, fields(order_id = %order_id))]
	pub async fn reject(&self, order_id: u64, reason: String) -> Result<Order, ShopError> {
		let mut order = self.state_machine.get_order(order_id).await?;
		if order.status != OrderStatus::ToBeConfirmed {
			return Err(ShopError::OrderState(crate::state::order::refusal(
				&order, "reject",
			)));
		}
		self.state_machine
			.apply(
				&mut order,
				OrderStatus::Cancelled,
				"reject",
				require_paid("reject"),
				|o| {
					o.rejection_reason = Some(reason);
					o.cancel_time = Some(Utc::now());
				},
			)
			.await?;
		Ok(order)
	}

	/// Staff cancels an order that has not been accepted yet.
	#[instrument(skip_all, fields(order_id = %order_id))]
	pub async fn cancel_by_staff(&self, order_id: u64, reason: String) -> Result<Order, ShopError> {
		let order = self
			.state_machine
			.transition(order_id, OrderStatus::Cancelled, "cancel", unguarded, |o| {
				o.cancel_reason = Some(reason);
				o.cancel_time = Some(Utc::now());
			})
			.await?;
		Ok(order)
	}

	/// A customer cancels one of their own unpaid orders.
	#[instrument(skip_all, fields(user_id = %ctx.user_id, order_id = %order_id))]
	pub async fn cancel_by_user(&self, ctx: &UserContext, order_id: u64) -> Result<Order, ShopError> {
		let mut order = self.owned_order(ctx, order_id).await?;
		self.state_machine
			.apply(
				&mut order,
				OrderStatus::Cancelled,
				"cancel",
				require_unpaid("cancel"),
				|o| {
					o.cancel_reason = Some("cancelled by customer".into());
					o.cancel_time = Some(Utc::now());
				},
			)
			.await?;
		Ok(order)
	}

	/// Staff hands a confirmed order to delivery.
	#[instrument(skip_all, fields(order_id = %order_id))]
	pub async fn dispatch(&self, order_id: u64) -> Result<Order, ShopError> {
		let order = self
			.state_machine
			.transition(
				order_id,
				OrderStatus::DeliveryInProgress,
				"dispatch",
				unguarded,
				|_| {},
			)
			.await?;
		Ok(order)
	}

	/// Staff marks a delivery as done.
	#[instrument(skip_all, fields(order_id = %order_id))]
	pub async fn complete(&self, order_id: u64) -> Result<Order, ShopError> {
		let order = self
			.state_machine
			.transition(
				order_id,
				OrderStatus::Completed,
				"complete",
				unguarded,
				|o| o.delivery_time = Some(Utc::now()),
			)
			.await?;
		Ok(order)
	}

	/// Copies a past order's lines back into the caller's cart.
	#[instrument(skip_all, fields(user_id = %ctx.user_id, order_id = %order_id))]
	pub async fn reorder(&self, ctx: &UserContext, order_id: u64) -> Result<Vec<CartItem>, ShopError> {
		let order = self.owned_order(ctx, order_id).await?;
		let now = Utc::now();
		let rows = self
			.storage
			.order_items(order.id)
			.await?
			.into_iter()
			.map(|item| CartItem {
				id: 0,
				user_id: ctx.user_id,
				item: item.item,
				name: item.name,
				image: item.image,
				number: item.number,
				amount: item.amount,
				create_time: now,
			})
			.collect();

		let stored = self.storage.insert_cart_items(rows).await?;
		// The next cart listing rebuilds the cache from the store.
		self.evict_cart(ctx.user_id).await;
		Ok(stored)
	}

	/// Staff view of one order.
	pub async fn details(&self, order_id: u64) -> Result<OrderDetail, ShopError> {
		let order = self.state_machine.get_order(order_id).await?;
		let items = self.storage.order_items(order.id).await?;
		Ok(OrderDetail::new(order, items))
	}

	/// Customer view of one of their orders.
	pub async fn user_details(
		&self,
		ctx: &UserContext,
		order_id: u64,
	) -> Result<OrderDetail, ShopError> {
		let order = self.owned_order(ctx, order_id).await?;
		let items = self.storage.order_items(order.id).await?;
		Ok(OrderDetail::new(order, items))
	}

	/// The caller's orders, newest first.
	pub async fn history(
		&self,
		ctx: &UserContext,
		page: u64,
		page_size: u64,
		status: Option<OrderStatus>,
	) -> Result<Page<OrderDetail>, ShopError> {
		let query = OrderQuery {
			page,
			page_size,
			user_id: Some(ctx.user_id),
			status,
			..OrderQuery::default()
		};
		self.search(query).await
	}

	/// Staff search across all orders.
	pub async fn search(&self, query: OrderQuery) -> Result<Page<OrderDetail>, ShopError> {
		let page = self.storage.query_orders(&query).await?;
		let mut records = Vec::with_capacity(page.records.len());
		for order in page.records {
			let items = self.storage.order_items(order.id).await?;
			records.push(OrderDetail::new(order, items));
		}
		Ok(Page {
			total: page.total,
			records,
		})
	}

	/// Counts of orders waiting on staff.
	pub async fn statistics(&self) -> Result<OrderStatistics, ShopError> {
		Ok(OrderStatistics {
			to_be_confirmed: self
				.storage
				.count_orders(OrderStatus::ToBeConfirmed, None)
				.await?,
			confirmed: self.storage.count_orders(OrderStatus::Confirmed, None).await?,
			delivery_in_progress: self
				.storage
				.count_orders(OrderStatus::DeliveryInProgress, None)
				.await?,
		})
	}

	/// Loads an order, hiding orders of other customers.
	async fn owned_order(&self, ctx: &UserContext, order_id: u64) -> Result<Order, ShopError> {
		let order = self.state_machine.get_order(order_id).await?;
		if order.user_id != ctx.user_id {
			return Err(ShopError::NotFound(format!("order {}", order_id)));
		}
		Ok(order)
	}

	async fn evict_cart(&self, user_id: u64) {
		if let Err(e) = self.cache.delete(&[CacheKey::Cart(user_id)]).await {
			tracing::warn!(user_id = %user_id, error = %e, "Failed to evict cart cache");
		}
	}
}
