//! Order endpoints for customers and staff.

use crate::apis::CurrentUser;
use crate::server::AppState;
use axum::{
	extract::{Path, Query, State},
	response::Json,
};
use serde::Deserialize;
use sky_types::{
	APIError, CancelRequest, CartItem, ConfirmRequest, Order, OrderDetail, OrderQuery,
	OrderReceipt, OrderStatistics, OrderStatus, Page, PaymentRequest, PrepayPayload,
	RejectionRequest, SubmitOrderRequest,
};

/// Paging for the customer's order history.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
	#[serde(default = "first_page")]
	pub page: u64,
	#[serde(default = "default_page_size")]
	pub page_size: u64,
	#[serde(default)]
	pub status: Option<OrderStatus>,
}

fn first_page() -> u64 {
	1
}

fn default_page_size() -> u64 {
	10
}

/// POST /user/order/submit
pub async fn submit(
	State(state): State<AppState>,
	CurrentUser(ctx): CurrentUser,
	Json(request): Json<SubmitOrderRequest>,
) -> Result<Json<OrderReceipt>, APIError> {
	let receipt = state.shop.orders().submit(&ctx, request).await?;
	Ok(Json(receipt))
}

/// PUT /user/order/payment
pub async fn payment(
	State(state): State<AppState>,
	CurrentUser(ctx): CurrentUser,
	Json(request): Json<PaymentRequest>,
) -> Result<Json<PrepayPayload>, APIError> {
	let payload = state.shop.orders().pay(&ctx, request).await?;
	Ok(Json(payload))
}

/// GET /user/order/history
pub async fn history(
	State(state): State<AppState>,
	CurrentUser(ctx): CurrentUser,
	Query(query): Query<HistoryQuery>,
) -> Result<Json<Page<OrderDetail>>, APIError> {
	let page = state
		.shop
		.orders()
		.history(&ctx, query.page, query.page_size, query.status)
		.await?;
	Ok(Json(page))
}

/// GET /user/order/detail/{id}
pub async fn user_detail(
	State(state): State<AppState>,
	CurrentUser(ctx): CurrentUser,
	Path(id): Path<u64>,
) -> Result<Json<OrderDetail>, APIError> {
	let detail = state.shop.orders().user_details(&ctx, id).await?;
	Ok(Json(detail))
}

/// PUT /user/order/cancel/{id}
pub async fn user_cancel(
	State(state): State<AppState>,
	CurrentUser(ctx): CurrentUser,
	Path(id): Path<u64>,
) -> Result<Json<Order>, APIError> {
	let order = state.shop.orders().cancel_by_user(&ctx, id).await?;
	Ok(Json(order))
}

/// POST /user/order/repetition/{id}
pub async fn repetition(
	State(state): State<AppState>,
	CurrentUser(ctx): CurrentUser,
	Path(id): Path<u64>,
) -> Result<Json<Vec<CartItem>>, APIError> {
	let rows = state.shop.orders().reorder(&ctx, id).await?;
	Ok(Json(rows))
}

/// GET /admin/order/conditionSearch
pub async fn condition_search(
	State(state): State<AppState>,
	Query(query): Query<OrderQuery>,
) -> Result<Json<Page<OrderDetail>>, APIError> {
	let page = state.shop.orders().search(query).await?;
	Ok(Json(page))
}

/// GET /admin/order/statistics
pub async fn statistics(State(state): State<AppState>) -> Result<Json<OrderStatistics>, APIError> {
	let stats = state.shop.orders().statistics().await?;
	Ok(Json(stats))
}

/// GET /admin/order/details/{id}
pub async fn details(
	State(state): State<AppState>,
	Path(id): Path<u64>,
) -> Result<Json<OrderDetail>, APIError> {
	let detail = state.shop.orders().details(id).await?;
	Ok(Json(detail))
}

/// PUT /admin/order/confirm
pub async fn confirm(
	State(state): State<AppState>,
	Json(request): Json<ConfirmRequest>,
) -> Result<Json<Order>, APIError> {
	let order = state.shop.orders().confirm(request.id).await?;
	Ok(Json(order))
}

/// PUT /admin/order/rejection
pub async fn rejection(
	State(state): State<AppState>,
	Json(request): Json<RejectionRequest>,
) -> Result<Json<Order>, APIError> {
	let order = state
		.shop
		.orders()
		.reject(request.id, request.rejection_reason)
		.await?;
	Ok(Json(order))
}

/// PUT /admin/order/cancel
pub async fn admin_cancel(
	State(state): State<AppState>,
	Json(request): Json<CancelRequest>,
) -> Result<Json<Order>, APIError> {
	let order = state
		.shop
		.orders()
		.cancel_by_staff(request.id, request.cancel_reason)
		.await?;
	Ok(Json(order))
}

/// PUT /admin/order/delivery/{id}
pub async fn delivery(
	State(state): State<AppState>,
	Path(id): Path<u64>,
) -> Result<Json<Order>, APIError> {
	let order = state.shop.orders().dispatch(id).await?;
	Ok(Json(order))
}

/// PUT /admin/order/complete/{id}
pub async fn complete(
	State(state): State<AppState>,
	Path(id): Path<u64>,
) -> Result<Json<Order>, APIError> {
	let order = state.shop.orders().complete(id).await?;
	Ok(Json(order))
}
