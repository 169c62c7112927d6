//! Shopping cart endpoints.

use crate::apis::CurrentUser;
use crate::server::AppState;
use axum::{extract::State, http::StatusCode, response::Json};
use sky_types::{APIError, CartItem, CartItemRequest};

/// POST /user/shoppingCart/add
pub async fn add(
	State(state): State<AppState>,
	CurrentUser(ctx): CurrentUser,
	Json(request): Json<CartItemRequest>,
) -> Result<Json<CartItem>, APIError> {
	let row = state.shop.carts().add(&ctx, &request).await?;
	Ok(Json(row))
}

/// POST /user/shoppingCart/sub
///
/// Responds with the remaining row, or `null` once the last unit is gone.
pub async fn sub(
	State(state): State<AppState>,
	CurrentUser(ctx): CurrentUser,
	Json(request): Json<CartItemRequest>,
) -> Result<Json<Option<CartItem>>, APIError> {
	let row = state.shop.carts().sub(&ctx, &request).await?;
	Ok(Json(row))
}

/// GET /user/shoppingCart/list
pub async fn list(
	State(state): State<AppState>,
	CurrentUser(ctx): CurrentUser,
) -> Result<Json<Vec<CartItem>>, APIError> {
	let rows = state.shop.carts().list(&ctx).await?;
	Ok(Json(rows))
}

/// DELETE /user/shoppingCart/clean
pub async fn clean(
	State(state): State<AppState>,
	CurrentUser(ctx): CurrentUser,
) -> Result<StatusCode, APIError> {
	state.shop.carts().clean(&ctx).await?;
	Ok(StatusCode::NO_CONTENT)
}
