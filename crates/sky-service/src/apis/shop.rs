use crate::server::AppState;
use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::Json,
};
use sky_types::{APIError, ShopStatus};

/// PUT /admin/shop/{status}
pub async fn set_status(
	State(state): State<AppState>,
	Path(status): Path<u8>,
) -> Result<StatusCode, APIError> {
	let status = ShopStatus::try_from(status).map_err(|message| APIError::BadRequest {
		error_type: "INVALID_REQUEST".to_string(),
		message,
	})?;
	state.shop.shop().set_status(status).await?;
	Ok(StatusCode::NO_CONTENT)
}

/// GET /user/shop/status and GET /admin/shop/status
pub async fn status(State(state): State<AppState>) -> Json<ShopStatus> {
	Json(state.shop.shop().status().await)
}
