//! Payment gateway callback.
//!
//! The gateway retries until it sees a success response, so this endpoint
//! always answers 200. Bodies that cannot be parsed are logged and dropped.

use crate::server::AppState;
use axum::{extract::State, http::StatusCode};
use sky_types::PaySuccessNotice;
use tracing::instrument;

/// POST /notify/paySuccess
#[instrument(skip_all)]
pub async fn pay_success(State(state): State<AppState>, body: String) -> StatusCode {
	match serde_json::from_str::<PaySuccessNotice>(&body) {
		Ok(notice) => {
			state
				.shop
				.orders()
				.confirm_payment(&notice.order_number)
				.await;
		},
		Err(e) => {
			tracing::warn!(error = %e, "Ignoring malformed payment callback");
		},
	}
	StatusCode::OK
}
