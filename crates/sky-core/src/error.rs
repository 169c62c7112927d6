//! Errors surfaced by the shop operations.

use sky_cache::CacheError;
use sky_catalog::CatalogError;
use sky_payment::PaymentError;
use sky_storage::StorageError;
use sky_types::APIError;
use thiserror::Error;

use crate::state::OrderStateError;

/// Error returned by every user and staff operation.
///
/// The message of each variant is the specific reason shown to the caller.
#[derive(Debug, Error)]
pub enum ShopError {
	#[error("{0} not found")]
	NotFound(String),
	/// The order is not in a state that allows the operation.
	#[error("{0}")]
	OrderState(String),
	#[error("{0}")]
	InvalidRequest(String),
	/// A dish or combo referenced by the request no longer exists.
	#[error("{0} not found in catalog")]
	CatalogItemNotFound(String),
	#[error("Payment error: {0}")]
	Payment(String),
	#[error("Storage error: {0}")]
	Storage(String),
}

impl From<StorageError> for ShopError {
	fn from(err: StorageError) -> Self {
		match err {
			StorageError::NotFound => ShopError::NotFound("record".into()),
			other => ShopError::Storage(other.to_string()),
		}
	}
}

impl From<OrderStateError> for ShopError {
	fn from(err: OrderStateError) -> Self {
		match err {
			OrderStateError::OrderNotFound(id) => ShopError::NotFound(format!("order {}", id)),
			OrderStateError::Refused(reason) => ShopError::OrderState(reason),
			OrderStateError::Storage(msg) => ShopError::Storage(msg),
		}
	}
}

impl From<CatalogError> for ShopError {
	fn from(err: CatalogError) -> Self {
		match err {
			CatalogError::NotFound(what) => ShopError::NotFound(what),
			CatalogError::Rejected(reason) => ShopError::InvalidRequest(reason),
			other => ShopError::Storage(other.to_string()),
		}
	}
}

impl From<PaymentError> for ShopError {
	fn from(err: PaymentError) -> Self {
		match err {
			PaymentError::AlreadyPaid => ShopError::OrderState("order already paid".into()),
			other => ShopError::Payment(other.to_string()),
		}
	}
}

impl From<CacheError> for ShopError {
	fn from(err: CacheError) -> Self {
		ShopError::Storage(err.to_string())
	}
}

impl From<ShopError> for APIError {
	fn from(err: ShopError) -> Self {
		match err {
			ShopError::NotFound(_) => APIError::NotFound {
				error_type: "NOT_FOUND".to_string(),
				message: err.to_string(),
			},
			ShopError::OrderState(message) => APIError::UnprocessableEntity {
				error_type: "ORDER_STATE_ERROR".to_string(),
				message,
			},
			ShopError::InvalidRequest(message) => APIError::BadRequest {
				error_type: "INVALID_REQUEST".to_string(),
				message,
			},
			ShopError::CatalogItemNotFound(_) => APIError::BadRequest {
				error_type: "CATALOG_ITEM_NOT_FOUND".to_string(),
				message: err.to_string(),
			},
			ShopError::Payment(message) => APIError::BadGateway {
				error_type: "PAYMENT_ERROR".to_string(),
				message,
			},
			ShopError::Storage(message) => APIError::InternalServerError {
				error_type: "STORAGE_ERROR".to_string(),
				message,
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_api_status_mapping() {
		let cases = [
			(ShopError::NotFound("order 3".into()), 404),
			(
				ShopError::OrderState("order already cancelled, cannot confirm".into()),
				422,
			),
			(ShopError::InvalidRequest("shopping cart is empty".into()), 400),
			(ShopError::CatalogItemNotFound("dish 9".into()), 400),
			(ShopError::Payment("gateway down".into()), 502),
			(ShopError::Storage("disk full".into()), 500),
		];
		for (err, status) in cases {
			assert_eq!(APIError::from(err).status_code().as_u16(), status);
		}
	}

	#[test]
	fn test_api_message_is_the_reason() {
		let body = APIError::from(ShopError::NotFound("order 3".into())).to_error_response();
		assert_eq!(body.message, "order 3 not found");

		let body = APIError::from(ShopError::OrderState("order already paid".into()))
			.to_error_response();
		assert_eq!(body.error, "ORDER_STATE_ERROR");
		assert_eq!(body.message, "order already paid");
	}

	#[test]
	fn test_storage_not_found_maps_to_not_found() {
		assert!(matches!(
			ShopError::from(StorageError::NotFound),
			ShopError::NotFound(_)
		));
		assert!(matches!(
			ShopError::from(CatalogError::Rejected("dish is on sale and cannot be deleted".into())),
			ShopError::InvalidRequest(r) if r == "dish is on sale and cannot be deleted"
		));
	}
}
