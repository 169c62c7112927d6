//! API types for the take-out HTTP API.
//!
//! This module defines the request bodies accepted by the user and admin
//! endpoints and the error envelope every failing endpoint returns.

use axum::{
	http::StatusCode,
	response::{IntoResponse, Json, Response},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::PayMethod;

/// Request body for order submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOrderRequest {
	pub address_book_id: u64,
	pub pay_method: PayMethod,
	/// Amount the client computed for the cart.
	pub amount: Decimal,
	#[serde(default)]
	pub remark: Option<String>,
}

/// Request body for the pre-payment call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
	pub order_number: String,
	pub pay_method: PayMethod,
}

/// Callback body sent by the payment gateway once funds are captured.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaySuccessNotice {
	pub order_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmRequest {
	pub id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionRequest {
	pub id: u64,
	pub rejection_reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
	pub id: u64,
	pub cancel_reason: String,
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Malformed or semantically invalid input (400)
	BadRequest { error_type: String, message: String },
	/// Referenced record does not exist (404)
	NotFound { error_type: String, message: String },
	/// Business rule refused the operation (422)
	UnprocessableEntity { error_type: String, message: String },
	/// An upstream collaborator failed (502)
	BadGateway { error_type: String, message: String },
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> StatusCode {
		match self {
			APIError::BadRequest { .. } => StatusCode::BAD_REQUEST,
			APIError::NotFound { .. } => StatusCode::NOT_FOUND,
			APIError::UnprocessableEntity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
			APIError::BadGateway { .. } => StatusCode::BAD_GATEWAY,
			APIError::InternalServerError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error_type, message) = match self {
			APIError::BadRequest {
				error_type,
				message,
			}
			| APIError::NotFound {
				error_type,
				message,
			}
			| APIError::UnprocessableEntity {
				error_type,
				message,
			}
			| APIError::BadGateway {
				error_type,
				message,
			}
			| APIError::InternalServerError {
				error_type,
				message,
			} => (error_type, message),
		};
		ErrorResponse {
			error: error_type.clone(),
			message: message.clone(),
			details: None,
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let response = self.to_error_response();
		write!(f, "{}: {}", response.error, response.message)
	}
}

impl std::error::Error for APIError {}

impl IntoResponse for APIError {
	fn into_response(self) -> Response {
		let status = self.status_code();
		(status, Json(self.to_error_response())).into_response()
	}
}
