//! HTTP endpoint handlers grouped by resource.

pub mod cart;
pub mod dish;
pub mod notify;
pub mod order;
pub mod shop;

use axum::{extract::FromRequestParts, http::request::Parts};
use sky_types::{APIError, UserContext};

/// Header carrying the id of the already authenticated caller.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Optional header with the caller's display name.
pub const USER_NAME_HEADER: &str = "x-user-name";

/// Caller identity resolved from the request headers.
pub struct CurrentUser(pub UserContext);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
	type Rejection = APIError;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		let user_id = parts
			.headers
			.get(USER_ID_HEADER)
			.and_then(|value| value.to_str().ok())
			.and_then(|value| value.trim().parse::<u64>().ok())
			.ok_or_else(|| APIError::BadRequest {
				error_type: "MISSING_USER".to_string(),
				message: format!("{} header with a numeric user id is required", USER_ID_HEADER),
			})?;

		let mut ctx = UserContext::new(user_id);
		if let Some(name) = parts
			.headers
			.get(USER_NAME_HEADER)
			.and_then(|value| value.to_str().ok())
			.filter(|name| !name.is_empty())
		{
			ctx = ctx.with_name(name);
		}
		Ok(CurrentUser(ctx))
	}
}
