//! Caller identity.

use serde::{Deserialize, Serialize};

/// The already-authenticated caller of a user-scoped operation.
///
/// Token issuance and verification happen upstream; handlers only ever see
/// the resolved identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
	pub user_id: u64,
	/// Display name used in staff notifications.
	pub user_name: Option<String>,
}

impl UserContext {
	pub fn new(user_id: u64) -> Self {
		Self {
			user_id,
			user_name: None,
		}
	}

	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.user_name = Some(name.into());
		self
	}
}
