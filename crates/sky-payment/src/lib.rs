//! Payment gateway collaborator.
//!
//! A payment starts with a prepay request to the gateway, which answers with
//! the signed payload the customer's client needs to complete payment. The
//! gateway later reports success through the payment callback, which the
//! order handler processes.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sky_types::{ConfigSchema, ImplementationRegistry, PrepayPayload};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod mock;
}

/// Errors that can occur during payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
	/// The gateway already holds a completed payment for this order.
	#[error("Order already paid")]
	AlreadyPaid,
	#[error("Gateway error: {0}")]
	Gateway(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the interface for payment gateways.
#[async_trait]
pub trait PaymentInterface: Send + Sync {
	/// Requests a prepay payload for an order.
	async fn initiate_payment(
		&self,
		order_number: &str,
		amount: Decimal,
		description: &str,
		payer_ref: &str,
	) -> Result<PrepayPayload, PaymentError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;
}

/// Type alias for payment factory functions.
pub type PaymentFactory = fn(&toml::Value) -> Result<Box<dyn PaymentInterface>, PaymentError>;

/// Registry trait for payment implementations.
pub trait PaymentRegistry: ImplementationRegistry<Factory = PaymentFactory> {}

/// Get all registered payment implementations.
pub fn get_all_implementations() -> Vec<(&'static str, PaymentFactory)> {
	use implementations::mock;

	vec![(mock::Registry::NAME, mock::Registry::factory())]
}

/// Payment service wrapping the configured gateway.
pub struct PaymentService {
	gateway: Box<dyn PaymentInterface>,
	/// Description shown to the payer.
	description: String,
}

impl PaymentService {
	pub fn new(gateway: Box<dyn PaymentInterface>, description: impl Into<String>) -> Self {
		Self {
			gateway,
			description: description.into(),
		}
	}

	pub async fn initiate_payment(
		&self,
		order_number: &str,
		amount: Decimal,
		payer_ref: &str,
	) -> Result<PrepayPayload, PaymentError> {
		tracing::debug!(order_number = %order_number, amount = %amount, "Requesting prepay payload");
		self.gateway
			.initiate_payment(order_number, amount, &self.description, payer_ref)
			.await
	}
}
