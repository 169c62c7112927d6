//! Mock payment gateway for testing and development.
//!
//! Every request succeeds with a freshly generated payload, except for order
//! numbers listed in `already_paid`, which answer as the real gateway does
//! for orders it has already settled.

use crate::{PaymentError, PaymentFactory, PaymentInterface, PaymentRegistry};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sky_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, PrepayPayload, Schema,
	ValidationError,
};
use std::collections::HashSet;

/// Configuration for the mock gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockPaymentConfig {
	/// Order numbers the gateway reports as already paid.
	#[serde(default)]
	pub already_paid: Vec<String>,
	/// Fail every request with a gateway error.
	#[serde(default)]
	pub unavailable: bool,
}

/// Mock gateway producing random prepay payloads.
pub struct MockPaymentGateway {
	already_paid: HashSet<String>,
	unavailable: bool,
}

impl MockPaymentGateway {
	pub fn new(config: MockPaymentConfig) -> Self {
		Self {
			already_paid: config.already_paid.into_iter().collect(),
			unavailable: config.unavailable,
		}
	}
}

#[async_trait]
impl PaymentInterface for MockPaymentGateway {
	async fn initiate_payment(
		&self,
		order_number: &str,
		amount: Decimal,
		description: &str,
		payer_ref: &str,
	) -> Result<PrepayPayload, PaymentError> {
		if self.unavailable {
			return Err(PaymentError::Gateway("mock gateway unavailable".into()));
		}
		if self.already_paid.contains(order_number) {
			return Err(PaymentError::AlreadyPaid);
		}
		if amount <= Decimal::ZERO {
			return Err(PaymentError::Gateway(format!(
				"invalid amount {} for order {}",
				amount, order_number
			)));
		}

		tracing::info!(
			order_number = %order_number,
			amount = %amount,
			payer = %payer_ref,
			description = %description,
			"Mock prepay issued"
		);

		Ok(PrepayPayload {
			nonce_str: uuid::Uuid::new_v4().simple().to_string(),
			package: format!("prepay_id=mock{}", uuid::Uuid::new_v4().simple()),
			sign_type: "RSA".to_string(),
			pay_sign: uuid::Uuid::new_v4().simple().to_string(),
			time_stamp: chrono::Utc::now().timestamp().to_string(),
		})
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MockPaymentSchema)
	}
}

/// Configuration schema for the mock gateway.
pub struct MockPaymentSchema;

impl ConfigSchema for MockPaymentSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("already_paid", FieldType::Array(Box::new(FieldType::String))),
				Field::new("unavailable", FieldType::Boolean),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a mock gateway from configuration.
pub fn create_gateway(config: &toml::Value) -> Result<Box<dyn PaymentInterface>, PaymentError> {
	MockPaymentSchema
		.validate(config)
		.map_err(|e| PaymentError::Configuration(format!("Invalid configuration: {}", e)))?;

	let config: MockPaymentConfig = config
		.clone()
		.try_into()
		.map_err(|e: toml::de::Error| PaymentError::Configuration(e.to_string()))?;

	Ok(Box::new(MockPaymentGateway::new(config)))
}

/// Registry for the mock payment implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "mock";
	type Factory = PaymentFactory;

	fn factory() -> Self::Factory {
		create_gateway
	}
}

impl PaymentRegistry for Registry {}
