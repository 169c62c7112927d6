//! Configuration validation for pluggable backends.
//!
//! Every backend receives its own raw TOML table. Before a backend is built
//! the table is checked against a [`Schema`] so typos and out-of-range values
//! surface at startup instead of on first use.

use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
	#[error("Missing required field: {0}")]
	MissingField(String),
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
	#[error("Failed to deserialize config: {0}")]
	DeserializationError(String),
}

/// Expected type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	String,
	/// Integer with optional inclusive bounds.
	Integer { min: Option<i64>, max: Option<i64> },
	Boolean,
	/// A string holding a decimal amount such as `"12.50"`.
	Decimal,
	/// Array whose elements all have the given type.
	Array(Box<FieldType>),
	/// Nested table validated against its own schema.
	Table(Schema),
}

/// Custom check run after the type check passes.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// A named field in a schema.
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	/// Attaches a custom validator returning an error message on failure.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		validate_field_type(&self.name, value, &self.field_type)?;
		if let Some(validator) = &self.validator {
			validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			})?;
		}
		Ok(())
	}
}

/// Required and optional fields of one configuration table.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a TOML table against this schema.
	///
	/// Required fields must be present. Optional fields are only checked when
	/// present. Unknown keys are ignored.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| ValidationError::TypeMismatch {
				field: "root".to_string(),
				expected: "table".to_string(),
				actual: config.type_str().to_string(),
			})?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			field.check(value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.check(value)?;
			}
		}

		Ok(())
	}
}

fn mismatch(field_name: &str, expected: &str, value: &toml::Value) -> ValidationError {
	ValidationError::TypeMismatch {
		field: field_name.to_string(),
		expected: expected.to_string(),
		actual: value.type_str().to_string(),
	}
}

fn validate_field_type(
	field_name: &str,
	value: &toml::Value,
	expected_type: &FieldType,
) -> Result<(), ValidationError> {
	match expected_type {
		FieldType::String => {
			if !value.is_str() {
				return Err(mismatch(field_name, "string", value));
			}
		},
		FieldType::Integer { min, max } => {
			let int_val = value
				.as_integer()
				.ok_or_else(|| mismatch(field_name, "integer", value))?;

			if let Some(min_val) = min {
				if int_val < *min_val {
					return Err(ValidationError::InvalidValue {
						field: field_name.to_string(),
						message: format!("Value {} is less than minimum {}", int_val, min_val),
					});
				}
			}
			if let Some(max_val) = max {
				if int_val > *max_val {
					return Err(ValidationError::InvalidValue {
						field: field_name.to_string(),
						message: format!("Value {} is greater than maximum {}", int_val, max_val),
					});
				}
			}
		},
		FieldType::Boolean => {
			if !value.is_bool() {
				return Err(mismatch(field_name, "boolean", value));
			}
		},
		FieldType::Decimal => {
			let text = value
				.as_str()
				.ok_or_else(|| mismatch(field_name, "decimal string", value))?;
			Decimal::from_str(text).map_err(|e| ValidationError::InvalidValue {
				field: field_name.to_string(),
				message: format!("'{}' is not a decimal amount: {}", text, e),
			})?;
		},
		FieldType::Array(inner_type) => {
			let array = value
				.as_array()
				.ok_or_else(|| mismatch(field_name, "array", value))?;
			for (i, item) in array.iter().enumerate() {
				validate_field_type(&format!("{}[{}]", field_name, i), item, inner_type)?;
			}
		},
		FieldType::Table(schema) => {
			schema.validate(value).map_err(|e| match e {
				ValidationError::MissingField(f) => {
					ValidationError::MissingField(format!("{}.{}", field_name, f))
				},
				ValidationError::InvalidValue { field, message } => ValidationError::InvalidValue {
					field: format!("{}.{}", field_name, field),
					message,
				},
				ValidationError::TypeMismatch {
					field,
					expected,
					actual,
				} => ValidationError::TypeMismatch {
					field: format!("{}.{}", field_name, field),
					expected,
					actual,
				},
				other => other,
			})?;
		},
	}

	Ok(())
}

/// A configuration schema that can validate a backend's TOML table.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(text: &str) -> toml::Value {
		toml::from_str(text).unwrap()
	}

	#[test]
	fn test_required_field_missing() {
		let schema = Schema::new(vec![Field::new("url", FieldType::String)], vec![]);
		let err = schema.validate(&parse("other = 1")).unwrap_err();
		assert!(matches!(err, ValidationError::MissingField(f) if f == "url"));
	}

	#[test]
	fn test_integer_bounds() {
		let schema = Schema::new(
			vec![],
			vec![Field::new(
				"hour",
				FieldType::Integer {
					min: Some(0),
					max: Some(23),
				},
			)],
		);
		assert!(schema.validate(&parse("hour = 1")).is_ok());
		assert!(schema.validate(&parse("hour = 24")).is_err());
	}

	#[test]
	fn test_decimal_field() {
		let schema = Schema::new(vec![Field::new("price", FieldType::Decimal)], vec![]);
		assert!(schema.validate(&parse(r#"price = "12.50""#)).is_ok());
		assert!(schema.validate(&parse(r#"price = "twelve""#)).is_err());
		assert!(schema.validate(&parse("price = 12")).is_err());
	}

	#[test]
	fn test_nested_table_errors_are_prefixed() {
		let inner = Schema::new(vec![Field::new("name", FieldType::String)], vec![]);
		let schema = Schema::new(
			vec![],
			vec![Field::new(
				"dishes",
				FieldType::Array(Box::new(FieldType::Table(inner))),
			)],
		);
		let err = schema
			.validate(&parse("[[dishes]]\nname = 1\n"))
			.unwrap_err();
		assert!(err.to_string().contains("dishes[0].name"));
	}

	#[test]
	fn test_custom_validator() {
		let schema = Schema::new(
			vec![Field::new("url", FieldType::String).with_validator(|v| {
				match v.as_str() {
					Some(url) if url.starts_with("redis://") => Ok(()),
					_ => Err("must be a redis:// url".into()),
				}
			})],
			vec![],
		);
		assert!(schema.validate(&parse(r#"url = "redis://localhost""#)).is_ok());
		assert!(schema.validate(&parse(r#"url = "http://localhost""#)).is_err());
	}
}
