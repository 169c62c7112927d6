//! Registry trait for self-registering implementations.
//!
//! Every backend module (storage, cache, catalog, payment) exposes a
//! `Registry` struct implementing this trait so the service binary can wire
//! implementations by the name used in configuration.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation.
	///
	/// This must match the key under `implementations`, for example
	/// `memory` for `storage.implementations.memory` or `redis` for
	/// `cache.implementations.redis`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Returns the factory function that builds this implementation from its
	/// configuration table.
	fn factory() -> Self::Factory;
}
