//! Common types module for the sky take-out backend.
//!
//! This module defines the core data types shared by every crate in the
//! workspace: orders and their line items, cart rows, catalog records,
//! cache keys, notification payloads and the HTTP error surface.

/// API error types for HTTP endpoints.
pub mod api;
/// Cache key layout and eviction requests.
pub mod cache;
/// Shopping cart rows and item selectors.
pub mod cart;
/// Catalog records provided by the menu collaborator.
pub mod catalog;
/// Caller identity passed into user-scoped operations.
pub mod context;
/// Notification payloads published when orders arrive.
pub mod events;
/// Order, line item and query types.
pub mod order;
/// Self-registration trait for pluggable implementations.
pub mod registry;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use api::*;
pub use cache::*;
pub use cart::*;
pub use catalog::*;
pub use context::UserContext;
pub use events::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use validation::*;
