//! Handlers behind the customer and staff operations.
//!
//! Orders go through the state machine. Carts, dish listings and the shop
//! status combine the authoritative backends with the cache layer.

pub mod cart;
pub mod catalog;
pub mod order;
pub mod shop;

pub use cart::CartHandler;
pub use catalog::CatalogHandler;
pub use order::OrderHandler;
pub use shop::ShopHandler;
