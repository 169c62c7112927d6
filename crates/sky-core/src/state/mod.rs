//! State management for orders.
//!
//! This module provides the state machine that guards every order status
//! change and persists the result.

pub mod order;

pub use order::{OrderStateError, OrderStateMachine};
