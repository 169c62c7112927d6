//! Background tasks that watch orders after submission.
//!
//! The timeout reconciler closes deliveries nobody completed, and the
//! notification pair announces new orders to staff.

pub mod notification;
pub mod timeout;

pub use notification::{LoggingSink, NotificationListener, NotificationPublisher, NotificationSink};
pub use timeout::{ReconcileReport, TimeoutReconciler};
