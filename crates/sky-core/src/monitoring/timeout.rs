//! Daily reconciliation of stale deliveries.
//!
//! Once a day the reconciler completes every delivery placed more than the
//! configured timeout ago, then reports how many completed orders predate the
//! same cutoff. Both steps are single bulk statements against the store, so a
//! repeated run finds nothing left to change.

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveTime, TimeZone, Utc};
use sky_storage::StorageService;
use sky_types::OrderStatus;
use std::sync::Arc;

/// Outcome of one reconciliation pass. A step that failed is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
	pub completed: Option<u64>,
	pub completed_before_cutoff: Option<u64>,
}

/// Scheduled completion of deliveries that were never closed.
pub struct TimeoutReconciler {
	storage: Arc<StorageService>,
	run_at: NaiveTime,
	delivery_timeout: ChronoDuration,
}

impl TimeoutReconciler {
	/// Creates a reconciler firing daily at `hour:minute` local time.
	///
	/// Out-of-range times fall back to 01:00.
	pub fn new(
		storage: Arc<StorageService>,
		hour: u32,
		minute: u32,
		delivery_timeout_hours: u64,
	) -> Self {
		let run_at = NaiveTime::from_hms_opt(hour, minute, 0)
			.or_else(|| NaiveTime::from_hms_opt(1, 0, 0))
			.unwrap_or_default();
		let hours = i64::try_from(delivery_timeout_hours).unwrap_or(i64::MAX);
		Self {
			storage,
			run_at,
			delivery_timeout: ChronoDuration::try_hours(hours).unwrap_or(ChronoDuration::MAX),
		}
	}

	/// The first scheduled run strictly after `now`.
	pub fn next_run_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Tz> {
		let tz = now.timezone();
		let mut day = now.date_naive();
		// Two days covers a run time skipped by a daylight saving jump.
		for _ in 0..3 {
			if let Some(candidate) = tz.from_local_datetime(&day.and_time(self.run_at)).earliest() {
				if candidate > *now {
					return candidate;
				}
			}
			match day.succ_opt() {
				Some(next) => day = next,
				None => break,
			}
		}
		now.clone() + ChronoDuration::days(1)
	}

	/// Runs both reconciliation steps as of `now`.
	pub async fn reconcile(&self, now: DateTime<Utc>) -> ReconcileReport {
		let cutoff = now
			.checked_sub_signed(self.delivery_timeout)
			.unwrap_or(DateTime::<Utc>::MIN_UTC);

		let completed = match self.storage.complete_stale_deliveries(cutoff, now).await {
			Ok(count) => {
				if count > 0 {
					tracing::info!(count = count, cutoff = %cutoff, "Completed stale deliveries");
				}
				Some(count)
			},
			Err(e) => {
				tracing::error!(error = %e, "Failed to complete stale deliveries");
				None
			},
		};

		let completed_before_cutoff = match self
			.storage
			.count_orders(OrderStatus::Completed, Some(cutoff))
			.await
		{
			Ok(count) => {
				tracing::info!(count = count, cutoff = %cutoff, "Completed orders before cutoff");
				Some(count)
			},
			Err(e) => {
				tracing::error!(error = %e, "Failed to count completed orders");
				None
			},
		};

		ReconcileReport {
			completed,
			completed_before_cutoff,
		}
	}

	/// Sleeps until each scheduled time and reconciles, forever.
	pub async fn run(&self) {
		loop {
			let now = Local::now();
			let next = self.next_run_after(&now);
			tracing::debug!(next_run = %next, "Reconciler scheduled");

			let wait = (next - now).to_std().unwrap_or_default();
			tokio::time::sleep(wait).await;

			self.reconcile(Utc::now()).await;
		}
	}
}
