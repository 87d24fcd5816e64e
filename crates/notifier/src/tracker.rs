//! Notification delivery bookkeeping.
//!
//! A prize is marked notified only after both the winner and the admin
//! message were accepted by a provider. Anything short of that leaves the
//! record for [`DeliveryTracker::retry_pending`].

use std::sync::Arc;

use serde::Serialize;

use prize_common::error::AppError;
use prize_common::store::PrizeStore;
use prize_common::types::PrizeRecord;

use crate::composer::NotificationComposer;
use crate::dispatcher::FallbackDispatcher;

/// Counts from one retry scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetrySummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct DeliveryTracker {
    store: Arc<dyn PrizeStore>,
    dispatcher: FallbackDispatcher,
    composer: NotificationComposer,
}

impl DeliveryTracker {
    pub fn new(
        store: Arc<dyn PrizeStore>,
        dispatcher: FallbackDispatcher,
        composer: NotificationComposer,
    ) -> Self {
        Self {
            store,
            dispatcher,
            composer,
        }
    }

    pub fn dispatcher(&self) -> &FallbackDispatcher {
        &self.dispatcher
    }

    /// Send both notifications for `record` and persist the outcome.
    ///
    /// Returns `Ok(false)` when either message could not be delivered.
    /// `Err` only comes from the store.
    pub async fn deliver_and_track(&self, record: &PrizeRecord) -> Result<bool, AppError> {
        if record.notified {
            tracing::debug!(prize_id = %record.id, "Prize already notified, skipping");
            return Ok(true);
        }

        let (winner, admin) = match self.composer.compose(record) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!(prize_id = %record.id, error = %e, "Failed to compose notifications");
                return Ok(false);
            }
        };

        if let Err(e) = self.dispatcher.send(&winner).await {
            tracing::warn!(
                prize_id = %record.id,
                email = %record.email,
                attempts = e.attempts.len(),
                error = %e,
                "Winner notification failed, admin notification skipped"
            );
            return Ok(false);
        }

        if let Err(e) = self.dispatcher.send(&admin).await {
            tracing::warn!(
                prize_id = %record.id,
                attempts = e.attempts.len(),
                error = %e,
                "Admin notification failed"
            );
            return Ok(false);
        }

        self.store.mark_notified(record.id).await?;
        tracing::info!(prize_id = %record.id, email = %record.email, "Prize notifications delivered");
        Ok(true)
    }

    /// Re-attempt delivery for every unnotified record, one at a time.
    ///
    /// A failure on one record never stops the scan.
    pub async fn retry_pending(&self) -> Result<RetrySummary, AppError> {
        let pending = self.store.find_all_unnotified().await?;
        let mut summary = RetrySummary {
            total: pending.len(),
            ..RetrySummary::default()
        };

        if pending.is_empty() {
            tracing::debug!("No pending notifications");
            return Ok(summary);
        }

        tracing::info!(count = pending.len(), "Retrying pending notifications");

        for record in &pending {
            match self.deliver_and_track(record).await {
                Ok(true) => summary.succeeded += 1,
                Ok(false) => summary.failed += 1,
                Err(e) => {
                    tracing::error!(prize_id = %record.id, error = %e, "Failed to record delivery");
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Notification retry finished"
        );
        Ok(summary)
    }
}
