//! Background tasks that drive notification delivery.

use std::time::Duration;

use prize_common::queue::DeliveryJobs;

use crate::tracker::DeliveryTracker;

/// Consumes queued delivery jobs until every producer has been dropped.
pub struct DeliveryWorker {
    jobs: DeliveryJobs,
    tracker: DeliveryTracker,
}

impl DeliveryWorker {
    pub fn new(jobs: DeliveryJobs, tracker: DeliveryTracker) -> Self {
        Self { jobs, tracker }
    }

    /// Process jobs one at a time. Returns the number of jobs handled.
    pub async fn run(mut self) -> usize {
        tracing::info!("Delivery worker started");
        let mut handled = 0;

        while let Some(job) = self.jobs.next().await {
            handled += 1;
            let queued_ms = (chrono::Utc::now() - job.enqueued_at).num_milliseconds();

            match self.tracker.deliver_and_track(&job.record).await {
                Ok(true) => {
                    tracing::debug!(prize_id = %job.record.id, queued_ms, "Delivery job complete");
                }
                Ok(false) => {
                    tracing::warn!(
                        prize_id = %job.record.id,
                        "Delivery failed, prize left for retry scan"
                    );
                }
                Err(e) => {
                    tracing::error!(prize_id = %job.record.id, error = %e, "Failed to record delivery");
                }
            }
        }

        tracing::info!(handled, "Delivery worker stopped");
        handled
    }
}

/// Periodically re-scans for unnotified prizes.
pub struct RetryDriver {
    tracker: DeliveryTracker,
    interval: Duration,
}

impl RetryDriver {
    pub fn new(tracker: DeliveryTracker, interval: Duration) -> Self {
        Self { tracker, interval }
    }

    /// Run forever; cancel the task to stop. Scans never overlap.
    pub async fn run(self) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Retry driver started");

        loop {
            tokio::time::sleep(self.interval).await;

            if let Err(e) = self.tracker.retry_pending().await {
                tracing::error!(error = %e, "Retry scan failed, will try again next interval");
            }
        }
    }
}
