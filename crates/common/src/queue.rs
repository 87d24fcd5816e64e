//! Hand-off between prize registration and notification delivery.
//!
//! Registration pushes a [`DeliveryJob`] and returns immediately; a worker on
//! the other end drains [`DeliveryJobs`]. A job that cannot be queued is not an
//! error for the caller: the record simply stays unnotified until the next
//! retry scan.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::types::PrizeRecord;

/// Request to notify the winner and the administrator about one award.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryJob {
    pub record: PrizeRecord,
    pub enqueued_at: DateTime<Utc>,
}

/// Why a job was not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    Full,
    Closed,
}

/// Producer side of the delivery queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct DeliveryQueue {
    tx: mpsc::Sender<DeliveryJob>,
}

/// Consumer side of the delivery queue.
#[derive(Debug)]
pub struct DeliveryJobs {
    rx: mpsc::Receiver<DeliveryJob>,
}

impl DeliveryQueue {
    /// Create a bounded queue holding at most `capacity` pending jobs.
    pub fn channel(capacity: usize) -> (DeliveryQueue, DeliveryJobs) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (DeliveryQueue { tx }, DeliveryJobs { rx })
    }

    /// Queue a job without waiting.
    pub fn enqueue(&self, record: PrizeRecord) -> Result<(), EnqueueError> {
        let prize_id = record.id;
        let job = DeliveryJob {
            record,
            enqueued_at: Utc::now(),
        };

        match self.tx.try_send(job) {
            Ok(()) => {
                tracing::debug!(prize_id = %prize_id, "Delivery job queued");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(prize_id = %prize_id, "Delivery queue full, leaving prize for retry scan");
                Err(EnqueueError::Full)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(prize_id = %prize_id, "Delivery queue closed, leaving prize for retry scan");
                Err(EnqueueError::Closed)
            }
        }
    }
}

impl DeliveryJobs {
    /// Wait for the next job. `None` once every producer is gone.
    pub async fn next(&mut self) -> Option<DeliveryJob> {
        self.rx.recv().await
    }

    /// Take a job if one is ready.
    pub fn try_next(&mut self) -> Option<DeliveryJob> {
        self.rx.try_recv().ok()
    }

    /// Number of jobs waiting.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
