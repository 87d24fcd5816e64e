//! Read-only reporting over stored prizes.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;

use prize_common::error::AppError;
use prize_common::store::PrizeStore;
use prize_common::types::{PrizeFilter, PrizeRecord};

/// All prizes, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct PrizeListing {
    pub total: usize,
    pub prizes: Vec<PrizeRecord>,
}

/// Aggregate counters for the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrizeStats {
    pub total: u64,
    pub notified: u64,
    /// Prizes awarded during the current UTC day.
    pub today: u64,
    /// `notified / total` as a rounded percentage, 0 when there are no prizes.
    pub notified_percentage: u64,
}

pub async fn list_prizes(store: &dyn PrizeStore) -> Result<PrizeListing, AppError> {
    let prizes = store.list_all().await?;
    Ok(PrizeListing {
        total: prizes.len(),
        prizes,
    })
}

pub async fn prize_stats(store: &dyn PrizeStore, now: DateTime<Utc>) -> Result<PrizeStats, AppError> {
    let total = store.count_all().await?;
    let notified = store.count_where(PrizeFilter::notified(true)).await?;

    let day_start = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let today = store
        .count_where(PrizeFilter::awarded_between(day_start, day_start + Duration::days(1)))
        .await?;

    Ok(PrizeStats {
        total,
        notified,
        today,
        notified_percentage: percentage(notified, total),
    })
}

fn percentage(part: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    (part * 100 + total / 2) / total
}
