//! Prize persistence.
//!
//! The rest of the system talks to storage only through [`PrizeStore`].
//! Two backends exist: PostgreSQL for deployments and an in-process store
//! used when no database is configured (and throughout the test suites).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::AppError;
use crate::types::{NewPrize, PrizeFilter, PrizeRecord};

/// Result of an atomic recency-checked insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(PrizeRecord),
    /// Another award for the same email already sits inside the window.
    Recent(PrizeRecord),
}

/// Document-style storage for prize records.
#[async_trait]
pub trait PrizeStore: Send + Sync {
    /// Store a record unconditionally.
    async fn insert(&self, prize: NewPrize) -> Result<PrizeRecord, AppError>;

    /// Store a record unless the same email has an award in `[since, until]`.
    ///
    /// The check and the insert are a single atomic step per email, so two
    /// concurrent registrations for one address cannot both succeed.
    async fn insert_if_no_recent(
        &self,
        prize: NewPrize,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<InsertOutcome, AppError>;

    /// Most recent award for `email` with `since <= awarded_at <= until`.
    async fn find_most_recent_by_email_since(
        &self,
        email: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Option<PrizeRecord>, AppError>;

    /// Every record still waiting for notification, oldest first.
    async fn find_all_unnotified(&self) -> Result<Vec<PrizeRecord>, AppError>;

    /// Set `notified = true`. Nothing ever resets it.
    async fn mark_notified(&self, id: Uuid) -> Result<(), AppError>;

    /// Every record, newest first.
    async fn list_all(&self) -> Result<Vec<PrizeRecord>, AppError>;

    async fn count_all(&self) -> Result<u64, AppError>;

    async fn count_where(&self, filter: PrizeFilter) -> Result<u64, AppError>;
}

// ============================================================
// PostgreSQL
// ============================================================

/// PostgreSQL-backed store over the `prizes` table.
#[derive(Clone)]
pub struct PgPrizeStore {
    pool: PgPool,
}

impl PgPrizeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PrizeStore for PgPrizeStore {
    async fn insert(&self, prize: NewPrize) -> Result<PrizeRecord, AppError> {
        let record: PrizeRecord = sqlx::query_as(
            r#"
            INSERT INTO prizes (id, email, prize, awarded_at, registered_at_display, notified)
            VALUES ($1, $2, $3, $4, $5, false)
            RETURNING id, email, prize, awarded_at, registered_at_display, notified
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&prize.email)
        .bind(&prize.prize)
        .bind(prize.awarded_at)
        .bind(&prize.registered_at_display)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn insert_if_no_recent(
        &self,
        prize: NewPrize,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<InsertOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        // Serialize registrations per email until the transaction ends.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&prize.email)
            .execute(&mut *tx)
            .await?;

        let recent: Option<PrizeRecord> = sqlx::query_as(
            r#"
            SELECT id, email, prize, awarded_at, registered_at_display, notified
            FROM prizes
            WHERE email = $1 AND awarded_at >= $2 AND awarded_at <= $3
            ORDER BY awarded_at DESC
            LIMIT 1
            "#,
        )
        .bind(&prize.email)
        .bind(since)
        .bind(until)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(existing) = recent {
            tx.rollback().await?;
            return Ok(InsertOutcome::Recent(existing));
        }

        let record: PrizeRecord = sqlx::query_as(
            r#"
            INSERT INTO prizes (id, email, prize, awarded_at, registered_at_display, notified)
            VALUES ($1, $2, $3, $4, $5, false)
            RETURNING id, email, prize, awarded_at, registered_at_display, notified
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&prize.email)
        .bind(&prize.prize)
        .bind(prize.awarded_at)
        .bind(&prize.registered_at_display)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(InsertOutcome::Inserted(record))
    }

    async fn find_most_recent_by_email_since(
        &self,
        email: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Option<PrizeRecord>, AppError> {
        let record = sqlx::query_as(
            r#"
            SELECT id, email, prize, awarded_at, registered_at_display, notified
            FROM prizes
            WHERE email = $1 AND awarded_at >= $2 AND awarded_at <= $3
            ORDER BY awarded_at DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .bind(since)
        .bind(until)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_all_unnotified(&self) -> Result<Vec<PrizeRecord>, AppError> {
        let records = sqlx::query_as(
            r#"
            SELECT id, email, prize, awarded_at, registered_at_display, notified
            FROM prizes
            WHERE notified = false
            ORDER BY awarded_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn mark_notified(&self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE prizes SET notified = true WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Prize {} not found", id)));
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<PrizeRecord>, AppError> {
        let records = sqlx::query_as(
            r#"
            SELECT id, email, prize, awarded_at, registered_at_display, notified
            FROM prizes
            ORDER BY awarded_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn count_all(&self) -> Result<u64, AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM prizes")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn count_where(&self, filter: PrizeFilter) -> Result<u64, AppError> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM prizes WHERE TRUE");

        if let Some(notified) = filter.notified {
            query.push(" AND notified = ").push_bind(notified);
        }
        if let Some((from, to)) = filter.awarded_between {
            query
                .push(" AND awarded_at >= ")
                .push_bind(from)
                .push(" AND awarded_at < ")
                .push_bind(to);
        }

        let (count,): (i64,) = query.build_query_as::<(i64,)>().fetch_one(&self.pool).await?;
        Ok(count as u64)
    }
}

// ============================================================
// In-memory
// ============================================================

/// In-process store. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryPrizeStore {
    records: Mutex<Vec<PrizeRecord>>,
}

impl MemoryPrizeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn most_recent<'a>(
        records: &'a [PrizeRecord],
        email: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Option<&'a PrizeRecord> {
        records
            .iter()
            .filter(|r| r.email == email && r.awarded_at >= since && r.awarded_at <= until)
            .max_by_key(|r| r.awarded_at)
    }
}

#[async_trait]
impl PrizeStore for MemoryPrizeStore {
    async fn insert(&self, prize: NewPrize) -> Result<PrizeRecord, AppError> {
        let record = prize.into_record(Uuid::new_v4());
        self.records.lock().await.push(record.clone());
        Ok(record)
    }

    async fn insert_if_no_recent(
        &self,
        prize: NewPrize,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<InsertOutcome, AppError> {
        let mut records = self.records.lock().await;

        if let Some(existing) = Self::most_recent(&records, &prize.email, since, until) {
            return Ok(InsertOutcome::Recent(existing.clone()));
        }

        let record = prize.into_record(Uuid::new_v4());
        records.push(record.clone());
        Ok(InsertOutcome::Inserted(record))
    }

    async fn find_most_recent_by_email_since(
        &self,
        email: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Option<PrizeRecord>, AppError> {
        let records = self.records.lock().await;
        Ok(Self::most_recent(&records, email, since, until).cloned())
    }

    async fn find_all_unnotified(&self) -> Result<Vec<PrizeRecord>, AppError> {
        let mut pending: Vec<PrizeRecord> = self
            .records
            .lock()
            .await
            .iter()
            .filter(|r| !r.notified)
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.awarded_at);
        Ok(pending)
    }

    async fn mark_notified(&self, id: Uuid) -> Result<(), AppError> {
        let mut records = self.records.lock().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Prize {} not found", id)))?;
        record.notified = true;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<PrizeRecord>, AppError> {
        let mut all = self.records.lock().await.clone();
        all.sort_by(|a, b| b.awarded_at.cmp(&a.awarded_at));
        Ok(all)
    }

    async fn count_all(&self) -> Result<u64, AppError> {
        Ok(self.records.lock().await.len() as u64)
    }

    async fn count_where(&self, filter: PrizeFilter) -> Result<u64, AppError> {
        let records = self.records.lock().await;
        Ok(records.iter().filter(|r| filter.matches(r)).count() as u64)
    }
}
