use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{
    PgConnection, PgPool, Row,
    postgres::{PgConnectOptions, PgPoolOptions, PgRow},
};
use uuid::Uuid;

use crate::broker::{Broker, BrokerError};
use crate::config::QueueConfig;
use crate::job::{FailureOutcome, Job, JobId, JobOptions, JobState, LEASE_EXPIRED, NewJob};

const JOB_COLUMNS: &str = "id, name, data, options, state, attempts_made, available_at, \
     locked_until, last_error, created_at";

/// PostgreSQL-backed broker.
///
/// Jobs live in the `queue_jobs` table, scoped by queue name. Consumers
/// claim with `FOR UPDATE SKIP LOCKED`, so several workers can poll the
/// same queue without handing out a job twice. A claim sets `locked_until`;
/// an active job past that instant is failed with [`LEASE_EXPIRED`] by the
/// next `fetch_next`, which makes it claimable again while attempts remain.
#[derive(Clone)]
pub struct PostgresBroker {
    pool: PgPool,
    queue: String,
    lease: Duration,
}

impl PostgresBroker {
    pub fn new(pool: PgPool, queue: impl Into<String>) -> Self {
        Self {
            pool,
            queue: queue.into(),
            lease: QueueConfig::default().visibility_timeout(),
        }
    }

    /// Sets how long a claimed job stays leased to its consumer.
    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.lease = timeout;
        self
    }

    /// Opens a connection pool from the queue settings.
    pub async fn connect(config: &QueueConfig) -> Result<Self, BrokerError> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self::new(pool, config.queue_name.clone())
            .with_visibility_timeout(config.visibility_timeout()))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Counts jobs of this queue in `state`.
    pub async fn count_in_state(&self, state: JobState) -> Result<i64, BrokerError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM queue_jobs WHERE queue = $1 AND state = $2")
                .bind(&self.queue)
                .bind(state.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_job(row: PgRow) -> Result<Job, BrokerError> {
        let options: JobOptions = serde_json::from_value(row.try_get("options")?)?;
        let state: String = row.try_get("state")?;
        let attempts_made: i32 = row.try_get("attempts_made")?;

        Ok(Job {
            id: JobId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            data: row.try_get("data")?,
            options,
            attempts_made: attempts_made.max(0) as u32,
            state: state.parse().map_err(BrokerError::new)?,
            available_at: row.try_get("available_at")?,
            locked_until: row.try_get("locked_until")?,
            last_error: row.try_get("last_error")?,
            created_at: row.try_get("created_at")?,
        })
    }

    /// Writes back the bookkeeping done by [`Job::next_failure`].
    async fn save_failure(conn: &mut PgConnection, job: &Job) -> Result<(), BrokerError> {
        sqlx::query(
            r#"
            UPDATE queue_jobs
            SET state = $2, attempts_made = $3, available_at = $4, last_error = $5,
                locked_until = NULL
            WHERE id = $1
            "#,
        )
        .bind(job.id.as_uuid())
        .bind(job.state.as_str())
        .bind(job.attempts_made as i32)
        .bind(job.available_at)
        .bind(&job.last_error)
        .execute(conn)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Broker for PostgresBroker {
    async fn add(&self, job: NewJob) -> Result<JobId, BrokerError> {
        let id = JobId::new();
        let options = serde_json::to_value(job.options)?;

        sqlx::query(
            r#"
            INSERT INTO queue_jobs (id, queue, name, data, options, available_at)
            VALUES ($1, $2, $3, $4, $5, NOW() + make_interval(secs => $6::float8 / 1000))
            "#,
        )
        .bind(id.as_uuid())
        .bind(&self.queue)
        .bind(&job.name)
        .bind(&job.data)
        .bind(options)
        .bind(job.options.delay as i64)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn add_bulk(&self, jobs: Vec<NewJob>) -> Result<Vec<JobId>, BrokerError> {
        let batch_id = Uuid::new_v4();
        let mut ids = Vec::with_capacity(jobs.len());
        let mut tx = self.pool.begin().await?;

        for job in &jobs {
            let id = JobId::new();
            let options = serde_json::to_value(job.options)?;

            sqlx::query(
                r#"
                INSERT INTO queue_jobs (id, queue, name, data, options, batch_id, available_at)
                VALUES ($1, $2, $3, $4, $5, $6, NOW() + make_interval(secs => $7::float8 / 1000))
                "#,
            )
            .bind(id.as_uuid())
            .bind(&self.queue)
            .bind(&job.name)
            .bind(&job.data)
            .bind(options)
            .bind(batch_id)
            .bind(job.options.delay as i64)
            .execute(&mut *tx)
            .await?;

            ids.push(id);
        }

        tx.commit().await?;
        Ok(ids)
    }

    async fn fetch_next(&self) -> Result<Option<Job>, BrokerError> {
        let mut tx = self.pool.begin().await?;

        let expired_sql = format!(
            r#"
            SELECT {JOB_COLUMNS} FROM queue_jobs
            WHERE queue = $1 AND state = 'active' AND locked_until <= clock_timestamp()
            FOR UPDATE SKIP LOCKED
            "#
        );
        let expired = sqlx::query(&expired_sql)
            .bind(&self.queue)
            .fetch_all(&mut *tx)
            .await?;

        for row in expired {
            let mut job = Self::row_to_job(row)?;
            let outcome = job.next_failure(LEASE_EXPIRED, Utc::now());
            Self::save_failure(&mut tx, &job).await?;
            tracing::warn!(
                job_id = %job.id,
                job = %job.name,
                ?outcome,
                "claim lease expired"
            );
        }

        let sql = format!(
            r#"
            UPDATE queue_jobs
            SET state = 'active',
                locked_until = clock_timestamp() + make_interval(secs => $2::float8 / 1000)
            WHERE id = (
                SELECT id FROM queue_jobs
                WHERE queue = $1 AND state = 'waiting' AND available_at <= clock_timestamp()
                ORDER BY available_at ASC, seq ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {JOB_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(&self.queue)
            .bind(self.lease.as_millis() as i64)
            .fetch_optional(&mut *tx)
            .await?;

        tx.commit().await?;
        row.map(Self::row_to_job).transpose()
    }

    async fn complete(&self, id: JobId) -> Result<(), BrokerError> {
        let result = sqlx::query(
            "UPDATE queue_jobs SET state = 'completed', locked_until = NULL WHERE id = $1",
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BrokerError::new(format!("Job not found: {id}")));
        }
        Ok(())
    }

    async fn fail(&self, id: JobId, reason: &str) -> Result<FailureOutcome, BrokerError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {JOB_COLUMNS} FROM queue_jobs WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| BrokerError::new(format!("Job not found: {id}")))?;

        let mut job = Self::row_to_job(row)?;
        let outcome = job.next_failure(reason, Utc::now());
        Self::save_failure(&mut tx, &job).await?;

        tx.commit().await?;
        Ok(outcome)
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.pool.close().await;
        Ok(())
    }
}
