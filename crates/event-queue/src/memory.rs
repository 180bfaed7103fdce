use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::broker::{Broker, BrokerError};
use crate::job::{FailureOutcome, Job, JobId, JobState, LEASE_EXPIRED, NewJob};

#[derive(Default)]
struct State {
    jobs: Vec<Job>,
    batches: Vec<Vec<JobId>>,
    closed: bool,
    fail_on_add: Option<String>,
    fail_on_close: Option<String>,
}

/// In-memory broker for tests and single-process use.
///
/// Provides the same claim, lease and retry semantics as the PostgreSQL
/// broker. Failures can be injected for `add`/`add_bulk` and `close`.
#[derive(Clone)]
pub struct InMemoryBroker {
    state: Arc<RwLock<State>>,
    lease: chrono::Duration,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self {
            state: Arc::default(),
            lease: chrono::Duration::seconds(60),
        }
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how long a claimed job stays leased to its consumer.
    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.lease = chrono::Duration::milliseconds(timeout.as_millis() as i64);
        self
    }

    /// Makes every subsequent add fail with `message`. `None` clears it.
    pub async fn set_fail_on_add(&self, message: Option<&str>) {
        self.state.write().await.fail_on_add = message.map(str::to_string);
    }

    /// Makes the next close fail with `message`. `None` clears it.
    pub async fn set_fail_on_close(&self, message: Option<&str>) {
        self.state.write().await.fail_on_close = message.map(str::to_string);
    }

    /// Returns a snapshot of every job, in insertion order.
    pub async fn jobs(&self) -> Vec<Job> {
        self.state.read().await.jobs.clone()
    }

    /// Returns the job ids of each `add_bulk` call.
    pub async fn batches(&self) -> Vec<Vec<JobId>> {
        self.state.read().await.batches.clone()
    }

    pub async fn job_count(&self) -> usize {
        self.state.read().await.jobs.len()
    }

    pub async fn job(&self, id: JobId) -> Option<Job> {
        self.state
            .read()
            .await
            .jobs
            .iter()
            .find(|j| j.id == id)
            .cloned()
    }

    pub async fn is_closed(&self) -> bool {
        self.state.read().await.closed
    }

    fn check_writable(state: &State) -> Result<(), BrokerError> {
        if state.closed {
            return Err(BrokerError::new("Connection is closed"));
        }
        if let Some(message) = &state.fail_on_add {
            return Err(BrokerError::new(message.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn add(&self, job: NewJob) -> Result<JobId, BrokerError> {
        let mut state = self.state.write().await;
        Self::check_writable(&state)?;

        let job = Job::from_new(job, Utc::now());
        let id = job.id;
        state.jobs.push(job);
        Ok(id)
    }

    async fn add_bulk(&self, jobs: Vec<NewJob>) -> Result<Vec<JobId>, BrokerError> {
        let mut state = self.state.write().await;
        Self::check_writable(&state)?;

        let now = Utc::now();
        let jobs: Vec<Job> = jobs.into_iter().map(|j| Job::from_new(j, now)).collect();
        let ids: Vec<JobId> = jobs.iter().map(|j| j.id).collect();
        state.jobs.extend(jobs);
        state.batches.push(ids.clone());
        Ok(ids)
    }

    async fn fetch_next(&self) -> Result<Option<Job>, BrokerError> {
        let mut state = self.state.write().await;
        if state.closed {
            return Err(BrokerError::new("Connection is closed"));
        }

        let now = Utc::now();
        for job in state.jobs.iter_mut().filter(|j| j.lease_expired(now)) {
            let outcome = job.next_failure(LEASE_EXPIRED, now);
            tracing::warn!(job_id = %job.id, job = %job.name, ?outcome, "claim lease expired");
        }

        let lease = self.lease;
        let next = state
            .jobs
            .iter_mut()
            .filter(|j| j.state == JobState::Waiting && j.available_at <= now)
            .min_by_key(|j| j.available_at);

        Ok(next.map(|job| {
            job.claim(now, lease);
            job.clone()
        }))
    }

    async fn complete(&self, id: JobId) -> Result<(), BrokerError> {
        let mut state = self.state.write().await;
        let job = state
            .jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| BrokerError::new(format!("Job not found: {id}")))?;
        job.complete();
        Ok(())
    }

    async fn fail(&self, id: JobId, reason: &str) -> Result<FailureOutcome, BrokerError> {
        let mut state = self.state.write().await;
        let job = state
            .jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| BrokerError::new(format!("Job not found: {id}")))?;
        Ok(job.next_failure(reason, Utc::now()))
    }

    async fn close(&self) -> Result<(), BrokerError> {
        let mut state = self.state.write().await;
        if let Some(message) = state.fail_on_close.take() {
            return Err(BrokerError::new(message));
        }
        state.closed = true;
        Ok(())
    }
}
