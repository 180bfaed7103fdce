//! Job records exchanged with a [`Broker`](crate::Broker).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::QueueConfig;

/// Unique identifier for a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Delay strategy between delivery attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Backoff {
    /// The same delay, in milliseconds, before every retry.
    Fixed { delay: u64 },
}

impl Backoff {
    pub fn delay_for(&self, _attempt: u32) -> Duration {
        match self {
            Backoff::Fixed { delay } => Duration::milliseconds(*delay as i64),
        }
    }
}

/// Delivery options attached to every job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    /// Total delivery attempts, including the first.
    pub attempts: u32,
    pub backoff: Backoff,
    /// Milliseconds to hold a new job before its first attempt.
    #[serde(default)]
    pub delay: u64,
}

impl JobOptions {
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            attempts: config.attempts,
            backoff: Backoff::Fixed {
                delay: config.delay_ms,
            },
            delay: 0,
        }
    }
}

impl Default for JobOptions {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}

/// A job as submitted by a producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJob {
    pub name: String,
    pub data: serde_json::Value,
    pub options: JobOptions,
}

impl NewJob {
    pub fn new(name: impl Into<String>, data: serde_json::Value, options: JobOptions) -> Self {
        Self {
            name: name.into(),
            data,
            options,
        }
    }
}

/// Lifecycle of a job inside the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Waiting,
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Active => "active",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(JobState::Waiting),
            "active" => Ok(JobState::Active),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            other => Err(format!("unknown job state: {other}")),
        }
    }
}

/// A job held by the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub data: serde_json::Value,
    pub options: JobOptions,
    pub attempts_made: u32,
    pub state: JobState,
    pub available_at: DateTime<Utc>,
    /// End of the current claim lease while the job is active.
    pub locked_until: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Creates a waiting job, available once its initial delay has passed.
    pub fn from_new(new: NewJob, now: DateTime<Utc>) -> Self {
        Self {
            id: JobId::new(),
            name: new.name,
            data: new.data,
            options: new.options,
            attempts_made: 0,
            state: JobState::Waiting,
            available_at: now + Duration::milliseconds(new.options.delay as i64),
            locked_until: None,
            last_error: None,
            created_at: now,
        }
    }

    /// Hands the job to a consumer until `now + lease`.
    pub fn claim(&mut self, now: DateTime<Utc>, lease: Duration) {
        self.state = JobState::Active;
        self.locked_until = Some(now + lease);
    }

    /// Whether the job is active and its consumer let the lease run out.
    pub fn lease_expired(&self, now: DateTime<Utc>) -> bool {
        self.state == JobState::Active && self.locked_until.is_some_and(|until| until <= now)
    }

    pub fn complete(&mut self) {
        self.state = JobState::Completed;
        self.locked_until = None;
    }

    /// Records a failed attempt and decides whether the job is retried.
    ///
    /// `attempts_made` counts the attempt that just failed.
    pub fn next_failure(&mut self, reason: &str, now: DateTime<Utc>) -> FailureOutcome {
        self.attempts_made += 1;
        self.last_error = Some(reason.to_string());
        self.locked_until = None;

        if self.attempts_made < self.options.attempts {
            let retry_at = now + self.options.backoff.delay_for(self.attempts_made);
            self.state = JobState::Waiting;
            self.available_at = retry_at;
            FailureOutcome::Retrying {
                attempt: self.attempts_made,
                retry_at,
            }
        } else {
            self.state = JobState::Failed;
            FailureOutcome::Exhausted {
                attempts: self.attempts_made,
            }
        }
    }
}

/// Failure reason recorded when a claim lease expires unsettled.
pub const LEASE_EXPIRED: &str = "Claim lease expired before the job was settled";

/// What the broker did with a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Rescheduled for another attempt at `retry_at`.
    Retrying {
        attempt: u32,
        retry_at: DateTime<Utc>,
    },
    /// No attempts left; the job is parked as failed.
    Exhausted { attempts: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(attempts: u32, delay: u64) -> Job {
        let options = JobOptions {
            attempts,
            backoff: Backoff::Fixed { delay },
            delay: 0,
        };
        Job::from_new(NewJob::new("ProductStockLow", json!({}), options), Utc::now())
    }

    #[test]
    fn test_options_from_config() {
        let options = JobOptions::from_config(&QueueConfig::default());
        assert_eq!(options.attempts, 3);
        assert_eq!(options.backoff, Backoff::Fixed { delay: 1000 });
        assert_eq!(options.delay, 0);
    }

    #[test]
    fn test_initial_delay_postpones_availability() {
        let now = Utc::now();
        let options = JobOptions {
            delay: 500,
            ..JobOptions::default()
        };
        let job = Job::from_new(NewJob::new("A", json!({}), options), now);
        assert_eq!(job.available_at, now + Duration::milliseconds(500));
    }

    #[test]
    fn test_backoff_serializes_with_type_tag() {
        let value = serde_json::to_value(Backoff::Fixed { delay: 1000 }).unwrap();
        assert_eq!(value, json!({ "type": "fixed", "delay": 1000 }));
    }

    #[test]
    fn test_failure_retries_until_attempts_exhausted() {
        let mut job = job(3, 1000);
        let now = Utc::now();

        let first = job.next_failure("boom", now);
        assert_eq!(
            first,
            FailureOutcome::Retrying {
                attempt: 1,
                retry_at: now + Duration::milliseconds(1000),
            }
        );
        assert_eq!(job.state, JobState::Waiting);

        assert!(matches!(
            job.next_failure("boom", now),
            FailureOutcome::Retrying { attempt: 2, .. }
        ));
        assert_eq!(
            job.next_failure("still boom", now),
            FailureOutcome::Exhausted { attempts: 3 }
        );
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.last_error.as_deref(), Some("still boom"));
    }

    #[test]
    fn test_single_attempt_fails_immediately() {
        let mut job = job(1, 0);
        assert_eq!(
            job.next_failure("nope", Utc::now()),
            FailureOutcome::Exhausted { attempts: 1 }
        );
    }

    #[test]
    fn test_claim_lease_expiry() {
        let mut job = job(3, 0);
        let now = Utc::now();
        job.claim(now, Duration::seconds(30));

        assert_eq!(job.state, JobState::Active);
        assert!(!job.lease_expired(now + Duration::seconds(29)));
        assert!(job.lease_expired(now + Duration::seconds(30)));

        job.next_failure(LEASE_EXPIRED, now + Duration::seconds(30));
        assert_eq!(job.locked_until, None);
        assert!(!job.lease_expired(now + Duration::seconds(60)));
    }

    #[test]
    fn test_completed_job_has_no_lease() {
        let mut job = job(3, 0);
        let now = Utc::now();
        job.claim(now, Duration::zero());
        job.complete();

        assert_eq!(job.state, JobState::Completed);
        assert!(!job.lease_expired(now + Duration::seconds(1)));
    }

    #[test]
    fn test_state_round_trips_through_str() {
        for state in [
            JobState::Waiting,
            JobState::Active,
            JobState::Completed,
            JobState::Failed,
        ] {
            assert_eq!(state.as_str().parse::<JobState>().unwrap(), state);
        }
        assert!("paused".parse::<JobState>().is_err());
    }
}
