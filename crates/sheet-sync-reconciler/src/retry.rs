//! Bounded retries against the spreadsheet backend.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::error::SyncFailure;
use crate::ports::SheetSyncClient;
use crate::types::{SyncTask, TaskResult};

/// Default number of attempts per task.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay between attempts.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `base * attempt`.
    Linear { base: Duration },
    /// `base * 2^(attempt - 1)`, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Linear {
            base: DEFAULT_BASE_DELAY,
        }
    }
}

impl Backoff {
    /// Delay after failed attempt number `attempt` (1-based). Zero for 0.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        match *self {
            Backoff::Linear { base } => base.saturating_mul(attempt),
            Backoff::Exponential { base, max } => {
                let base_ms = base.as_millis() as u64;
                let max_ms = max.as_millis() as u64;
                let multiplier = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
                Duration::from_millis(base_ms.saturating_mul(multiplier).min(max_ms))
            }
        }
    }
}

/// How many attempts to make and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::default(),
        }
    }
}

/// Result of [`retry`] plus the number of attempts made.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

/// Call `op` until it succeeds or `policy.max_attempts` is reached.
///
/// `op` receives the 1-based attempt number. The wait after attempt `n` is
/// `policy.backoff.delay_for(n)`; nothing is awaited after the final attempt.
/// A policy with `max_attempts == 0` still makes one attempt.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match op(attempt).await {
            Ok(value) => {
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt,
                }
            }
            Err(e) if attempt >= max_attempts => {
                return RetryOutcome {
                    result: Err(e),
                    attempts: attempt,
                }
            }
            Err(e) => {
                let delay = policy.backoff.delay_for(attempt);
                warn!(
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Runs one [`SyncTask`] against the spreadsheet backend.
pub struct RetryExecutor {
    client: Arc<dyn SheetSyncClient>,
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(client: Arc<dyn SheetSyncClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `task`, never returning an error.
    ///
    /// Malformed snapshots fail with zero attempts. Otherwise a task without a
    /// spreadsheet id creates one and a task with an id updates it.
    pub async fn execute(&self, task: &SyncTask) -> TaskResult {
        if let Err(reason) = task.validate() {
            warn!(
                task_id = %task.task_id(),
                event_id = %task.event_id(),
                reason = %reason,
                "Rejecting malformed snapshot"
            );
            return TaskResult::failed(task, 0, SyncFailure::MalformedSnapshot(reason));
        }

        match task.spreadsheet_id() {
            None => self.execute_create(task).await,
            Some(spreadsheet_id) => self.execute_update(task, spreadsheet_id).await,
        }
    }

    async fn execute_create(&self, task: &SyncTask) -> TaskResult {
        let outcome = retry(&self.policy, |attempt| {
            debug!(
                task_id = %task.task_id(),
                event_id = %task.event_id(),
                attempt = attempt,
                rows = task.rows().len(),
                "Creating spreadsheet"
            );
            self.client.create(task.event(), task.rows())
        })
        .await;

        match outcome.result {
            Ok(sheet) => {
                info!(
                    task_id = %task.task_id(),
                    event_id = %task.event_id(),
                    spreadsheet_id = %sheet.spreadsheet_id,
                    attempts = outcome.attempts,
                    "Spreadsheet created"
                );
                TaskResult::succeeded(task, outcome.attempts, Some(sheet))
            }
            Err(e) => {
                error!(
                    task_id = %task.task_id(),
                    event_id = %task.event_id(),
                    attempts = outcome.attempts,
                    error = %e,
                    "Spreadsheet creation exhausted retries"
                );
                TaskResult::failed(
                    task,
                    outcome.attempts,
                    SyncFailure::Exhausted {
                        attempts: outcome.attempts,
                        last_error: e.to_string(),
                    },
                )
            }
        }
    }

    async fn execute_update(&self, task: &SyncTask, spreadsheet_id: &str) -> TaskResult {
        let outcome = retry(&self.policy, |attempt| {
            debug!(
                task_id = %task.task_id(),
                spreadsheet_id = spreadsheet_id,
                attempt = attempt,
                "Updating spreadsheet"
            );
            self.client.update(spreadsheet_id, task.event(), task.rows())
        })
        .await;

        match outcome.result {
            Ok(()) => {
                debug!(
                    task_id = %task.task_id(),
                    event_id = %task.event_id(),
                    update_type = %task.update_type(),
                    attempts = outcome.attempts,
                    "Spreadsheet updated"
                );
                TaskResult::succeeded(task, outcome.attempts, None)
            }
            Err(e) => {
                error!(
                    task_id = %task.task_id(),
                    event_id = %task.event_id(),
                    attempts = outcome.attempts,
                    error = %e,
                    "Spreadsheet update exhausted retries"
                );
                TaskResult::failed(
                    task,
                    outcome.attempts,
                    SyncFailure::Exhausted {
                        attempts: outcome.attempts,
                        last_error: e.to_string(),
                    },
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::RecordingSheetClient;
    use crate::types::{EventView, RegistrationView, TaskKind, UpdateType};
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff: Backoff::Linear {
                base: Duration::from_millis(100),
            },
        }
    }

    fn create_task() -> SyncTask {
        SyncTask::create(
            EventView::new("evt-1", "Hack Night"),
            vec![RegistrationView::new("reg-1", "evt-1", "Asha", "asha@campus.edu")],
            UpdateType::Registration,
            Utc::now(),
        )
    }

    #[test]
    fn linear_backoff_grows_by_base() {
        let backoff = Backoff::Linear {
            base: Duration::from_secs(1),
        };
        assert_eq!(backoff.delay_for(0), Duration::ZERO);
        assert_eq!(backoff.delay_for(1), Duration::from_secs(1));
        assert_eq!(backoff.delay_for(2), Duration::from_secs(2));
        assert_eq!(backoff.delay_for(3), Duration::from_secs(3));
    }

    #[test]
    fn exponential_backoff_caps_and_grows() {
        let backoff = Backoff::Exponential {
            base: Duration::from_secs(2),
            max: Duration::from_secs(10),
        };
        assert_eq!(backoff.delay_for(1), Duration::from_secs(2));
        assert_eq!(backoff.delay_for(2), Duration::from_secs(4));
        assert_eq!(backoff.delay_for(3), Duration::from_secs(8));
        assert_eq!(backoff.delay_for(4), Duration::from_secs(10));
        assert_eq!(backoff.delay_for(u32::MAX), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_waits_between_attempts_but_not_after_last() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let outcome: RetryOutcome<(), String> = retry(&fast_policy(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("boom".to_string()) }
        })
        .await;

        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.result.unwrap_err(), "boom");
        // 100ms after attempt 1, 200ms after attempt 2, nothing after attempt 3
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(300), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(400), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn retry_stops_at_first_success() {
        let outcome: RetryOutcome<u32, String> = retry(&fast_policy(), |attempt| async move {
            if attempt < 2 {
                Err("transient".to_string())
            } else {
                Ok(attempt)
            }
        })
        .await;

        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.result.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_max_attempts_still_tries_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..fast_policy()
        };
        let outcome: RetryOutcome<(), String> =
            retry(&policy, |_| async { Err("down".to_string()) }).await;
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_client_gets_exactly_three_calls() {
        let client = Arc::new(RecordingSheetClient::new());
        client.set_always_fail(true);
        let executor = RetryExecutor::new(client.clone(), fast_policy());

        let result = executor.execute(&create_task()).await;

        assert!(!result.success);
        assert_eq!(result.attempts, 3);
        assert_eq!(client.create_count(), 3);
        match result.error {
            Some(SyncFailure::Exhausted {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("scripted failure"));
            }
            other => panic!("expected exhausted failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_recovers_within_budget() {
        let client = Arc::new(RecordingSheetClient::new());
        client.fail_next(2);
        let executor = RetryExecutor::new(client.clone(), fast_policy());

        let result = executor.execute(&create_task()).await;

        assert!(result.success);
        assert_eq!(result.attempts, 3);
        assert_eq!(result.kind, TaskKind::Create);
        assert!(result.sheet.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_snapshot_fails_fast() {
        let client = Arc::new(RecordingSheetClient::new());
        let executor = RetryExecutor::new(client.clone(), fast_policy());
        let task = SyncTask::create(
            EventView::new("evt-1", ""),
            Vec::new(),
            UpdateType::Manual,
            Utc::now(),
        );

        let result = executor.execute(&task).await;

        assert_eq!(result.attempts, 0);
        assert!(client.calls().is_empty());
        assert_eq!(
            result.error.map(|e| e.to_string()),
            Some("malformed snapshot: event title is empty".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn task_with_spreadsheet_id_updates() {
        let client = Arc::new(RecordingSheetClient::new());
        let executor = RetryExecutor::new(client.clone(), fast_policy());

        let created = executor.execute(&create_task()).await;
        let sheet = created.sheet.unwrap();
        let update = create_task().bound_to(sheet.spreadsheet_id.clone());

        let result = executor.execute(&update).await;

        assert!(result.success);
        assert_eq!(result.kind, TaskKind::Update);
        assert_eq!(client.update_count(), 1);
    }
}
