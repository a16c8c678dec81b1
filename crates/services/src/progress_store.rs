//! Keyed store of progress aggregates.
//!
//! Mutations for one (user, sport) key run one at a time inside this process
//! (a per-key async mutex). Writes are also version-checked against the
//! repository, so a writer in another process shows up as a conflict and the
//! event is re-applied on a fresh read, up to a bounded number of attempts.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use serde::Serialize;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, error, warn};

use sporty_core::engine::apply_event;
use sporty_core::model::{LessonId, Progress, ProgressKey, QuizResult};
use sporty_core::{Calendar, Clock, ProgressEvent};
use storage::repository::{ProgressRepository, StorageError};

use crate::config::{DEFAULT_MAX_SAVE_ATTEMPTS, DEFAULT_RETRY_BACKOFF, EngineConfig};
use crate::error::ProgressStoreError;

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Per-key mutexes; an entry lives only while some task holds or awaits it.
type KeyLocks = Arc<DashMap<ProgressKey, Arc<Mutex<()>>>>;

//
// ─── CHANGE NOTIFICATIONS ──────────────────────────────────────────────────────
//

/// Published after every persisted change to an aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressChanged {
    pub key: ProgressKey,
    pub progress: Progress,
    pub cause: ProgressEvent,
}

//
// ─── RETRY POLICY ──────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_SAVE_ATTEMPTS,
            backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Delay before attempt `attempt + 1`: the base doubled per failed
    /// attempt (capped at 32x) plus up to one base of random jitter.
    fn delay_after(&self, attempt: u32) -> Duration {
        if self.backoff.is_zero() {
            return Duration::ZERO;
        }
        let factor = 1_u32 << attempt.saturating_sub(1).min(5);
        let base = self.backoff.saturating_mul(factor);
        let ceiling = u64::try_from(self.backoff.as_micros()).unwrap_or(u64::MAX);
        let jitter = Duration::from_micros(rand::rng().random_range(0..=ceiling));
        base.saturating_add(jitter)
    }
}

//
// ─── STORE ─────────────────────────────────────────────────────────────────────
//

pub struct ProgressStore {
    repo: Arc<dyn ProgressRepository>,
    clock: Clock,
    calendar: Calendar,
    retry: RetryPolicy,
    locks: KeyLocks,
    changes: broadcast::Sender<ProgressChanged>,
}

impl ProgressStore {
    #[must_use]
    pub fn new(repo: Arc<dyn ProgressRepository>, clock: Clock) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            repo,
            clock,
            calendar: Calendar::utc(),
            retry: RetryPolicy::default(),
            locks: Arc::new(DashMap::new()),
            changes,
        }
    }

    /// Build a store using the calendar and retry settings of `config`.
    #[must_use]
    pub fn from_config(
        repo: Arc<dyn ProgressRepository>,
        clock: Clock,
        config: &EngineConfig,
    ) -> Self {
        Self::new(repo, clock)
            .with_calendar(config.calendar)
            .with_retry(RetryPolicy::new(
                config.max_save_attempts,
                config.retry_backoff,
            ))
    }

    #[must_use]
    pub fn with_calendar(mut self, calendar: Calendar) -> Self {
        self.calendar = calendar;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn calendar(&self) -> Calendar {
        self.calendar
    }

    /// Receive every change persisted from now on.
    ///
    /// A receiver that falls more than the channel capacity behind gets
    /// `RecvError::Lagged` and should re-read through [`ProgressStore::get`].
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressChanged> {
        self.changes.subscribe()
    }

    /// Current aggregate for `key`, or a freshly seeded one if none is stored.
    ///
    /// # Errors
    ///
    /// Returns `ProgressStoreError::Storage` if the repository read fails.
    pub async fn get(&self, key: &ProgressKey) -> Result<Progress, ProgressStoreError> {
        match self.repo.load_progress(key).await? {
            Some(stored) => Ok(stored.value),
            None => Ok(Progress::new(key.clone())),
        }
    }

    /// Apply `event` to the aggregate for `key`, persist it and return it.
    ///
    /// Events for the same key are applied one at a time. An event that
    /// leaves the aggregate unchanged (a repeated completion) is not written
    /// and publishes nothing.
    ///
    /// # Errors
    ///
    /// Returns `ProgressStoreError::RetriesExhausted` when every attempt hit a
    /// conflict or connection failure, and `ProgressStoreError::Storage` for
    /// any other repository failure.
    pub async fn apply(
        &self,
        key: &ProgressKey,
        event: ProgressEvent,
    ) -> Result<Progress, ProgressStoreError> {
        let lock = self.lock_for(key);
        let outcome = {
            let _guard = lock.lock().await;
            let outcome = self.apply_with_retry(key, &event).await;
            // Sent under the key lock so one key's changes arrive in version order.
            if let Ok((progress, true)) = &outcome {
                self.publish(key, progress, event);
            }
            outcome
        };
        drop(lock);
        self.release_lock(key);

        outcome.map(|(progress, _)| progress)
    }

    /// Mark `lesson_id` complete for `key`.
    ///
    /// `module_position` is the lesson's module index within its sport, when
    /// known; it only ever moves `current_module` forward.
    ///
    /// # Errors
    ///
    /// See [`ProgressStore::apply`].
    pub async fn complete_lesson(
        &self,
        key: &ProgressKey,
        lesson_id: LessonId,
        xp_reward: u32,
        module_position: Option<u32>,
    ) -> Result<Progress, ProgressStoreError> {
        let event = ProgressEvent::LessonCompleted {
            lesson_id,
            xp_reward,
            module_position,
        };
        self.apply(key, event).await
    }

    /// Append a quiz result to the aggregate for `key`.
    ///
    /// # Errors
    ///
    /// See [`ProgressStore::apply`].
    pub async fn record_quiz_result(
        &self,
        key: &ProgressKey,
        result: QuizResult,
    ) -> Result<Progress, ProgressStoreError> {
        self.apply(key, ProgressEvent::QuizRecorded(result)).await
    }

    fn publish(&self, key: &ProgressKey, progress: &Progress, cause: ProgressEvent) {
        // No subscribers is not an error.
        let _ = self.changes.send(ProgressChanged {
            key: key.clone(),
            progress: progress.clone(),
            cause,
        });
    }

    fn lock_for(&self, key: &ProgressKey) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn release_lock(&self, key: &ProgressKey) {
        self.locks.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    async fn apply_with_retry(
        &self,
        key: &ProgressKey,
        event: &ProgressEvent,
    ) -> Result<(Progress, bool), ProgressStoreError> {
        let max_attempts = self.retry.max_attempts;
        let mut attempt = 0_u32;
        loop {
            attempt += 1;
            match self.try_apply(key, event).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    warn!(
                        user_id = %key.user_id(),
                        sport_id = %key.sport_id(),
                        attempt,
                        error = %err,
                        "progress write failed, retrying"
                    );
                    let delay = self.retry.delay_after(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(err) if err.is_retryable() => {
                    error!(
                        user_id = %key.user_id(),
                        sport_id = %key.sport_id(),
                        attempts = attempt,
                        error = %err,
                        "progress write retries exhausted"
                    );
                    return Err(ProgressStoreError::RetriesExhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// One read-compute-write round. Returns the new aggregate and whether it
    /// was written.
    async fn try_apply(
        &self,
        key: &ProgressKey,
        event: &ProgressEvent,
    ) -> Result<(Progress, bool), StorageError> {
        let stored = self.repo.load_progress(key).await?;
        let (current, expected) = match stored {
            Some(v) => (v.value, Some(v.version)),
            None => (Progress::new(key.clone()), None),
        };

        let next = apply_event(&current, event, self.clock.now(), &self.calendar);
        if next == current {
            debug!(%key, kind = event.kind(), "event left progress unchanged");
            return Ok((current, false));
        }

        let version = self.repo.save_progress(&next, expected).await?;
        debug!(
            %key,
            kind = event.kind(),
            %version,
            total_xp = next.total_xp(),
            streak = next.streak(),
            "applied progress event"
        );
        Ok((next, true))
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks.len()
    }
}
