//! Explicit retry state machine for transient upstream failures.
//!
//! The schedule is pure: it hands out delays and tracks the attempt budget,
//! but never sleeps or touches the network. `run_with_retry` drives an
//! operation through the schedule, taking the sleep function as a closure so
//! tests can substitute a recording fake clock and a scripted transport.

use super::provider::TransientKind;
use std::time::Duration;

/// Retry budget and backoff shape for one record fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub base_delay: Duration,
    /// Upper bound on any single backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// Per-request retry state: attempt counter, cumulative delay, last failure.
///
/// Discarded after success or exhaustion — never shared between records.
#[derive(Debug)]
pub struct RetrySchedule {
    policy: RetryPolicy,
    attempts: u32,
    total_delay: Duration,
    last_kind: Option<TransientKind>,
}

impl RetrySchedule {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            total_delay: Duration::ZERO,
            last_kind: None,
        }
    }

    /// Attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Total backoff delay handed out so far.
    pub fn total_delay(&self) -> Duration {
        self.total_delay
    }

    /// Kind of the most recent transient failure.
    pub fn last_kind(&self) -> Option<TransientKind> {
        self.last_kind
    }

    /// Consume one attempt from the budget. False once the budget is spent.
    pub fn begin_attempt(&mut self) -> bool {
        if self.attempts >= self.policy.max_attempts {
            return false;
        }
        self.attempts += 1;
        true
    }

    /// Record a transient failure and return the delay to wait before the
    /// next attempt, or None when no attempts remain.
    ///
    /// Delays double from `base_delay` and never exceed `max_delay`, so the
    /// sequence is non-decreasing.
    pub fn backoff(&mut self, kind: TransientKind) -> Option<Duration> {
        self.last_kind = Some(kind);
        if self.attempts >= self.policy.max_attempts {
            return None;
        }
        let exp = self.attempts.saturating_sub(1).min(16);
        let delay = self
            .policy
            .base_delay
            .saturating_mul(2u32.pow(exp))
            .min(self.policy.max_delay);
        self.total_delay += delay;
        Some(delay)
    }
}

/// Outcome of a single attempt, as classified by the transport.
#[derive(Debug)]
pub enum Attempt<T, E> {
    Success(T),
    /// Retriable failure (rate limit, server error, timeout, connect).
    Transient(TransientKind),
    /// Non-retriable failure; surfaced immediately.
    Fatal(E),
}

/// Terminal failure of a retried operation.
#[derive(Debug)]
pub enum RetryFailure<E> {
    /// The attempt budget was spent on transient failures.
    Exhausted { kind: TransientKind },
    Fatal(E),
}

/// Result of driving an operation through the retry schedule.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, RetryFailure<E>>,
    /// Attempts actually made (failures + 1 on success).
    pub attempts: u32,
    pub total_delay: Duration,
}

/// Drive `op` through the retry schedule, sleeping via `sleep` between
/// attempts. No further attempts are made once the budget is exhausted or a
/// fatal outcome is observed.
pub fn run_with_retry<T, E>(
    policy: &RetryPolicy,
    mut sleep: impl FnMut(Duration),
    mut op: impl FnMut() -> Attempt<T, E>,
) -> RetryOutcome<T, E> {
    let mut schedule = RetrySchedule::new(*policy);
    loop {
        if !schedule.begin_attempt() {
            return RetryOutcome {
                result: Err(RetryFailure::Exhausted {
                    kind: schedule.last_kind().unwrap_or(TransientKind::Connect),
                }),
                attempts: schedule.attempts(),
                total_delay: schedule.total_delay(),
            };
        }
        match op() {
            Attempt::Success(value) => {
                return RetryOutcome {
                    result: Ok(value),
                    attempts: schedule.attempts(),
                    total_delay: schedule.total_delay(),
                };
            }
            Attempt::Fatal(err) => {
                return RetryOutcome {
                    result: Err(RetryFailure::Fatal(err)),
                    attempts: schedule.attempts(),
                    total_delay: schedule.total_delay(),
                };
            }
            Attempt::Transient(kind) => match schedule.backoff(kind) {
                Some(delay) => sleep(delay),
                None => {
                    return RetryOutcome {
                        result: Err(RetryFailure::Exhausted { kind }),
                        attempts: schedule.attempts(),
                        total_delay: schedule.total_delay(),
                    };
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn policy(max_attempts: u32, base_ms: u64, max_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(max_ms),
        }
    }

    fn drive(
        policy: &RetryPolicy,
        script: Vec<Attempt<u32, &'static str>>,
    ) -> (RetryOutcome<u32, &'static str>, Vec<Duration>) {
        let mut script: VecDeque<_> = script.into();
        let mut sleeps = Vec::new();
        let outcome = run_with_retry(
            policy,
            |d| sleeps.push(d),
            || script.pop_front().expect("script exhausted"),
        );
        (outcome, sleeps)
    }

    #[test]
    fn succeeds_on_first_attempt() {
        let (outcome, sleeps) = drive(&policy(4, 500, 8000), vec![Attempt::Success(7)]);
        assert!(matches!(outcome.result, Ok(7)));
        assert_eq!(outcome.attempts, 1);
        assert!(sleeps.is_empty());
    }

    #[test]
    fn attempts_equal_failures_plus_one() {
        let (outcome, sleeps) = drive(
            &policy(4, 500, 8000),
            vec![
                Attempt::Transient(TransientKind::ServerError),
                Attempt::Transient(TransientKind::RateLimited),
                Attempt::Success(1),
            ],
        );
        assert!(matches!(outcome.result, Ok(1)));
        assert_eq!(outcome.attempts, 3);
        assert_eq!(
            sleeps,
            vec![Duration::from_millis(500), Duration::from_millis(1000)]
        );
    }

    #[test]
    fn exhausts_at_attempt_budget() {
        let (outcome, sleeps) = drive(
            &policy(3, 500, 8000),
            vec![
                Attempt::Transient(TransientKind::ServerError),
                Attempt::Transient(TransientKind::ServerError),
                Attempt::Transient(TransientKind::ServerError),
            ],
        );
        assert!(matches!(
            outcome.result,
            Err(RetryFailure::Exhausted {
                kind: TransientKind::ServerError
            })
        ));
        assert_eq!(outcome.attempts, 3);
        // No sleep after the final failed attempt.
        assert_eq!(sleeps.len(), 2);
    }

    #[test]
    fn fatal_stops_immediately() {
        let (outcome, sleeps) = drive(
            &policy(4, 500, 8000),
            vec![
                Attempt::Transient(TransientKind::Timeout),
                Attempt::Fatal("denied"),
            ],
        );
        assert!(matches!(
            outcome.result,
            Err(RetryFailure::Fatal("denied"))
        ));
        assert_eq!(outcome.attempts, 2);
        assert_eq!(sleeps.len(), 1);
    }

    #[test]
    fn backoff_is_capped() {
        let (outcome, sleeps) = drive(
            &policy(5, 500, 1000),
            vec![
                Attempt::Transient(TransientKind::RateLimited),
                Attempt::Transient(TransientKind::RateLimited),
                Attempt::Transient(TransientKind::RateLimited),
                Attempt::Transient(TransientKind::RateLimited),
                Attempt::Success(0),
            ],
        );
        assert!(outcome.result.is_ok());
        assert_eq!(
            sleeps,
            vec![
                Duration::from_millis(500),
                Duration::from_millis(1000),
                Duration::from_millis(1000),
                Duration::from_millis(1000),
            ]
        );
    }
}
