//! Property tests for the retry state machine.
//!
//! Uses proptest to verify:
//! 1. Backoff delays are non-decreasing for a given record
//! 2. No single delay ever exceeds the configured cap
//! 3. The attempt count never exceeds the budget, and equals
//!    failures + 1 when the operation eventually succeeds

use proptest::prelude::*;
use std::time::Duration;

use cinelab_core::data::retry::{run_with_retry, Attempt, RetryFailure, RetryPolicy};
use cinelab_core::data::TransientKind;

fn arb_policy() -> impl Strategy<Value = RetryPolicy> {
    (1u32..=8, 1u64..=2000, 1u64..=20_000).prop_map(|(max_attempts, base_ms, extra_ms)| {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(base_ms),
            // The cap is always at or above the base delay.
            max_delay: Duration::from_millis(base_ms + extra_ms),
        }
    })
}

proptest! {
    /// Delays never decrease and never exceed the cap.
    #[test]
    fn backoff_is_monotone_and_capped(policy in arb_policy(), failures in 0u32..20) {
        let mut remaining = failures;
        let mut sleeps: Vec<Duration> = Vec::new();

        let outcome = run_with_retry(&policy, |d| sleeps.push(d), || {
            if remaining == 0 {
                Attempt::<u32, ()>::Success(0)
            } else {
                remaining -= 1;
                Attempt::Transient(TransientKind::ServerError)
            }
        });

        for pair in sleeps.windows(2) {
            prop_assert!(pair[0] <= pair[1]);
        }
        for delay in &sleeps {
            prop_assert!(*delay <= policy.max_delay);
        }
        prop_assert!(outcome.attempts <= policy.max_attempts);
    }

    /// A failure streak shorter than the budget succeeds with
    /// attempts = failures + 1; at or beyond the budget it exhausts
    /// after exactly max_attempts.
    #[test]
    fn attempt_accounting(policy in arb_policy(), failures in 0u32..20) {
        let mut remaining = failures;

        let outcome = run_with_retry(&policy, |_| {}, || {
            if remaining == 0 {
                Attempt::<u32, ()>::Success(0)
            } else {
                remaining -= 1;
                Attempt::Transient(TransientKind::RateLimited)
            }
        });

        if failures < policy.max_attempts {
            prop_assert!(outcome.result.is_ok());
            prop_assert_eq!(outcome.attempts, failures + 1);
        } else {
            prop_assert!(matches!(outcome.result, Err(RetryFailure::Exhausted { .. })), "expected Exhausted");
            prop_assert_eq!(outcome.attempts, policy.max_attempts);
        }
    }
}
