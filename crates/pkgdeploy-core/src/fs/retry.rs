//! Bounded retry around fallible project operations.

use std::fmt;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::DeployError;
use crate::project::ProjectContext;

/// Fixed-delay retry bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(150),
        }
    }
}

impl RetryPolicy {
    /// Same bound, no waiting between attempts.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            delay: Duration::ZERO,
        }
    }
}

/// Run `action` until it succeeds or the policy's attempts are used up.
///
/// The error of the last attempt is returned; earlier ones are logged.
pub fn attempt<T, E, F>(policy: &RetryPolicy, what: &str, mut action: F) -> Result<T, E>
where
    E: fmt::Display,
    F: FnMut() -> Result<T, E>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match action() {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", what, attempt);
                }
                return Ok(value);
            }
            Err(e) => {
                if attempt >= attempts {
                    return Err(e);
                }
                warn!("{} attempt {} failed: {}, retrying...", what, attempt, e);
                if !policy.delay.is_zero() {
                    thread::sleep(policy.delay);
                }
            }
        }
    }
}

/// Retry `action` and, if every attempt fails, record the final error as
/// recoverable instead of returning it. Returns whether the action succeeded.
pub fn perform_safe<F>(
    policy: &RetryPolicy,
    what: &str,
    context: &dyn ProjectContext,
    recovered: &mut Vec<DeployError>,
    action: F,
) -> bool
where
    F: FnMut() -> Result<(), DeployError>,
{
    match attempt(policy, what, action) {
        Ok(()) => true,
        Err(e) => {
            crate::deploy::recover(context, recovered, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{BatchContext, MessageLevel};

    #[test]
    fn stops_at_first_success() {
        let mut calls = 0;
        let result: Result<u32, String> = attempt(&RetryPolicy::immediate(3), "probe", || {
            calls += 1;
            if calls < 2 { Err("busy".to_string()) } else { Ok(calls) }
        });
        assert_eq!(result, Ok(2));
        assert_eq!(calls, 2);
    }

    #[test]
    fn returns_last_error_after_bound() {
        let mut calls = 0;
        let result: Result<(), String> = attempt(&RetryPolicy::immediate(3), "probe", || {
            calls += 1;
            Err(format!("failure {calls}"))
        });
        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(calls, 3);
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        let mut calls = 0;
        let _: Result<(), &str> = attempt(&RetryPolicy::immediate(0), "probe", || {
            calls += 1;
            Err("no")
        });
        assert_eq!(calls, 1);
    }

    #[test]
    fn perform_safe_swallows_final_error() {
        let context = BatchContext::default();
        let mut recovered = Vec::new();
        let mut calls = 0;

        let ok = perform_safe(
            &RetryPolicy::immediate(3),
            "Delete lib",
            &context,
            &mut recovered,
            || {
                calls += 1;
                Err(DeployError::io(
                    "lib",
                    std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked"),
                ))
            },
        );

        assert!(!ok);
        assert_eq!(calls, 3);
        assert_eq!(recovered.len(), 1);
        assert_eq!(context.messages_at(MessageLevel::Warning).len(), 1);
    }
}
