//! Per-account login throttle.
//!
//! A pure state machine over [`SecurityState`]. It never stores anything
//! itself: the account repository applies its transitions atomically, so
//! several server instances sharing one store agree on the lock.
//!
//! ```text
//!   Open ──(failure, attempts reach threshold)──▶ Locked
//!   Locked ──(locked_until passes)──▶ treated as Open on next attempt
//!   any ──(success)──▶ Open with attempts = 0
//! ```

use chrono::{DateTime, Duration, Utc};
use tidings_core::models::account::SecurityState;

use crate::config::AuthConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleState {
    Open,
    Locked { until: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy)]
pub struct LoginThrottle {
    threshold: u32,
    lock_duration: Duration,
}

impl LoginThrottle {
    pub fn new(threshold: u32, lock_duration: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            lock_duration,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.max_failed_login_attempts, config.lockout_duration())
    }

    /// Current state at `now`. An elapsed lock reads as `Open`.
    pub fn state(&self, security: &SecurityState, now: DateTime<Utc>) -> ThrottleState {
        match security.locked_until {
            Some(until) if until > now => ThrottleState::Locked { until },
            _ => ThrottleState::Open,
        }
    }

    /// State after a failed attempt at `now`.
    ///
    /// The counter keeps running past an expired lock, so the first
    /// failure after a lock elapses locks the account again.
    pub fn on_failure(&self, security: &SecurityState, now: DateTime<Utc>) -> SecurityState {
        let failed_attempts = security.failed_attempts.saturating_add(1);
        let locked_until = if failed_attempts >= self.threshold {
            Some(now + self.lock_duration)
        } else {
            None
        };
        SecurityState {
            failed_attempts,
            locked_until,
            password_epoch: security.password_epoch,
        }
    }

    /// Whether a successful login has anything to reset.
    pub fn needs_reset(&self, security: &SecurityState) -> bool {
        security.failed_attempts > 0 || security.locked_until.is_some()
    }
}

impl Default for LoginThrottle {
    fn default() -> Self {
        Self::from_config(&AuthConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 14, 8, 30, 0).unwrap()
    }

    #[test]
    fn locks_on_reaching_threshold() {
        let throttle = LoginThrottle::default();
        let mut state = SecurityState::default();

        for attempt in 1..=4 {
            state = throttle.on_failure(&state, now());
            assert_eq!(state.failed_attempts, attempt);
            assert_eq!(throttle.state(&state, now()), ThrottleState::Open);
        }

        state = throttle.on_failure(&state, now());
        assert_eq!(state.failed_attempts, 5);
        assert_eq!(
            throttle.state(&state, now()),
            ThrottleState::Locked {
                until: now() + Duration::minutes(30)
            }
        );
    }

    #[test]
    fn lock_expires_lazily() {
        let throttle = LoginThrottle::default();
        let state = SecurityState {
            failed_attempts: 5,
            locked_until: Some(now()),
            password_epoch: 0,
        };

        assert!(matches!(
            throttle.state(&state, now() - Duration::seconds(1)),
            ThrottleState::Locked { .. }
        ));
        assert_eq!(throttle.state(&state, now()), ThrottleState::Open);
    }

    #[test]
    fn failure_after_expired_lock_relocks() {
        let throttle = LoginThrottle::default();
        let expired = SecurityState {
            failed_attempts: 5,
            locked_until: Some(now() - Duration::minutes(1)),
            password_epoch: 2,
        };

        let next = throttle.on_failure(&expired, now());
        assert_eq!(next.failed_attempts, 6);
        assert_eq!(next.locked_until, Some(now() + Duration::minutes(30)));
        assert_eq!(next.password_epoch, 2);
    }

    #[test]
    fn reset_only_when_dirty() {
        let throttle = LoginThrottle::default();
        assert!(!throttle.needs_reset(&SecurityState::default()));
        assert!(throttle.needs_reset(&SecurityState {
            failed_attempts: 1,
            ..Default::default()
        }));
        assert!(throttle.needs_reset(&SecurityState {
            locked_until: Some(now()),
            ..Default::default()
        }));
    }

    #[test]
    fn custom_threshold() {
        let throttle = LoginThrottle::new(2, Duration::minutes(5));
        let state = throttle.on_failure(&SecurityState::default(), now());
        assert_eq!(throttle.state(&state, now()), ThrottleState::Open);
        let state = throttle.on_failure(&state, now());
        assert!(matches!(throttle.state(&state, now()), ThrottleState::Locked { .. }));
    }
}
