use crate::domain::payment::{PaymentRequest, Route};
use crate::error::{PaymentError, Result};
use std::time::Duration;

pub const DEFAULT_ESCALATION_THRESHOLD: u32 = 3;
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_RECONCILE_ATTEMPTS: u32 = 20;
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_millis(100);

/// Retry, escalation and reconciliation knobs of the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// A failed primary attempt escalates to the fallback once the attempt
    /// counter exceeds this value.
    pub escalation_threshold: u32,
    /// Retry delay per attempt (linear backoff).
    pub backoff_unit: Duration,
    /// Polls per reconciliation episode, and the attempt ceiling after which a
    /// timed-out request is handed to the fallback.
    pub max_reconcile_attempts: u32,
    pub reconcile_interval: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            escalation_threshold: DEFAULT_ESCALATION_THRESHOLD,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
            max_reconcile_attempts: DEFAULT_MAX_RECONCILE_ATTEMPTS,
            reconcile_interval: DEFAULT_RECONCILE_INTERVAL,
        }
    }
}

/// Where and when a failed request goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reschedule {
    pub route: Route,
    pub delay: Duration,
}

impl DispatchPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.escalation_threshold == 0 {
            return Err(PaymentError::ConfigError(
                "escalation threshold must be at least 1".to_string(),
            ));
        }
        if self.max_reconcile_attempts == 0 {
            return Err(PaymentError::ConfigError(
                "reconcile attempts must be at least 1".to_string(),
            ));
        }
        // The reconcile ceiling also routes requests to the fallback queue, so
        // it may not undercut the escalation threshold.
        if self.max_reconcile_attempts < self.escalation_threshold {
            return Err(PaymentError::ConfigError(format!(
                "reconcile attempts ({}) must not be below the escalation threshold ({})",
                self.max_reconcile_attempts, self.escalation_threshold
            )));
        }
        Ok(())
    }

    /// Linear backoff: `attempt × backoff_unit`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(attempt)
    }

    pub fn should_escalate(&self, attempt: u32) -> bool {
        attempt > self.escalation_threshold
    }

    /// Applies the retry policy to a request whose primary attempt failed with
    /// an explicit error.
    ///
    /// Below the threshold the attempt counter is bumped and the request goes
    /// back to the primary queue; above it the request escalates untouched.
    pub fn after_failure(&self, request: &mut PaymentRequest) -> Reschedule {
        if self.should_escalate(request.attempt()) {
            return Reschedule {
                route: Route::Fallback,
                delay: self.backoff(request.attempt()),
            };
        }
        request.next_attempt();
        Reschedule {
            route: Route::Primary,
            delay: self.backoff(request.attempt()),
        }
    }

    /// Upper bound of one reconciliation episode.
    pub fn reconcile_budget(&self) -> Duration {
        self.reconcile_interval
            .saturating_mul(self.max_reconcile_attempts)
    }
}
