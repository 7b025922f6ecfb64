use super::queue::PaymentQueue;
use super::tracker::OutcomeTracker;
use crate::domain::payment::{CorrelationId, PaymentIntake, PaymentRequest};
use crate::error::Result;
use std::sync::Arc;
use tracing::warn;

/// Entry point for new payments.
///
/// Validates the intake and hands the request to the primary queue. Once
/// `admit` returns `Ok`, the outcome of the payment is no longer the
/// caller's concern.
#[derive(Debug, Clone)]
pub struct Admission {
    primary: PaymentQueue,
    tracker: Arc<OutcomeTracker>,
}

impl Admission {
    pub(crate) fn new(primary: PaymentQueue, tracker: Arc<OutcomeTracker>) -> Self {
        Self { primary, tracker }
    }

    /// Admits a payment, waiting while the primary queue is full.
    ///
    /// Cancel safe: the payment is only counted once its slot is secured.
    pub async fn admit(&self, intake: PaymentIntake) -> Result<CorrelationId> {
        let request = validate(intake)?;
        let id = request.correlation_id;

        let slot = self.primary.reserve().await?;
        self.tracker.record_admission();
        slot.send(request);
        Ok(id)
    }

    /// Admits a payment or fails with `QueueFull` without waiting.
    pub fn try_admit(&self, intake: PaymentIntake) -> Result<CorrelationId> {
        let request = validate(intake)?;
        let id = request.correlation_id;

        self.tracker.record_admission();
        if let Err(rejected) = self.primary.try_enqueue(request) {
            self.tracker.retract_admission();
            return Err(rejected.error);
        }
        Ok(id)
    }
}

fn validate(intake: PaymentIntake) -> Result<PaymentRequest> {
    PaymentRequest::try_from(intake).inspect_err(|e| warn!(error = %e, "Rejected payment intake"))
}
