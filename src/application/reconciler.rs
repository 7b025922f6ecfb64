//! Resolution of ambiguous (timed-out) primary attempts.
//!
//! A timeout does not tell whether the processor committed the charge, so the
//! request may not be retried before the processor has been asked about it.

use super::policy::DispatchPolicy;
use crate::domain::outcome::{LookupOutcome, ProcessorRecord};
use crate::domain::payment::PaymentRequest;
use crate::domain::ports::GatewayRef;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileVerdict {
    /// The processor holds the payment; it must be settled, not retried.
    Confirmed { record: ProcessorRecord, polls: u32 },
    /// The attempt ceiling was passed while polling.
    Escalate { polls: u32 },
    /// Polling exhausted without a match.
    Retry { polls: u32 },
}

pub struct Reconciler {
    gateway: GatewayRef,
    max_polls: u32,
    interval: Duration,
}

impl Reconciler {
    pub fn new(gateway: GatewayRef, policy: &DispatchPolicy) -> Self {
        Self {
            gateway,
            max_polls: policy.max_reconcile_attempts,
            interval: policy.reconcile_interval,
        }
    }

    /// Polls the processor for `request` at a fixed interval.
    ///
    /// Each poll is preceded by one interval, so an episode lasts at most
    /// `max_polls × interval` plus the lookup latencies.
    pub async fn reconcile(&self, request: &PaymentRequest) -> ReconcileVerdict {
        let id = &request.correlation_id;

        for poll in 1..=self.max_polls {
            tokio::time::sleep(self.interval).await;

            match self.gateway.get_payment_by_id(id).await {
                LookupOutcome::Found(record) => {
                    debug!(correlation_id = %id, poll, "Reconciliation found payment");
                    return ReconcileVerdict::Confirmed { record, polls: poll };
                }
                LookupOutcome::NotFound => {}
                LookupOutcome::Error(reason) => {
                    debug!(correlation_id = %id, poll, %reason, "Reconciliation lookup failed");
                }
            }

            if request.attempt() > self.max_polls {
                return ReconcileVerdict::Escalate { polls: poll };
            }
        }

        ReconcileVerdict::Retry {
            polls: self.max_polls,
        }
    }
}
