use super::queue::DispatchQueues;
use super::tracker::{DispatchReport, OutcomeTracker, Terminal};
use crate::domain::payment::{PaymentRequest, Route};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Delayed re-enqueue of requests.
///
/// Each pending retry is a suspended task that sleeps for its delay, so a
/// waiting retry never holds a dispatch slot.
#[derive(Debug, Clone)]
pub struct RetryScheduler {
    queues: DispatchQueues,
    tracker: Arc<OutcomeTracker>,
}

impl RetryScheduler {
    pub fn new(queues: DispatchQueues, tracker: Arc<OutcomeTracker>) -> Self {
        Self { queues, tracker }
    }

    pub fn schedule(&self, request: PaymentRequest, route: Route, delay: Duration) {
        let scheduler = self.clone();
        debug!(
            correlation_id = %request.correlation_id,
            attempt = request.attempt(),
            %route,
            delay_ms = delay.as_millis() as u64,
            "Scheduling retry"
        );
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            scheduler.requeue(request, route).await;
        });
    }

    /// Puts a request back on a route queue, waiting for capacity.
    ///
    /// A closed queue only happens during shutdown; the request is then
    /// reported as dropped so it is still accounted for.
    pub async fn requeue(&self, request: PaymentRequest, route: Route) {
        let correlation_id = request.correlation_id;
        let attempts = request.attempt();
        if let Err(e) = self.queues.for_route(route).enqueue(request).await {
            error!(%correlation_id, %route, error = %e, "Failed to re-enqueue payment");
            self.tracker.finish(DispatchReport {
                correlation_id,
                attempts,
                terminal: Terminal::Dropped,
            });
        }
    }
}
