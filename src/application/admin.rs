use crate::domain::outcome::HealthStatus;
use crate::domain::payment::Route;
use crate::domain::ports::{GatewayRef, RecorderRef};
use crate::domain::summary::{PaymentSummary, SummaryRange};
use crate::error::Result;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Operator-facing actions that sit beside the dispatch pipeline.
#[derive(Clone)]
pub struct AdminService {
    recorder: RecorderRef,
    primary: GatewayRef,
    fallback: GatewayRef,
}

impl AdminService {
    pub fn new(recorder: RecorderRef, primary: GatewayRef, fallback: GatewayRef) -> Self {
        Self {
            recorder,
            primary,
            fallback,
        }
    }

    /// Deletes every settled payment, then asks both processors to purge
    /// their own state.
    ///
    /// The processor purges are fire-and-forget; the returned handles only
    /// exist so callers that care can wait for them. Their failures are
    /// logged and never surface here.
    pub async fn purge(&self) -> Result<Vec<JoinHandle<()>>> {
        let purged = self.recorder.purge().await;
        if let Err(e) = &purged {
            warn!(error = %e, "Failed to purge settled payments");
        }

        let handles = [(Route::Primary, &self.primary), (Route::Fallback, &self.fallback)]
            .into_iter()
            .map(|(route, gateway)| {
                let gateway = GatewayRef::clone(gateway);
                tokio::spawn(async move {
                    match gateway.purge_all().await {
                        Ok(()) => info!(%route, "Processor purged"),
                        Err(e) => warn!(%route, error = %e, "Processor purge failed"),
                    }
                })
            })
            .collect();

        purged.map(|()| handles)
    }

    pub async fn summary(&self, range: SummaryRange) -> Result<PaymentSummary> {
        self.recorder.summary(range).await
    }

    /// Health of both processors, primary first. Informational only.
    pub async fn health(&self) -> (Result<HealthStatus>, Result<HealthStatus>) {
        tokio::join!(self.primary.health_check(), self.fallback.health_check())
    }
}
