use super::outcome::{GatewayOutcome, HealthStatus, LookupOutcome};
use super::payment::{CorrelationId, DispatchPayload, SettledPayment};
use super::summary::{PaymentSummary, SummaryRange};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Client for one upstream payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges a payment. Never blocks longer than the client's per-call
    /// deadline; a missed deadline is reported as [`GatewayOutcome::Timeout`].
    async fn process(&self, payload: &DispatchPayload) -> GatewayOutcome;

    async fn get_payment_by_id(&self, id: &CorrelationId) -> LookupOutcome;

    async fn health_check(&self) -> Result<HealthStatus>;

    async fn purge_all(&self) -> Result<()>;
}

/// Durable sink for settled payments.
#[async_trait]
pub trait PaymentRecorder: Send + Sync {
    async fn insert(&self, payment: SettledPayment) -> Result<()>;
    async fn summary(&self, range: SummaryRange) -> Result<PaymentSummary>;
    async fn purge(&self) -> Result<()>;
}

pub type GatewayRef = Arc<dyn PaymentGateway>;
pub type RecorderRef = Arc<dyn PaymentRecorder>;
