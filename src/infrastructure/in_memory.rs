use crate::domain::payment::{CorrelationId, SettledPayment};
use crate::domain::ports::PaymentRecorder;
use crate::domain::summary::{PaymentSummary, SummaryRange};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory recorder of settled payments.
///
/// Keeps every insert, like an append-only table without a uniqueness
/// constraint, so a duplicate settlement would show up as two rows.
#[derive(Default, Clone)]
pub struct InMemoryPaymentRecorder {
    payments: Arc<RwLock<Vec<SettledPayment>>>,
}

impl InMemoryPaymentRecorder {
    /// Creates a new, empty in-memory recorder.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<SettledPayment> {
        self.payments.read().await.clone()
    }

    pub async fn records_for(&self, id: &CorrelationId) -> Vec<SettledPayment> {
        let payments = self.payments.read().await;
        payments
            .iter()
            .filter(|p| &p.correlation_id == id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PaymentRecorder for InMemoryPaymentRecorder {
    async fn insert(&self, payment: SettledPayment) -> Result<()> {
        let mut payments = self.payments.write().await;
        payments.push(payment);
        Ok(())
    }

    async fn summary(&self, range: SummaryRange) -> Result<PaymentSummary> {
        let payments = self.payments.read().await;
        Ok(PaymentSummary::from_payments(payments.iter(), &range))
    }

    async fn purge(&self) -> Result<()> {
        self.payments.write().await.clear();
        Ok(())
    }
}
