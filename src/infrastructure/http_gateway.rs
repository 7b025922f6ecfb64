use crate::config::GatewayEndpoint;
use crate::domain::outcome::{GatewayOutcome, HealthStatus, LookupOutcome, ProcessorRecord};
use crate::domain::payment::{CorrelationId, DispatchPayload};
use crate::domain::ports::PaymentGateway;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

const ADMIN_TOKEN_HEADER: &str = "X-Rinha-Token";

/// [`PaymentGateway`] speaking HTTP/JSON to one payment processor.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    endpoint: GatewayEndpoint,
    client: Client,
}

impl HttpPaymentGateway {
    pub fn new(endpoint: GatewayEndpoint) -> Result<Self> {
        let client = Client::builder()
            .timeout(endpoint.request_timeout)
            .pool_max_idle_per_host(64)
            .build()?;
        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &GatewayEndpoint {
        &self.endpoint
    }
}

/// Maps a failed send to an outcome. A missed deadline is kept apart from
/// other transport failures because the charge may have gone through.
fn classify_error(error: reqwest::Error) -> GatewayOutcome {
    if error.is_timeout() {
        GatewayOutcome::Timeout
    } else {
        GatewayOutcome::ConnectionError(error.to_string())
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn process(&self, payload: &DispatchPayload) -> GatewayOutcome {
        let response = self
            .client
            .post(self.endpoint.url("/payments"))
            .json(payload)
            .send()
            .await;

        let outcome = match response {
            Ok(response) if response.status() == StatusCode::OK => GatewayOutcome::Success,
            Ok(response) => GatewayOutcome::Rejected(response.status().as_u16()),
            Err(e) => classify_error(e),
        };
        debug!(
            route = %self.endpoint.route,
            correlation_id = %payload.correlation_id,
            ?outcome,
            "Processor call finished"
        );
        outcome
    }

    /// Bounded by the per-call deadline, like `process`, so a reconciliation
    /// episode stays close to its polling budget.
    async fn get_payment_by_id(&self, id: &CorrelationId) -> LookupOutcome {
        let response = self
            .client
            .get(self.endpoint.url(&format!("/payments/{}", id)))
            .send()
            .await;

        match response {
            Ok(response) if response.status() == StatusCode::NOT_FOUND => LookupOutcome::NotFound,
            Ok(response) if response.status() == StatusCode::OK => {
                match response.json::<ProcessorRecord>().await {
                    Ok(record) => LookupOutcome::Found(record),
                    Err(e) => LookupOutcome::Error(format!("Malformed lookup response: {}", e)),
                }
            }
            Ok(response) => LookupOutcome::Error(format!("Unexpected status {}", response.status())),
            Err(e) => LookupOutcome::Error(e.to_string()),
        }
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        let response = self
            .client
            .get(self.endpoint.url("/payments/service-health"))
            .timeout(self.endpoint.admin_timeout)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(PaymentError::UpstreamError(format!(
                "{} health check returned {}",
                self.endpoint.route,
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    async fn purge_all(&self) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint.url("/admin/purge-payments"))
            .header(ADMIN_TOKEN_HEADER, &self.endpoint.admin_token)
            .timeout(self.endpoint.admin_timeout)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        debug!(route = %self.endpoint.route, %status, %body, "Purge response");
        if status.is_success() {
            Ok(())
        } else {
            Err(PaymentError::UpstreamError(format!(
                "{} purge returned {}",
                self.endpoint.route, status
            )))
        }
    }
}
