use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Result of a single attempt to charge a payment at one processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOutcome {
    Success,
    /// The processor answered with a non-success status.
    Rejected(u16),
    /// The call exceeded its deadline. The processor may still have committed
    /// the charge.
    Timeout,
    ConnectionError(String),
}

/// How the dispatcher must treat a non-successful outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Explicit error; safe to retry with backoff.
    Transient,
    /// Unknown processor state; must be reconciled before any retry.
    Ambiguous,
}

impl GatewayOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, GatewayOutcome::Success)
    }

    /// `None` for a success.
    pub fn failure_class(&self) -> Option<FailureClass> {
        match self {
            GatewayOutcome::Success => None,
            GatewayOutcome::Timeout => Some(FailureClass::Ambiguous),
            GatewayOutcome::Rejected(_) | GatewayOutcome::ConnectionError(_) => {
                Some(FailureClass::Transient)
            }
        }
    }
}

/// A payment as echoed back by a processor's lookup endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorRecord {
    pub correlation_id: String,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub requested_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Found(ProcessorRecord),
    NotFound,
    Error(String),
}

/// Processor health as reported by its service-health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HealthStatus {
    pub failing: bool,
    #[serde(rename = "minResponseTime", alias = "min_response_time")]
    pub min_response_time_ms: u64,
}
