use crate::error::PaymentError;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Caller-supplied identifier of a payment. Doubles as the idempotency key
/// towards the upstream processors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl FromStr for CorrelationId {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(PaymentError::ValidationError(
                "Correlation id is required".to_string(),
            ));
        }
        Uuid::parse_str(s).map(Self).map_err(|e| {
            PaymentError::ValidationError(format!("Invalid correlation id '{}': {}", s, e))
        })
    }
}

impl TryFrom<String> for CorrelationId {
    type Error = PaymentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CorrelationId> for String {
    fn from(id: CorrelationId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

/// A strictly positive monetary amount.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, PaymentError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PaymentError::ValidationError(format!(
                "Amount must be positive, got {}",
                value
            )))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// Upstream processor a payment is routed to.
///
/// The discriminant is the tag stored alongside a settled payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Route {
    Primary = 0,
    Fallback = 1,
}

impl Route {
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Name used by the summary report.
    pub fn summary_key(self) -> &'static str {
        match self {
            Route::Primary => "default",
            Route::Fallback => "fallback",
        }
    }
}

impl From<Route> for u8 {
    fn from(route: Route) -> Self {
        route.tag()
    }
}

impl TryFrom<u8> for Route {
    type Error = PaymentError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(Route::Primary),
            1 => Ok(Route::Fallback),
            other => Err(PaymentError::ValidationError(format!(
                "Unknown route tag {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Primary => f.write_str("primary"),
            Route::Fallback => f.write_str("fallback"),
        }
    }
}

/// Inbound shape produced by the transport layer, before validation.
///
/// In JSON the amount may be a number or a decimal string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntake {
    pub correlation_id: String,
    pub amount: Decimal,
}

/// A payment travelling through the dispatch pipeline.
///
/// Not `Clone`: the request moves between queues and tasks and exactly one
/// owner mutates its attempt counter.
#[derive(Debug, PartialEq)]
pub struct PaymentRequest {
    pub correlation_id: CorrelationId,
    pub amount: Amount,
    requested_at: Option<DateTime<Utc>>,
    attempt: u32,
}

impl PaymentRequest {
    /// Builds a freshly admitted request. The attempt counter starts at 1.
    pub fn admitted(correlation_id: CorrelationId, amount: Amount) -> Self {
        Self {
            correlation_id,
            amount,
            requested_at: None,
            attempt: 1,
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn next_attempt(&mut self) {
        self.attempt = self.attempt.saturating_add(1);
    }

    /// Timestamp of the most recent dispatch, if the request was dispatched.
    pub fn requested_at(&self) -> Option<DateTime<Utc>> {
        self.requested_at
    }

    pub fn stamp_dispatch(&mut self, at: DateTime<Utc>) {
        self.requested_at = Some(at);
    }
}

impl TryFrom<PaymentIntake> for PaymentRequest {
    type Error = PaymentError;

    fn try_from(intake: PaymentIntake) -> Result<Self, Self::Error> {
        let correlation_id = intake.correlation_id.parse()?;
        let amount = Amount::new(intake.amount)?;
        Ok(Self::admitted(correlation_id, amount))
    }
}

/// Body sent to a processor's payment endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchPayload {
    pub correlation_id: CorrelationId,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub requested_at: String,
}

impl DispatchPayload {
    pub fn new(correlation_id: CorrelationId, amount: Amount, at: DateTime<Utc>) -> Self {
        Self {
            correlation_id,
            amount: amount.value(),
            requested_at: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// A payment durably recorded as processed through exactly one route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettledPayment {
    pub correlation_id: CorrelationId,
    pub amount: Decimal,
    pub route: Route,
    pub settled_at: DateTime<Utc>,
}
