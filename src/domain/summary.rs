use super::payment::{Route, SettledPayment};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Inclusive settlement-time window. Open bounds match everything on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SummaryRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl SummaryRange {
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at <= to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTotals {
    pub total_requests: u64,
    pub total_amount: Decimal,
}

/// Per-route totals of settled payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PaymentSummary {
    pub default: RouteTotals,
    pub fallback: RouteTotals,
}

impl PaymentSummary {
    pub fn from_payments<'a, I>(payments: I, range: &SummaryRange) -> Self
    where
        I: IntoIterator<Item = &'a SettledPayment>,
    {
        let mut summary = Self::default();
        for payment in payments {
            if !range.contains(payment.settled_at) {
                continue;
            }
            let totals = summary.totals_mut(payment.route);
            totals.total_requests += 1;
            totals.total_amount += payment.amount;
        }
        summary
    }

    pub fn totals(&self, route: Route) -> &RouteTotals {
        match route {
            Route::Primary => &self.default,
            Route::Fallback => &self.fallback,
        }
    }

    fn totals_mut(&mut self, route: Route) -> &mut RouteTotals {
        match route {
            Route::Primary => &mut self.default,
            Route::Fallback => &mut self.fallback,
        }
    }
}
