use crate::domain::payment::Route;
use crate::domain::summary::PaymentSummary;
use crate::error::Result;
use std::io::Write;

/// Writes a [`PaymentSummary`] as CSV: one row per route.
pub struct SummaryWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> SummaryWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_summary(&mut self, summary: &PaymentSummary) -> Result<()> {
        self.writer
            .write_record(["route", "total_requests", "total_amount"])?;
        for route in [Route::Primary, Route::Fallback] {
            let totals = summary.totals(route);
            self.writer.write_record([
                route.summary_key().to_string(),
                totals.total_requests.to_string(),
                totals.total_amount.normalize().to_string(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
