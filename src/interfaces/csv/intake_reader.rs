use crate::domain::payment::PaymentIntake;
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One CSV row. The amount is parsed from its text so no digit goes through
/// a float.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntakeRow {
    correlation_id: String,
    #[serde(with = "rust_decimal::serde::str")]
    amount: Decimal,
}

impl From<IntakeRow> for PaymentIntake {
    fn from(row: IntakeRow) -> Self {
        PaymentIntake {
            correlation_id: row.correlation_id,
            amount: row.amount,
        }
    }
}

/// Reads payment intakes (`correlationId,amount`) from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<PaymentIntake>`.
/// It handles whitespace trimming and flexible record lengths automatically.
pub struct PaymentIntakeReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> PaymentIntakeReader<R> {
    /// Creates a new `PaymentIntakeReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes intakes.
    ///
    /// Rows are only parsed here; amount and id validation happen at admission.
    pub fn intakes(self) -> impl Iterator<Item = Result<PaymentIntake>> {
        self.reader
            .into_deserialize::<IntakeRow>()
            .map(|result| result.map(PaymentIntake::from).map_err(PaymentError::from))
    }
}
