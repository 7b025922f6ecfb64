use crate::domain::payment::{CorrelationId, SettledPayment};
use crate::domain::ports::PaymentRecorder;
use crate::domain::summary::{PaymentSummary, SummaryRange};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options};
use std::path::Path;
use std::sync::Arc;

/// Column Family holding settled payments, keyed by correlation id.
pub const CF_SETTLED_PAYMENTS: &str = "settled_payments";

/// A persistent recorder backed by RocksDB.
///
/// Values are JSON-encoded [`SettledPayment`]s; amounts keep their decimal
/// string form. This struct is thread-safe (`Clone` shares the underlying
/// `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbPaymentRecorder {
    db: Arc<DB>,
}

impl RocksDbPaymentRecorder {
    /// Opens or creates a RocksDB instance at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf = ColumnFamilyDescriptor::new(CF_SETTLED_PAYMENTS, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf])?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(CF_SETTLED_PAYMENTS).ok_or_else(|| {
            PaymentError::InternalError(Box::new(std::io::Error::other(
                "Settled payments column family not found",
            )))
        })
    }

    fn key(id: &CorrelationId) -> [u8; 16] {
        *id.as_uuid().as_bytes()
    }

    pub fn get(&self, id: &CorrelationId) -> Result<Option<SettledPayment>> {
        let cf = self.cf()?;
        match self.db.get_cf(cf, Self::key(id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan(&self) -> Result<Vec<SettledPayment>> {
        let cf = self.cf()?;
        let mut payments = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            payments.push(serde_json::from_slice(&value)?);
        }
        Ok(payments)
    }
}

#[async_trait]
impl PaymentRecorder for RocksDbPaymentRecorder {
    async fn insert(&self, payment: SettledPayment) -> Result<()> {
        let cf = self.cf()?;
        let value = serde_json::to_vec(&payment)?;
        self.db
            .put_cf(cf, Self::key(&payment.correlation_id), value)
            .map_err(|e| PaymentError::PersistenceError(e.to_string()))
    }

    async fn summary(&self, range: SummaryRange) -> Result<PaymentSummary> {
        let payments = self.scan()?;
        Ok(PaymentSummary::from_payments(&payments, &range))
    }

    async fn purge(&self) -> Result<()> {
        let cf = self.cf()?;
        let mut keys = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _value) = item?;
            keys.push(key);
        }
        for key in keys {
            self.db.delete_cf(cf, key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::Route;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn settled(route: Route) -> SettledPayment {
        SettledPayment {
            correlation_id: CorrelationId::new(Uuid::new_v4()),
            amount: dec!(19.90),
            route,
            settled_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let recorder = RocksDbPaymentRecorder::open(dir.path()).expect("Failed to open RocksDB");

        assert!(recorder.db.cf_handle(CF_SETTLED_PAYMENTS).is_some());
    }

    #[tokio::test]
    async fn test_rocksdb_insert_and_summary() {
        let dir = tempdir().unwrap();
        let recorder = RocksDbPaymentRecorder::open(dir.path()).unwrap();
        let payment = settled(Route::Primary);

        recorder.insert(payment.clone()).await.unwrap();
        recorder.insert(settled(Route::Fallback)).await.unwrap();

        assert_eq!(recorder.get(&payment.correlation_id).unwrap(), Some(payment));
        let summary = recorder.summary(SummaryRange::default()).await.unwrap();
        assert_eq!(summary.default.total_requests, 1);
        assert_eq!(summary.default.total_amount, dec!(19.90));
        assert_eq!(summary.fallback.total_requests, 1);
    }

    #[tokio::test]
    async fn test_rocksdb_stores_route_tag() {
        let dir = tempdir().unwrap();
        let recorder = RocksDbPaymentRecorder::open(dir.path()).unwrap();
        let payment = settled(Route::Fallback);
        recorder.insert(payment.clone()).await.unwrap();

        let cf = recorder.cf().unwrap();
        let raw = recorder
            .db
            .get_cf(cf, RocksDbPaymentRecorder::key(&payment.correlation_id))
            .unwrap()
            .unwrap();
        let stored: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(stored["route"], 1);
        assert_eq!(stored["amount"], "19.90");
    }

    #[tokio::test]
    async fn test_rocksdb_purge() {
        let dir = tempdir().unwrap();
        let recorder = RocksDbPaymentRecorder::open(dir.path()).unwrap();
        recorder.insert(settled(Route::Primary)).await.unwrap();

        recorder.purge().await.unwrap();

        let summary = recorder.summary(SummaryRange::default()).await.unwrap();
        assert_eq!(summary, PaymentSummary::default());
    }
}
