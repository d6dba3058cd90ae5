use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::{ClaimError, StoreError};
use crate::segment::Segment;

/// Durable proof that a customer used their one spin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRecord {
    pub customer_id: String,
    pub segment_label: String,
    pub coupon_code: String,
    pub claimed_at: DateTime<Utc>,
}

impl ClaimRecord {
    pub fn new(customer_id: &str, segment: &Segment) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            segment_label: segment.label.clone(),
            coupon_code: segment.coupon_code.clone(),
            claimed_at: Utc::now(),
        }
    }
}

/// Append-only, one-record-per-customer ledger.
///
/// `claim` must be an atomic insert-if-absent: of any number of concurrent
/// calls for one customer exactly one succeeds, the rest get
/// [`ClaimError::AlreadyClaimed`].
#[async_trait]
pub trait ClaimLedger: Send + Sync {
    async fn claim(&self, customer_id: &str, segment: &Segment) -> Result<ClaimRecord, ClaimError>;

    async fn get(&self, customer_id: &str) -> Result<Option<ClaimRecord>, StoreError>;
}

/// Sharded in-memory ledger; claims for different customers only contend
/// when their ids hash to the same shard.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: DashMap<String, ClaimRecord>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ClaimLedger for MemoryLedger {
    async fn claim(&self, customer_id: &str, segment: &Segment) -> Result<ClaimRecord, ClaimError> {
        // the shard stays write-locked for the whole entry, so check and insert are one step
        match self.records.entry(customer_id.to_string()) {
            Entry::Occupied(_) => Err(ClaimError::AlreadyClaimed {
                customer_id: customer_id.to_string(),
            }),
            Entry::Vacant(slot) => {
                let record = ClaimRecord::new(customer_id, segment);
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn get(&self, customer_id: &str) -> Result<Option<ClaimRecord>, StoreError> {
        Ok(self.records.get(customer_id).map(|r| r.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_claim_is_rejected() {
        let ledger = MemoryLedger::new();
        let seg = Segment::new("10%", "10% off", "TEN", 1.0);
        let rec = ledger.claim("alice", &seg).await.unwrap();
        assert_eq!(rec.coupon_code, "TEN");

        let other = Segment::new("20%", "20% off", "TWENTY", 1.0);
        let err = ledger.claim("alice", &other).await.unwrap_err();
        assert_eq!(err, ClaimError::AlreadyClaimed { customer_id: "alice".into() });

        // the original record is untouched
        assert_eq!(ledger.get("alice").await.unwrap(), Some(rec));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.get("bob").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn distinct_customers_claim_in_parallel() {
        let ledger = std::sync::Arc::new(MemoryLedger::new());
        let handles: Vec<_> = (0..200)
            .map(|i| {
                let ledger = ledger.clone();
                tokio::spawn(async move {
                    let seg = Segment::new("10%", "10% off", "TEN", 1.0);
                    // a repeat claim by the same customer is refused
                    let first = ledger.claim(&format!("c-{i}"), &seg).await;
                    let second = ledger.claim(&format!("c-{i}"), &seg).await;
                    (first.is_ok(), second.is_ok())
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.await.unwrap(), (true, false));
        }
        assert_eq!(ledger.len(), 200);
    }
}
