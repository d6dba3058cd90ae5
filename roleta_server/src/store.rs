use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use roleta_core::{
    ClaimError, ClaimLedger, ClaimRecord, ConfigStore, CouponCatalog, Segment, SegmentSet,
    StoreError,
};
use sqlx::{Row, SqlitePool};
use tracing::warn;

// DB schema is defined in migrations (see migrations/ folder)

#[derive(Debug, sqlx::FromRow)]
pub struct StoredParams {
    pub server_seed: String,
    pub server_seed_hash: String,
}

pub async fn get_params(pool: &SqlitePool) -> anyhow::Result<StoredParams> {
    let row = sqlx::query_as::<_, StoredParams>(
        "SELECT server_seed, server_seed_hash FROM params WHERE id = 1",
    )
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn init_db(db: &SqlitePool) -> anyhow::Result<StoredParams> {
    sqlx::migrate!("./migrations").run(db).await?;
    // ensure server_seed_hash matches server_seed
    let mut p = get_params(db).await?;
    let hash = roleta_core::derive_hash_hex(p.server_seed.as_bytes());
    if p.server_seed_hash != hash {
        sqlx::query("UPDATE params SET server_seed_hash = ? WHERE id = 1")
            .bind(&hash)
            .execute(db)
            .await?;
        p.server_seed_hash = hash;
    }
    Ok(p)
}

/// SQLite-backed configuration store, coupon catalog and claim ledger.
pub struct SqliteStore {
    db: SqlitePool,
    claim_timeout: Duration,
}

impl SqliteStore {
    pub fn new(db: SqlitePool, claim_timeout: Duration) -> Self {
        Self { db, claim_timeout }
    }
}

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

fn parse_ts(ts: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(ts)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("claimed_at {ts:?}: {e}")))
}

#[async_trait]
impl ConfigStore for SqliteStore {
    async fn load(&self) -> Result<Option<Arc<SegmentSet>>, StoreError> {
        let row = sqlx::query("SELECT segments_json FROM configuration WHERE id = 1")
            .fetch_optional(&self.db)
            .await
            .map_err(unavailable)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let json: String = row.get("segments_json");
        let set: SegmentSet = serde_json::from_str(&json)
            .map_err(|e| StoreError::Corrupt(format!("segments_json: {e}")))?;
        Ok(Some(Arc::new(set)))
    }

    async fn save(&self, set: SegmentSet) -> Result<Arc<SegmentSet>, StoreError> {
        let json =
            serde_json::to_string(&set).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        sqlx::query(
            "INSERT INTO configuration (id, segments_json, updated_at) VALUES (1, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET segments_json = excluded.segments_json, \
             updated_at = excluded.updated_at",
        )
        .bind(json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await
        .map_err(unavailable)?;
        Ok(Arc::new(set))
    }
}

#[async_trait]
impl CouponCatalog for SqliteStore {
    async fn coupon_exists(&self, code: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM coupons WHERE code = ?")
            .bind(code)
            .fetch_optional(&self.db)
            .await
            .map_err(unavailable)?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl ClaimLedger for SqliteStore {
    async fn claim(&self, customer_id: &str, segment: &Segment) -> Result<ClaimRecord, ClaimError> {
        let record = ClaimRecord::new(customer_id, segment);
        // the primary key on customer_id makes this an insert-if-absent
        let insert = sqlx::query(
            "INSERT INTO claims (customer_id, segment_label, coupon_code, claimed_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(&record.customer_id)
        .bind(&record.segment_label)
        .bind(&record.coupon_code)
        .bind(record.claimed_at.to_rfc3339())
        .execute(&self.db);

        match tokio::time::timeout(self.claim_timeout, insert).await {
            Ok(Ok(_)) => Ok(record),
            Ok(Err(e)) if is_unique_violation(&e) => Err(ClaimError::AlreadyClaimed {
                customer_id: customer_id.to_string(),
            }),
            // never reached the database, nothing was written
            Ok(Err(e @ (sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed))) => {
                Err(unavailable(e).into())
            }
            Ok(Err(e @ sqlx::Error::Database(_))) => Err(unavailable(e).into()),
            Ok(Err(e)) => {
                warn!(customer_id, error = %e, "claim insert failed mid-flight");
                Err(StoreError::Ambiguous(e.to_string()).into())
            }
            Err(_) => {
                warn!(customer_id, timeout = ?self.claim_timeout, "claim insert timed out");
                Err(StoreError::Ambiguous("claim insert timed out".into()).into())
            }
        }
    }

    async fn get(&self, customer_id: &str) -> Result<Option<ClaimRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT customer_id, segment_label, coupon_code, claimed_at FROM claims \
             WHERE customer_id = ?",
        )
        .bind(customer_id)
        .fetch_optional(&self.db)
        .await
        .map_err(unavailable)?;
        row.map(|r| {
            let ts: String = r.get("claimed_at");
            Ok(ClaimRecord {
                customer_id: r.get("customer_id"),
                segment_label: r.get("segment_label"),
                coupon_code: r.get("coupon_code"),
                claimed_at: parse_ts(&ts)?,
            })
        })
        .transpose()
    }
}
