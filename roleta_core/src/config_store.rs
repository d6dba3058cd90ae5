use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::info;

use crate::error::{ConfigError, StoreError};
use crate::segment::{Segment, SegmentSet};
use crate::validator::{CouponCatalog, SegmentValidator};

/// Persistence for the committed wheel configuration.
///
/// `load` hands out an immutable snapshot; a later `save` never alters a
/// snapshot already handed out.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn load(&self) -> Result<Option<Arc<SegmentSet>>, StoreError>;

    async fn save(&self, set: SegmentSet) -> Result<Arc<SegmentSet>, StoreError>;
}

/// Validate `segments` and persist them only if the whole set is accepted.
pub async fn commit(
    store: &dyn ConfigStore,
    catalog: &dyn CouponCatalog,
    segments: Vec<Segment>,
) -> Result<Arc<SegmentSet>, ConfigError> {
    let set = SegmentValidator::new(catalog).validate(segments).await?;
    let saved = store.save(set).await?;
    info!(segments = saved.len(), "wheel configuration committed");
    Ok(saved)
}

/// In-memory store that publishes every committed snapshot to subscribers.
pub struct MemoryConfigStore {
    tx: watch::Sender<Option<Arc<SegmentSet>>>,
}

impl Default for MemoryConfigStore {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Change feed for views that mirror the configuration.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<SegmentSet>>> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self) -> Result<Option<Arc<SegmentSet>>, StoreError> {
        Ok(self.tx.borrow().clone())
    }

    async fn save(&self, set: SegmentSet) -> Result<Arc<SegmentSet>, StoreError> {
        let set = Arc::new(set);
        self.tx.send_replace(Some(set.clone()));
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::validator::MemoryCatalog;

    #[tokio::test]
    async fn rejected_commit_keeps_previous_configuration() {
        let store = MemoryConfigStore::new();
        let catalog = MemoryCatalog::new(["TEN"]);
        let first = commit(&store, &catalog, vec![Segment::new("10%", "10% off", "TEN", 0.4)])
            .await
            .unwrap();
        assert_eq!(first.segments()[0].probability, 1.0);

        let err = commit(
            &store,
            &catalog,
            vec![
                Segment::new("10%", "10% off", "TEN", 0.5),
                Segment::new("90%", "90% off", "GHOST", 0.5),
            ],
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid(ValidationError::UnknownCoupon { code: "GHOST".into() })
        );
        assert_eq!(store.load().await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn subscribers_see_commits() {
        let store = MemoryConfigStore::new();
        let catalog = MemoryCatalog::new(["TEN"]);
        let mut rx = store.subscribe();
        assert!(rx.borrow().is_none());

        commit(&store, &catalog, vec![Segment::new("10%", "10% off", "TEN", 1.0)])
            .await
            .unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref().map(|s| s.len()), Some(1));
    }

    #[tokio::test]
    async fn snapshot_survives_later_save() {
        let store = MemoryConfigStore::new();
        let catalog = MemoryCatalog::new(["A", "B"]);
        commit(&store, &catalog, vec![Segment::new("a", "a", "A", 1.0)]).await.unwrap();
        let snapshot = store.load().await.unwrap().unwrap();
        commit(&store, &catalog, vec![Segment::new("b", "b", "B", 1.0)]).await.unwrap();
        assert_eq!(snapshot.segments()[0].label, "a");
    }
}
