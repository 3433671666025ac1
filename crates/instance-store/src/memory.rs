use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{InstanceRecord, InstanceStore, Result, SagaId, StoreError};

/// In-memory instance store.
///
/// Provides the same semantics as the PostgreSQL store; cloning shares the
/// underlying map.
#[derive(Clone, Default)]
pub struct InMemoryInstanceStore {
    instances: Arc<RwLock<HashMap<(String, SagaId), InstanceRecord>>>,
}

impl InMemoryInstanceStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored instances.
    pub async fn instance_count(&self) -> usize {
        self.instances.read().await.len()
    }

    /// Removes all instances.
    pub async fn clear(&self) {
        self.instances.write().await.clear();
    }
}

#[async_trait]
impl InstanceStore for InMemoryInstanceStore {
    async fn find(&self, saga_name: &str, saga_id: SagaId) -> Result<Option<InstanceRecord>> {
        let instances = self.instances.read().await;
        Ok(instances.get(&(saga_name.to_string(), saga_id)).cloned())
    }

    async fn save(&self, record: &InstanceRecord) -> Result<()> {
        let mut instances = self.instances.write().await;
        let key = (record.saga_name.clone(), record.saga_id);

        if instances.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                saga_name: record.saga_name.clone(),
                saga_id: record.saga_id,
            });
        }

        instances.insert(key, record.clone());
        Ok(())
    }

    async fn update(&self, record: &InstanceRecord) -> Result<()> {
        let mut instances = self.instances.write().await;

        match instances.get_mut(&(record.saga_name.clone(), record.saga_id)) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(StoreError::InstanceNotFound {
                saga_name: record.saga_name.clone(),
                saga_id: record.saga_id,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(saga_name: &str) -> InstanceRecord {
        InstanceRecord {
            saga_id: SagaId::new(),
            saga_name: saga_name.to_string(),
            saga_data_name: "test.OrderData".to_string(),
            saga_data: json!({"order_id": "ORD-1", "total": 42}),
            current_step: -1,
            end_state: false,
            compensating: false,
        }
    }

    #[tokio::test]
    async fn test_save_and_find() {
        let store = InMemoryInstanceStore::new();
        let record = record("order-saga");

        store.save(&record).await.unwrap();

        let found = store.find("order-saga", record.saga_id).await.unwrap();
        assert_eq!(found, Some(record));
        assert_eq!(store.instance_count().await, 1);
    }

    #[tokio::test]
    async fn test_find_missing_returns_none() {
        let store = InMemoryInstanceStore::new();
        let found = store.find("order-saga", SagaId::new()).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_key_includes_saga_name() {
        let store = InMemoryInstanceStore::new();
        let record = record("order-saga");
        store.save(&record).await.unwrap();

        let found = store.find("refund-saga", record.saga_id).await.unwrap();
        assert!(found.is_none());

        let mut other = record.clone();
        other.saga_name = "refund-saga".to_string();
        store.save(&other).await.unwrap();
        assert_eq!(store.instance_count().await, 2);
    }

    #[tokio::test]
    async fn test_duplicate_save_fails() {
        let store = InMemoryInstanceStore::new();
        let record = record("order-saga");
        store.save(&record).await.unwrap();

        let err = store.save(&record).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_update_overwrites() {
        let store = InMemoryInstanceStore::new();
        let mut record = record("order-saga");
        store.save(&record).await.unwrap();

        record.current_step = 2;
        record.compensating = true;
        record.saga_data = json!({"order_id": "ORD-1", "total": 0});
        store.update(&record).await.unwrap();

        let found = store
            .find("order-saga", record.saga_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.current_step, 2);
        assert!(found.compensating);
        assert_eq!(found.saga_data["total"], 0);
    }

    #[tokio::test]
    async fn test_update_missing_fails() {
        let store = InMemoryInstanceStore::new();
        let err = store.update(&record("order-saga")).await.unwrap_err();
        assert!(matches!(err, StoreError::InstanceNotFound { .. }));
    }

    #[tokio::test]
    async fn test_clear() {
        let store = InMemoryInstanceStore::new();
        store.save(&record("order-saga")).await.unwrap();
        store.clear().await;
        assert_eq!(store.instance_count().await, 0);
    }
}
