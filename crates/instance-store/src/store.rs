use std::sync::Arc;

use async_trait::async_trait;

use crate::{InstanceRecord, Result, SagaId};

/// Storage for saga instances, keyed by `(saga_name, saga_id)`.
///
/// Callers are expected to serialize access per instance; stores do not
/// version records.
#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Loads an instance. Returns `None` if it has never been saved.
    async fn find(&self, saga_name: &str, saga_id: SagaId) -> Result<Option<InstanceRecord>>;

    /// Saves a new instance. Fails with `AlreadyExists` if the key is taken.
    async fn save(&self, record: &InstanceRecord) -> Result<()>;

    /// Overwrites an existing instance. Fails with `InstanceNotFound` if
    /// it has never been saved.
    async fn update(&self, record: &InstanceRecord) -> Result<()>;
}

#[async_trait]
impl<T: InstanceStore + ?Sized> InstanceStore for Arc<T> {
    async fn find(&self, saga_name: &str, saga_id: SagaId) -> Result<Option<InstanceRecord>> {
        (**self).find(saga_name, saga_id).await
    }

    async fn save(&self, record: &InstanceRecord) -> Result<()> {
        (**self).save(record).await
    }

    async fn update(&self, record: &InstanceRecord) -> Result<()> {
        (**self).update(record).await
    }
}
