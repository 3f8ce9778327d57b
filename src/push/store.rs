use crate::storage::{self, StoreError};
use crate::types::push::SubscriptionMap;

use std::path::PathBuf;
use std::pin::Pin;

pub const SUBSCRIPTIONS_FILE: &str = "subscriptions.json";

/// Durable backing for a `SubscriptionRegistry`. The whole map is read once
/// and written wholesale on every change.
pub trait SubscriptionStore: Send + Sync + 'static {
    type LoadFut<'a>: Future<Output = Result<SubscriptionMap, StoreError>> + Send + 'a
    where
        Self: 'a;
    type SaveFut<'a>: Future<Output = Result<(), StoreError>> + Send + 'a
    where
        Self: 'a;

    fn load(&self) -> Self::LoadFut<'_>;
    fn save<'a>(&'a self, entries: &'a SubscriptionMap) -> Self::SaveFut<'a>;
}

/// One JSON object keyed by admin id.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SubscriptionStore for JsonFileStore {
    type LoadFut<'a>
        = std::future::Ready<Result<SubscriptionMap, StoreError>>
    where
        Self: 'a;
    type SaveFut<'a>
        = Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>
    where
        Self: 'a;

    fn load(&self) -> Self::LoadFut<'_> {
        std::future::ready(storage::load_json_or_default(&self.path))
    }

    fn save<'a>(&'a self, entries: &'a SubscriptionMap) -> Self::SaveFut<'a> {
        Box::pin(async move {
            let contents = storage::encode_json(&self.path, entries)?;
            storage::write_atomically(&self.path, contents).await
        })
    }
}

#[cfg(test)]
pub(crate) use memory::MemoryStore;
