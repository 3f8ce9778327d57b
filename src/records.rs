//! JSON-file repositories for leads and portfolio projects.

use crate::storage::{self, StoreError};
use crate::types::records::{Lead, Project};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use uuid::Uuid;

use std::path::PathBuf;

pub const LEADS_FILE: &str = "leads.json";
pub const PROJECTS_FILE: &str = "projects.json";

pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn id(&self) -> Uuid;
}

impl Record for Lead {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Record for Project {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// A collection persisted as one JSON array. Changes are applied to a copy
/// and only committed once the write succeeded, so memory never runs ahead
/// of disk.
pub struct RecordStore<T> {
    path: PathBuf,
    records: RwLock<Vec<T>>,
}

impl<T: Record> RecordStore<T> {
    pub fn load(path: PathBuf) -> Result<Self, StoreError> {
        let records: Vec<T> = storage::load_json_or_default(&path)?;
        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    pub async fn list(&self) -> Vec<T> {
        self.records.read().await.clone()
    }

    pub async fn get(&self, id: Uuid) -> Option<T> {
        self.records
            .read()
            .await
            .iter()
            .find(|record| record.id() == id)
            .cloned()
    }

    pub async fn insert(&self, record: T) -> Result<T, StoreError> {
        let mut records = self.records.write().await;
        let mut next = records.clone();
        next.push(record.clone());
        self.persist(&next).await?;
        *records = next;
        Ok(record)
    }

    /// Inserts `record` unless `conflicts` matches an existing one, in which
    /// case the conflicting record is returned instead.
    pub async fn insert_unless<F>(
        &self,
        record: T,
        conflicts: F,
    ) -> Result<Result<T, T>, StoreError>
    where
        F: Fn(&T, &T) -> bool,
    {
        let mut records = self.records.write().await;
        if let Some(existing) = records.iter().find(|existing| conflicts(*existing, &record)) {
            return Ok(Err(existing.clone()));
        }
        let mut next = records.clone();
        next.push(record.clone());
        self.persist(&next).await?;
        *records = next;
        Ok(Ok(record))
    }

    /// Applies `change` to the record with `id`. `change` may veto the
    /// update by returning `false`, leaving the store untouched. Returns
    /// `None` when no such record exists.
    pub async fn update<F>(
        &self,
        id: Uuid,
        change: F,
    ) -> Result<Option<Result<T, T>>, StoreError>
    where
        F: FnOnce(&[T], &mut T) -> bool,
    {
        let mut records = self.records.write().await;
        let Some(index) = records.iter().position(|record| record.id() == id) else {
            return Ok(None);
        };
        let mut next = records.clone();
        let mut updated = next.remove(index);
        if !change(&next, &mut updated) {
            return Ok(Some(Err(updated)));
        }
        next.insert(index, updated.clone());
        self.persist(&next).await?;
        *records = next;
        Ok(Some(Ok(updated)))
    }

    pub async fn remove(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;
        let Some(index) = records.iter().position(|record| record.id() == id) else {
            return Ok(false);
        };
        let mut next = records.clone();
        next.remove(index);
        self.persist(&next).await?;
        *records = next;
        Ok(true)
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    async fn persist(&self, records: &[T]) -> Result<(), StoreError> {
        let contents = storage::encode_json(&self.path, &records)?;
        storage::write_atomically(&self.path, contents).await
    }
}
