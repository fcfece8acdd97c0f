//! In-memory document store.
//! Collections are insertion-ordered vectors behind one mutex; every
//! operation, including the conditional update, runs under a single lock.

use async_trait::async_trait;
use pulse_core::error::{PulseError, Result};
use pulse_core::traits::store::{Fields, Filter, Record, Store};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{merge_patch, new_id, validate_field};

#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<Record>>>,
    /// When set, every operation fails with `StoreUnavailable`.
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an unreachable store.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn with_collections<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Vec<Record>>) -> Result<T>,
    ) -> Result<T> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PulseError::StoreUnavailable("memory store offline".into()));
        }
        let mut guard = self
            .collections
            .lock()
            .map_err(|e| PulseError::StoreUnavailable(format!("Lock: {e}")))?;
        f(&mut guard)
    }
}

fn check_filter(filter: &Filter) -> Result<()> {
    filter.conditions.iter().try_for_each(|(k, _)| validate_field(k))
}

#[async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn query(&self, collection: &str, filter: &Filter) -> Result<Vec<Record>> {
        check_filter(filter)?;
        self.with_collections(|cols| {
            let matching = cols
                .get(collection)
                .map(|records| {
                    records
                        .iter()
                        .filter(|r| filter.matches(&r.fields))
                        .take(filter.limit.unwrap_or(usize::MAX))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            Ok(matching)
        })
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>> {
        self.with_collections(|cols| {
            Ok(cols
                .get(collection)
                .and_then(|records| records.iter().find(|r| r.id == id))
                .cloned())
        })
    }

    async fn insert(&self, collection: &str, fields: Fields) -> Result<String> {
        self.with_collections(|cols| {
            let id = new_id();
            cols.entry(collection.to_string()).or_default().push(Record {
                id: id.clone(),
                fields,
            });
            Ok(id)
        })
    }

    async fn update_if_matches(
        &self,
        collection: &str,
        id: &str,
        predicate: &Filter,
        patch: Fields,
    ) -> Result<bool> {
        check_filter(predicate)?;
        self.with_collections(|cols| {
            let Some(record) = cols
                .get_mut(collection)
                .and_then(|records| records.iter_mut().find(|r| r.id == id))
            else {
                return Ok(false);
            };
            if !predicate.matches(&record.fields) {
                return Ok(false);
            }
            merge_patch(&mut record.fields, patch);
            Ok(true)
        })
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.with_collections(|cols| {
            if let Some(records) = cols.get_mut(collection) {
                records.retain(|r| r.id != id);
            }
            Ok(())
        })
    }
}
