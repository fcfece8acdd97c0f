//! Document store: schemaless records grouped into named collections.
//!
//! The one primitive that matters for correctness is `update_if_matches`:
//! the predicate is evaluated and the patch applied as a single atomic step,
//! so two overlapping runs can never both claim the same item.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::Result;

/// Field map of a stored document.
pub type Fields = serde_json::Map<String, Value>;

/// A stored document: store-assigned id plus its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub fields: Fields,
}

impl Record {
    pub fn str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_str())
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.fields.get(key).and_then(|v| v.as_bool())
    }

    pub fn u64(&self, key: &str) -> Option<u64> {
        self.fields.get(key).and_then(|v| v.as_u64())
    }

    /// RFC 3339 timestamp field.
    pub fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        self.str(key)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc))
    }
}

/// Conjunction of field-equality conditions, with an optional row limit.
///
/// A missing field compares equal to `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<(String, Value)>,
    pub limit: Option<usize>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions.push((field.to_string(), value.into()));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Evaluate the conditions against a field map (limit is ignored).
    pub fn matches(&self, fields: &Fields) -> bool {
        self.conditions
            .iter()
            .all(|(k, v)| fields.get(k).unwrap_or(&Value::Null) == v)
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    fn name(&self) -> &str;

    /// Records of `collection` matching `filter`, in insertion order.
    async fn query(&self, collection: &str, filter: &Filter) -> Result<Vec<Record>>;

    /// Fetch one record by id.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>>;

    /// Insert a new record and return its store-assigned id.
    async fn insert(&self, collection: &str, fields: Fields) -> Result<String>;

    /// Atomically merge `patch` into record `id` if it currently matches
    /// `predicate`. Returns whether the update was applied. A `null` in the
    /// patch removes the field.
    async fn update_if_matches(
        &self,
        collection: &str,
        id: &str,
        predicate: &Filter,
        patch: Fields,
    ) -> Result<bool>;

    async fn delete(&self, collection: &str, id: &str) -> Result<()>;
}
