//! # AlgoPulse Store
//!
//! `Store` implementations:
//! - `SqliteStore`: durable, one JSON document table, WAL journal
//! - `MemoryStore`: process-local, for tests and dry runs
//!
//! Both guarantee that `update_if_matches` checks its predicate and applies
//! its patch as one atomic step.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use pulse_core::config::StoreConfig;
use pulse_core::error::{PulseError, Result};
use pulse_core::traits::store::Fields;
use pulse_core::Store;
use std::sync::Arc;

/// Open the backend named in config.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn Store>> {
    match config.backend.as_str() {
        "sqlite" => {
            let path = config.expanded_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    PulseError::StoreUnavailable(format!("create {}: {e}", parent.display()))
                })?;
            }
            Ok(Arc::new(SqliteStore::open(&path)?))
        }
        "memory" => Ok(Arc::new(MemoryStore::new())),
        other => Err(PulseError::Config(format!("unknown store backend '{other}'"))),
    }
}

/// RFC 7396 merge: `null` removes a field, anything else overwrites it.
pub(crate) fn merge_patch(target: &mut Fields, patch: Fields) {
    for (k, v) in patch {
        if v.is_null() {
            target.remove(&k);
        } else {
            target.insert(k, v);
        }
    }
}

/// Field names become JSON paths in SQL; keep them to identifier characters.
pub(crate) fn validate_field(name: &str) -> Result<()> {
    let ok = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok {
        Ok(())
    } else {
        Err(PulseError::InvalidRecord(format!("invalid field name '{name}'")))
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
