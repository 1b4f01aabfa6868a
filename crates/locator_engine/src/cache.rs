use std::collections::BTreeMap;
use std::sync::Arc;

use locator_core::{normalize_query, Timestamp};
use serde::{Deserialize, Serialize};

use crate::store::{load_record, save_record, DurableStore, StoreError};

pub const RESULT_CACHE_KEY: &str = "result_cache_v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub candidate_id: String,
    pub recorded_at: Timestamp,
}

/// Normalized query -> candidate id of its last confirmed match.
///
/// Entries never expire; the last write for a query wins.
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn DurableStore>,
}

impl ResultCache {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store }
    }

    pub fn lookup(&self, query: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entry(query)?.map(|entry| entry.candidate_id))
    }

    pub fn entry(&self, query: &str) -> Result<Option<CacheEntry>, StoreError> {
        let mut entries = self.entries()?;
        Ok(entries.remove(&normalize_query(query)))
    }

    pub fn record(
        &self,
        query: &str,
        candidate_id: &str,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries()?;
        entries.insert(
            normalize_query(query),
            CacheEntry {
                candidate_id: candidate_id.to_string(),
                recorded_at: now,
            },
        );
        save_record(self.store.as_ref(), RESULT_CACHE_KEY, &entries)
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    fn entries(&self) -> Result<BTreeMap<String, CacheEntry>, StoreError> {
        Ok(load_record(self.store.as_ref(), RESULT_CACHE_KEY)?.unwrap_or_default())
    }
}
