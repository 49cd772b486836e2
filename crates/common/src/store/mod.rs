//! Structured record store abstraction
//!
//! The store holds the persisted paper collection. Implementations must
//! page through the collection transparently and surface timeouts and rate
//! limits as transient errors (see `AppError::is_transient`).

mod notion;

pub use notion::{decode_page, encode_patch, NotionStore};

use crate::changeset::PropertyPatch;
use crate::errors::{AppError, Result};
use crate::models::Paper;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// Trait for the persistent record store
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every record in the collection, with change tracking enabled
    async fn list_records(&self, collection_id: &str) -> Result<Vec<Paper>>;

    /// Create a record, returning its new handle
    async fn create_record(&self, collection_id: &str, patch: &PropertyPatch) -> Result<Uuid>;

    /// Apply a field patch to an existing record
    async fn update_record(&self, page_id: Uuid, patch: &PropertyPatch) -> Result<()>;
}

/// In-memory store for testing, with scripted failures and call counts
#[derive(Default)]
pub struct MockStore {
    records: Vec<Paper>,
    list_failures: AtomicU32,
    write_failures: AtomicU32,
    broken_pages: Mutex<HashSet<Uuid>>,
    list_calls: AtomicUsize,
    write_calls: AtomicUsize,
    created: Mutex<Vec<PropertyPatch>>,
    updated: Mutex<Vec<(Uuid, PropertyPatch)>>,
}

impl MockStore {
    pub fn new(records: Vec<Paper>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    /// Fail the next `n` list calls with a rate limit
    pub fn with_list_failures(self, n: u32) -> Self {
        self.list_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Fail the next `n` write calls with a rate limit
    pub fn with_write_failures(self, n: u32) -> Self {
        self.write_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Reject every update to `page_id` with a permanent error
    pub fn with_broken_page(self, page_id: Uuid) -> Self {
        if let Ok(mut pages) = self.broken_pages.lock() {
            pages.insert(page_id);
        }
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> Vec<PropertyPatch> {
        self.created.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn updated(&self) -> Vec<(Uuid, PropertyPatch)> {
        self.updated.lock().map(|u| u.clone()).unwrap_or_default()
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn rate_limited() -> AppError {
        AppError::RateLimited {
            service: "mock-store".to_string(),
            retry_after: None,
        }
    }

    fn poisoned() -> AppError {
        AppError::Internal {
            message: "mock store lock poisoned".to_string(),
        }
    }
}

#[async_trait]
impl RecordStore for MockStore {
    async fn list_records(&self, _collection_id: &str) -> Result<Vec<Paper>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.list_failures) {
            return Err(Self::rate_limited());
        }
        Ok(self.records.clone())
    }

    async fn create_record(&self, _collection_id: &str, patch: &PropertyPatch) -> Result<Uuid> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.write_failures) {
            return Err(Self::rate_limited());
        }
        self.created
            .lock()
            .map_err(|_| Self::poisoned())?
            .push(patch.clone());
        Ok(Uuid::new_v4())
    }

    async fn update_record(&self, page_id: Uuid, patch: &PropertyPatch) -> Result<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .broken_pages
            .lock()
            .map_err(|_| Self::poisoned())?
            .contains(&page_id)
        {
            return Err(AppError::Upstream {
                service: "mock-store".to_string(),
                message: format!("page {} rejected the update", page_id),
            });
        }
        if Self::take_failure(&self.write_failures) {
            return Err(Self::rate_limited());
        }
        self.updated
            .lock()
            .map_err(|_| Self::poisoned())?
            .push((page_id, patch.clone()));
        Ok(())
    }
}
