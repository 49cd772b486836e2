//! Academic paper index abstraction
//!
//! Provides lookups used to complete a record's identity and the bulk search
//! used for new-paper discovery.

mod arxiv;

pub use arxiv::{parse_feed, title_query, ArxivIndex};

use crate::errors::Result;
use crate::identity::normalize_title;
use crate::models::ExternalPaper;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Trait for the paper index
#[async_trait]
pub trait PaperIndex: Send + Sync {
    /// Bulk search, newest first
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<ExternalPaper>>;

    /// Best match for a title, if any
    async fn search_title(&self, title: &str) -> Result<Option<ExternalPaper>>;

    /// Exact lookup by canonical id
    async fn lookup_by_id(&self, canonical_id: &str) -> Result<Option<ExternalPaper>>;
}

/// Fixed-catalogue index for testing, counting every call
#[derive(Default)]
pub struct MockIndex {
    catalogue: Vec<ExternalPaper>,
    search_results: Vec<ExternalPaper>,
    search_calls: AtomicUsize,
    title_calls: AtomicUsize,
    id_calls: AtomicUsize,
}

impl MockIndex {
    /// Papers reachable by title or id lookup
    pub fn new(catalogue: Vec<ExternalPaper>) -> Self {
        Self {
            catalogue,
            ..Default::default()
        }
    }

    /// Papers returned by bulk search, in order
    pub fn with_search_results(mut self, results: Vec<ExternalPaper>) -> Self {
        self.search_results = results;
        self
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn title_calls(&self) -> usize {
        self.title_calls.load(Ordering::SeqCst)
    }

    pub fn id_calls(&self) -> usize {
        self.id_calls.load(Ordering::SeqCst)
    }

    /// Total lookups of any kind
    pub fn total_calls(&self) -> usize {
        self.search_calls() + self.title_calls() + self.id_calls()
    }
}

#[async_trait]
impl PaperIndex for MockIndex {
    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<ExternalPaper>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.search_results.iter().take(max_results).cloned().collect())
    }

    async fn search_title(&self, title: &str) -> Result<Option<ExternalPaper>> {
        self.title_calls.fetch_add(1, Ordering::SeqCst);
        let wanted = normalize_title(title);
        Ok(self
            .catalogue
            .iter()
            .find(|p| normalize_title(&p.title) == wanted)
            .cloned())
    }

    async fn lookup_by_id(&self, canonical_id: &str) -> Result<Option<ExternalPaper>> {
        self.id_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .catalogue
            .iter()
            .find(|p| p.canonical_id.as_deref() == Some(canonical_id))
            .cloned())
    }
}
