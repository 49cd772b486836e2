//! Recommendation service abstraction

mod semantic_scholar;

pub use semantic_scholar::SemanticScholarRecommender;

use crate::errors::{AppError, Result};
use crate::models::Recommendation;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Trait for recommendation providers
#[async_trait]
pub trait Recommender: Send + Sync {
    /// Papers related to the seed, at most `limit` of them
    async fn recommend(&self, seed_id: &str, limit: usize) -> Result<Vec<Recommendation>>;
}

/// Mock recommender for testing
///
/// Seeds without scripted results return an empty list; seeds registered with
/// [`MockRecommender::failing_for`] return an upstream error.
#[derive(Default)]
pub struct MockRecommender {
    results: HashMap<String, Vec<Recommendation>>,
    failing: Vec<String>,
    calls: AtomicUsize,
    seeds: Mutex<Vec<String>>,
}

impl MockRecommender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(mut self, seed_id: &str, results: Vec<Recommendation>) -> Self {
        self.results.insert(seed_id.to_string(), results);
        self
    }

    pub fn failing_for(mut self, seed_id: &str) -> Self {
        self.failing.push(seed_id.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Seeds queried so far, in call order
    pub fn seeds(&self) -> Vec<String> {
        self.seeds.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Recommender for MockRecommender {
    async fn recommend(&self, seed_id: &str, limit: usize) -> Result<Vec<Recommendation>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seeds) = self.seeds.lock() {
            seeds.push(seed_id.to_string());
        }

        if self.failing.iter().any(|s| s == seed_id) {
            return Err(AppError::Upstream {
                service: "mock-recommender".to_string(),
                message: format!("no recommendations for {}", seed_id),
            });
        }

        Ok(self
            .results
            .get(seed_id)
            .map(|r| r.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
