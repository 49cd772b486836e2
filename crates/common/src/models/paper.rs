//! Paper record
//!
//! A record is either hydrated from the store (change tracking on, baseline
//! captured right after construction) or newly discovered from the index or
//! the recommendation service (tracking off, always written).

use super::external::ExternalPaper;
use super::labels::{AttackType, Focus};
use crate::identity::extract_canonical_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authors shown in the store
pub const MAX_DISPLAY_AUTHORS: usize = 5;

/// Captured field values of a record, used as the change-tracking baseline
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PaperSnapshot {
    pub title: Option<String>,
    pub url: Option<String>,
    pub canonical_id: Option<String>,
    pub abstract_text: Option<String>,
    pub summary: Option<String>,
    pub authors: Vec<String>,
    pub published: Option<DateTime<Utc>>,
    pub focus: Option<Focus>,
    pub attack_type: Option<AttackType>,
    pub explored: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Paper {
    /// Store handle; absent until the record has been created
    pub page_id: Option<Uuid>,
    pub title: Option<String>,
    url: Option<String>,
    canonical_id: Option<String>,
    pub abstract_text: Option<String>,
    pub summary: Option<String>,
    pub authors: Vec<String>,
    pub published: Option<DateTime<Utc>>,
    pub focus: Option<Focus>,
    pub attack_type: Option<AttackType>,
    pub explored: bool,
    baseline: Option<PaperSnapshot>,
}

impl Paper {
    /// Untracked record with the given title
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Untracked record built from an index result
    pub fn from_index(result: ExternalPaper) -> Self {
        let mut paper = Self::default();
        paper.apply_index_result(result);
        paper
    }

    /// Untracked, incomplete record seeded from a recommendation.
    ///
    /// Url, authors and published date are left for the enrichment pass, so the
    /// canonical id is carried ahead of the url here.
    pub fn recommended(
        title: impl Into<String>,
        canonical_id: impl Into<String>,
        abstract_text: Option<String>,
    ) -> Self {
        Self {
            title: Some(title.into()),
            canonical_id: Some(canonical_id.into()),
            abstract_text,
            ..Default::default()
        }
    }

    /// Set the url, re-deriving the canonical id from it
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.set_url(Some(url.into()));
        self
    }

    /// Enable change tracking, capturing the current values as baseline
    pub fn track_changes(mut self) -> Self {
        self.baseline = Some(self.snapshot());
        self
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn canonical_id(&self) -> Option<&str> {
        self.canonical_id.as_deref()
    }

    /// Replace the url. The canonical id follows the url whenever a url is
    /// present; it is never assigned independently.
    pub fn set_url(&mut self, url: Option<String>) {
        self.url = url;
        if let Some(url) = self.url.as_deref() {
            self.canonical_id = extract_canonical_id(url);
        }
    }

    /// Backfill a missing canonical id from the url. Returns whether the
    /// record ends up with one.
    pub fn resolve_canonical_id(&mut self) -> bool {
        if self.canonical_id.is_none() {
            if let Some(url) = self.url.as_deref() {
                self.canonical_id = extract_canonical_id(url);
            }
        }
        self.canonical_id.is_some()
    }

    /// Wholesale replacement of the identity fields from an authoritative
    /// index match
    pub fn apply_index_result(&mut self, result: ExternalPaper) {
        self.title = Some(result.title);
        self.set_url(Some(result.url));
        if self.canonical_id.is_none() {
            self.canonical_id = result.canonical_id;
        }
        self.abstract_text = Some(result.abstract_text);
        self.authors = result.authors;
        self.published = result.published;
    }

    /// Title, url, at least one author, and a publication date are all set
    pub fn complete_identity(&self) -> bool {
        non_empty(&self.title)
            && non_empty(&self.url)
            && !self.authors.is_empty()
            && self.published.is_some()
    }

    pub fn is_tracking(&self) -> bool {
        self.baseline.is_some()
    }

    pub fn baseline(&self) -> Option<&PaperSnapshot> {
        self.baseline.as_ref()
    }

    /// Always true for untracked records
    pub fn has_changed(&self) -> bool {
        match &self.baseline {
            Some(baseline) => *baseline != self.snapshot(),
            None => true,
        }
    }

    pub fn snapshot(&self) -> PaperSnapshot {
        PaperSnapshot {
            title: self.title.clone(),
            url: self.url.clone(),
            canonical_id: self.canonical_id.clone(),
            abstract_text: self.abstract_text.clone(),
            summary: self.summary.clone(),
            authors: self.authors.clone(),
            published: self.published,
            focus: self.focus,
            attack_type: self.attack_type,
            explored: self.explored,
        }
    }

    /// Source text for label classification: abstract, then summary
    pub fn label_source(&self) -> Option<&str> {
        self.abstract_text
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.summary.as_deref().filter(|s| !s.trim().is_empty()))
    }

    /// First 50 characters of the title, for log lines
    pub fn title_prefix(&self) -> String {
        self.title
            .as_deref()
            .map(|t| t.chars().take(50).collect())
            .unwrap_or_default()
    }
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}
