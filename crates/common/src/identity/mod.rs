//! Identity resolution
//!
//! Derives the canonical (arXiv-style) identifier from a url and decides
//! whether a candidate record duplicates one already in the collection.
//! Two records are duplicates when their normalised titles match or their
//! canonical ids match. First seen wins; later duplicates are dropped.

use crate::models::Paper;
use regex_lite::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn canonical_id_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            // 4-digit yymm, dot, 4 or 5 digit sequence; version suffix dropped
            Regex::new(r"(\d{4}\.\d{4,5})(?:v\d+)?").ok()
        })
        .as_ref()
}

/// Extract the canonical id from a url; `None` means unresolvable
pub fn extract_canonical_id(url: &str) -> Option<String> {
    canonical_id_pattern()?
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Trim, collapse inner whitespace and case-fold a title
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Why a candidate was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duplicate {
    Title,
    CanonicalId,
}

/// Seen titles and canonical ids of a collection
#[derive(Debug, Default, Clone)]
pub struct DedupIndex {
    titles: HashSet<String>,
    canonical_ids: HashSet<String>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every record of an existing collection
    pub fn from_papers<'a>(papers: impl IntoIterator<Item = &'a Paper>) -> Self {
        let mut index = Self::new();
        for paper in papers {
            index.insert(paper.title.as_deref(), paper.canonical_id());
        }
        index
    }

    pub fn insert(&mut self, title: Option<&str>, canonical_id: Option<&str>) {
        if let Some(title) = title.map(normalize_title).filter(|t| !t.is_empty()) {
            self.titles.insert(title);
        }
        if let Some(id) = canonical_id {
            self.canonical_ids.insert(id.to_string());
        }
    }

    pub fn contains_title(&self, title: &str) -> bool {
        self.titles.contains(&normalize_title(title))
    }

    pub fn contains_id(&self, canonical_id: &str) -> bool {
        self.canonical_ids.contains(canonical_id)
    }

    /// Check a candidate without recording it
    pub fn check(&self, title: Option<&str>, canonical_id: Option<&str>) -> Option<Duplicate> {
        if title.is_some_and(|t| self.contains_title(t)) {
            return Some(Duplicate::Title);
        }
        if canonical_id.is_some_and(|id| self.contains_id(id)) {
            return Some(Duplicate::CanonicalId);
        }
        None
    }

    /// Record the candidate if it is new. Returns the rejection reason
    /// otherwise.
    pub fn admit(&mut self, paper: &Paper) -> Result<(), Duplicate> {
        match self.check(paper.title.as_deref(), paper.canonical_id()) {
            Some(dup) => Err(dup),
            None => {
                self.insert(paper.title.as_deref(), paper.canonical_id());
                Ok(())
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty() && self.canonical_ids.is_empty()
    }
}
