//! Result shapes returned by the paper index and recommendation service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A paper as returned by the academic index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalPaper {
    pub title: String,
    pub url: String,
    pub canonical_id: Option<String>,
    pub abstract_text: String,
    pub authors: Vec<String>,
    pub published: Option<DateTime<Utc>>,
}

/// A paper suggested by the recommendation service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    /// Index identifier; absent when the service has no index mapping
    pub canonical_id: Option<String>,
    pub abstract_text: Option<String>,
    pub year: Option<i32>,
}
