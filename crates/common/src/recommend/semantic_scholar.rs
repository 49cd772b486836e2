//! Semantic Scholar recommendations adapter

use super::Recommender;
use crate::config::ScholarConfig;
use crate::errors::{AppError, Result};
use crate::models::Recommendation;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const SERVICE: &str = "semantic-scholar";
const FIELDS: &str = "title,abstract,year,externalIds";

/// Semantic Scholar client, seeded by arXiv ids
pub struct SemanticScholarRecommender {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendationResponse {
    #[serde(default)]
    recommended_papers: Vec<ScholarPaper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScholarPaper {
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    year: Option<i32>,
    #[serde(default)]
    external_ids: Option<ExternalIds>,
}

#[derive(Debug, Deserialize)]
struct ExternalIds {
    #[serde(rename = "ArXiv")]
    arxiv: Option<String>,
}

impl ScholarPaper {
    fn into_recommendation(self) -> Option<Recommendation> {
        let title = self.title?.trim().to_string();
        if title.is_empty() {
            return None;
        }
        Some(Recommendation {
            title,
            canonical_id: self.external_ids.and_then(|ids| ids.arxiv),
            abstract_text: self.abstract_text.filter(|a| !a.trim().is_empty()),
            year: self.year,
        })
    }
}

impl SemanticScholarRecommender {
    pub fn new(config: &ScholarConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        })
    }
}

#[async_trait]
impl Recommender for SemanticScholarRecommender {
    async fn recommend(&self, seed_id: &str, limit: usize) -> Result<Vec<Recommendation>> {
        let url = format!("{}/papers/forpaper/arXiv:{}", self.api_base, seed_id);

        let mut request = self
            .client
            .get(&url)
            .query(&[("limit", limit.to_string()), ("fields", FIELDS.to_string())]);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::from_transport(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::from_status(SERVICE, status.as_u16(), body));
        }

        let body: RecommendationResponse =
            response.json().await.map_err(|e| AppError::MalformedRecord {
                service: SERVICE.to_string(),
                message: e.to_string(),
            })?;

        let results = parse_recommendations(body);
        debug!(seed_id, count = results.len(), "Fetched recommendations");
        Ok(results)
    }
}

fn parse_recommendations(body: RecommendationResponse) -> Vec<Recommendation> {
    body.recommended_papers
        .into_iter()
        .filter_map(ScholarPaper::into_recommendation)
        .collect()
}
