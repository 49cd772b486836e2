//! arXiv export API adapter
//!
//! Queries the Atom endpoint and parses entries with `quick-xml`.

use super::PaperIndex;
use crate::config::ArxivConfig;
use crate::errors::{AppError, Result};
use crate::identity::extract_canonical_id;
use crate::models::ExternalPaper;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::time::Duration;
use tracing::{debug, instrument};

const SERVICE: &str = "arxiv";
/// Results requested per page of a bulk search
const PAGE_SIZE: usize = 100;
/// arXiv asks clients to wait between consecutive calls
const PAGE_DELAY: Duration = Duration::from_secs(3);

/// arXiv client
pub struct ArxivIndex {
    client: reqwest::Client,
    api_base: String,
}

impl ArxivIndex {
    pub fn new(config: &ArxivConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
        })
    }

    async fn fetch(&self, params: &[(&str, String)]) -> Result<Vec<ExternalPaper>> {
        let response = self
            .client
            .get(&self.api_base)
            .query(params)
            .send()
            .await
            .map_err(|e| AppError::from_transport(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::from_status(SERVICE, status.as_u16(), body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::from_transport(SERVICE, e))?;
        parse_feed(&body)
    }
}

#[async_trait]
impl PaperIndex for ArxivIndex {
    #[instrument(skip(self))]
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<ExternalPaper>> {
        let mut papers = Vec::with_capacity(max_results.min(PAGE_SIZE));

        while papers.len() < max_results {
            if !papers.is_empty() {
                tokio::time::sleep(PAGE_DELAY).await;
            }

            let wanted = PAGE_SIZE.min(max_results - papers.len());
            let page = self
                .fetch(&[
                    ("search_query", query.to_string()),
                    ("start", papers.len().to_string()),
                    ("max_results", wanted.to_string()),
                    ("sortBy", "submittedDate".to_string()),
                    ("sortOrder", "descending".to_string()),
                ])
                .await?;

            let fetched = page.len();
            papers.extend(page);
            debug!(fetched, total = papers.len(), "Fetched index page");

            if fetched < wanted {
                break;
            }
        }

        Ok(papers)
    }

    async fn search_title(&self, title: &str) -> Result<Option<ExternalPaper>> {
        let results = self
            .fetch(&[
                ("search_query", title_query(title)),
                ("max_results", "1".to_string()),
                ("sortBy", "relevance".to_string()),
            ])
            .await?;
        Ok(results.into_iter().next())
    }

    async fn lookup_by_id(&self, canonical_id: &str) -> Result<Option<ExternalPaper>> {
        let results = self
            .fetch(&[
                ("id_list", canonical_id.to_string()),
                ("max_results", "1".to_string()),
            ])
            .await?;
        Ok(results.into_iter().next())
    }
}

/// Title-field query with dashes replaced by spaces
pub fn title_query(title: &str) -> String {
    format!("ti:{}", title.replace('-', " "))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Title,
    Summary,
    Published,
    AuthorName,
}

#[derive(Default)]
struct EntryBuilder {
    id: String,
    title: String,
    summary: String,
    published: String,
    authors: Vec<String>,
}

impl EntryBuilder {
    fn push(&mut self, field: Field, text: &str) {
        match field {
            Field::Id => self.id.push_str(text),
            Field::Title => self.title.push_str(text),
            Field::Summary => self.summary.push_str(text),
            Field::Published => self.published.push_str(text),
            Field::AuthorName => match self.authors.last_mut() {
                Some(name) => name.push_str(text),
                None => self.authors.push(text.to_string()),
            },
        }
    }

    fn build(self) -> Option<ExternalPaper> {
        // Error entries (bad id_list values) point at /api/errors
        if !self.id.contains("/abs/") {
            return None;
        }
        let title = collapse_whitespace(&self.title);
        if title.is_empty() {
            return None;
        }

        Some(ExternalPaper {
            canonical_id: extract_canonical_id(&self.id),
            url: self.id.trim().to_string(),
            title,
            abstract_text: collapse_whitespace(&self.summary),
            authors: self
                .authors
                .iter()
                .map(|a| collapse_whitespace(a))
                .filter(|a| !a.is_empty())
                .collect(),
            published: DateTime::parse_from_rfc3339(self.published.trim())
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        })
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse an arXiv Atom feed into index results
pub fn parse_feed(xml: &str) -> Result<Vec<ExternalPaper>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut papers = Vec::new();
    let mut entry: Option<EntryBuilder> = None;
    let mut field: Option<Field> = None;
    let mut in_author = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"entry" => entry = Some(EntryBuilder::default()),
                b"author" => {
                    in_author = true;
                    if let Some(ref mut b) = entry {
                        b.authors.push(String::new());
                    }
                }
                b"id" => field = Some(Field::Id),
                b"title" => field = Some(Field::Title),
                b"summary" => field = Some(Field::Summary),
                b"published" => field = Some(Field::Published),
                b"name" if in_author => field = Some(Field::AuthorName),
                _ => field = None,
            },
            Ok(Event::Text(t)) => {
                if let (Some(b), Some(f)) = (entry.as_mut(), field) {
                    let text = t.unescape().map_err(|e| AppError::InvalidFormat {
                        message: format!("arXiv feed text: {}", e),
                    })?;
                    b.push(f, &text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"entry" => {
                    if let Some(paper) = entry.take().and_then(EntryBuilder::build) {
                        papers.push(paper);
                    }
                    field = None;
                }
                b"author" => {
                    in_author = false;
                    field = None;
                }
                _ => field = None,
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AppError::InvalidFormat {
                    message: format!(
                        "arXiv feed at position {}: {}",
                        reader.buffer_position(),
                        e
                    ),
                })
            }
            _ => {}
        }
    }

    Ok(papers)
}
