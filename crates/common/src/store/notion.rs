//! Notion database adapter
//!
//! Property layout of the paper database:
//! Title (title), URL (url), Summary (rich_text), Authors (multi_select),
//! Published (date), Focus (select), Attack Type (select), Explored (checkbox).

use super::RecordStore;
use crate::changeset::PropertyPatch;
use crate::config::NotionConfig;
use crate::errors::{AppError, Result};
use crate::models::{AttackType, Focus, Paper};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

const SERVICE: &str = "notion";
const PAGE_SIZE: u32 = 100;
/// Notion rejects rich text segments longer than this
const MAX_TEXT_LEN: usize = 2000;

const PROP_TITLE: &str = "Title";
const PROP_URL: &str = "URL";
const PROP_SUMMARY: &str = "Summary";
const PROP_AUTHORS: &str = "Authors";
const PROP_PUBLISHED: &str = "Published";
const PROP_FOCUS: &str = "Focus";
const PROP_ATTACK_TYPE: &str = "Attack Type";
const PROP_EXPLORED: &str = "Explored";

/// Notion REST client
pub struct NotionStore {
    client: reqwest::Client,
    token: String,
    api_base: String,
    api_version: String,
}

#[derive(Deserialize)]
struct QueryResponse {
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct CreatedPage {
    id: Uuid,
}

impl NotionStore {
    /// Create a new Notion client
    pub fn new(config: &NotionConfig) -> Result<Self> {
        let token = config.token.clone().ok_or_else(|| AppError::Configuration {
            message: "Notion token required".to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            token,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Notion-Version", &self.api_version)
            .send()
            .await
            .map_err(|e| AppError::from_transport(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            return Err(match AppError::from_status(SERVICE, status.as_u16(), body) {
                AppError::RateLimited { service, .. } => AppError::RateLimited {
                    service,
                    retry_after,
                },
                other => other,
            });
        }

        response
            .json()
            .await
            .map_err(|e| AppError::from_transport(SERVICE, e))
    }
}

#[async_trait]
impl RecordStore for NotionStore {
    #[instrument(skip(self))]
    async fn list_records(&self, collection_id: &str) -> Result<Vec<Paper>> {
        let url = format!("{}/databases/{}/query", self.api_base, collection_id);
        let mut cursor: Option<String> = None;
        let mut papers = Vec::new();
        let mut dropped = 0usize;

        loop {
            let mut body = json!({ "page_size": PAGE_SIZE });
            if let Some(ref c) = cursor {
                body["start_cursor"] = json!(c);
            }

            let value = self.send(self.client.post(&url).json(&body)).await?;
            let page: QueryResponse = serde_json::from_value(value)?;

            for result in &page.results {
                match decode_page(result) {
                    Some(paper) => papers.push(paper),
                    None => dropped += 1,
                }
            }

            debug!(fetched = papers.len(), has_more = page.has_more, "Fetched store page");

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        if dropped > 0 {
            info!(dropped, "Dropped pages with neither title nor url");
        }

        Ok(papers)
    }

    async fn create_record(&self, collection_id: &str, patch: &PropertyPatch) -> Result<Uuid> {
        let body = json!({
            "parent": { "database_id": collection_id },
            "properties": encode_patch(patch),
        });

        let value = self
            .send(self.client.post(format!("{}/pages", self.api_base)).json(&body))
            .await?;
        let created: CreatedPage = serde_json::from_value(value)?;
        Ok(created.id)
    }

    async fn update_record(&self, page_id: Uuid, patch: &PropertyPatch) -> Result<()> {
        let body = json!({ "properties": encode_patch(patch) });

        self.send(
            self.client
                .patch(format!("{}/pages/{}", self.api_base, page_id))
                .json(&body),
        )
        .await?;
        Ok(())
    }
}

/// Decode a database page into a tracked record. Pages with neither a title
/// nor a url, or without a valid id, cannot be represented and yield `None`.
pub fn decode_page(page: &Value) -> Option<Paper> {
    let page_id = match page.get("id").and_then(Value::as_str).map(Uuid::parse_str) {
        Some(Ok(id)) => id,
        _ => {
            warn!("Skipping page without a valid id");
            return None;
        }
    };

    let props = page.get("properties")?;

    let title = rich_text(props.get(PROP_TITLE), "title");
    let url = props
        .get(PROP_URL)
        .and_then(|p| p.get("url"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|u| !u.trim().is_empty());

    if title.is_none() && url.is_none() {
        debug!(page_id = %page_id, "Page has neither title nor url");
        return None;
    }

    let mut paper = Paper::default();
    paper.page_id = Some(page_id);
    paper.title = title;
    paper.set_url(url);
    paper.summary = rich_text(props.get(PROP_SUMMARY), "rich_text");
    paper.authors = multi_select(props.get(PROP_AUTHORS));
    paper.published = props
        .get(PROP_PUBLISHED)
        .and_then(|p| p.get("date"))
        .and_then(|d| d.get("start"))
        .and_then(Value::as_str)
        .and_then(parse_date);
    paper.focus = select(props.get(PROP_FOCUS)).and_then(|name| {
        let focus = Focus::from_label(&name);
        if focus.is_none() {
            warn!(page_id = %page_id, label = %name, "Unknown focus label in store");
        }
        focus
    });
    paper.attack_type = select(props.get(PROP_ATTACK_TYPE)).and_then(|name| {
        let attack = AttackType::from_label(&name);
        if attack.is_none() {
            warn!(page_id = %page_id, label = %name, "Unknown attack type in store");
        }
        attack
    });
    paper.explored = props
        .get(PROP_EXPLORED)
        .and_then(|p| p.get("checkbox"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Some(paper.track_changes())
}

/// Encode a patch as Notion page properties
pub fn encode_patch(patch: &PropertyPatch) -> Map<String, Value> {
    let mut props = Map::new();

    if let Some(ref title) = patch.title {
        props.insert(PROP_TITLE.into(), json!({ "title": [text_segment(title)] }));
    }
    if let Some(ref url) = patch.url {
        props.insert(PROP_URL.into(), json!({ "url": url }));
    }
    if let Some(ref summary) = patch.summary {
        props.insert(PROP_SUMMARY.into(), json!({ "rich_text": [text_segment(summary)] }));
    }
    if let Some(ref authors) = patch.authors {
        // Multi-select option names may not contain commas
        let options: Vec<Value> = authors
            .iter()
            .map(|a| {
                let name = a.replace(',', " ");
                json!({ "name": name.trim() })
            })
            .collect();
        props.insert(PROP_AUTHORS.into(), json!({ "multi_select": options }));
    }
    if let Some(published) = patch.published {
        props.insert(
            PROP_PUBLISHED.into(),
            json!({ "date": { "start": published.to_rfc3339() } }),
        );
    }
    if let Some(focus) = patch.focus {
        props.insert(PROP_FOCUS.into(), json!({ "select": { "name": focus.as_str() } }));
    }
    if let Some(attack) = patch.attack_type {
        props.insert(
            PROP_ATTACK_TYPE.into(),
            json!({ "select": { "name": attack.as_str() } }),
        );
    }
    if let Some(explored) = patch.explored {
        props.insert(PROP_EXPLORED.into(), json!({ "checkbox": explored }));
    }

    props
}

fn text_segment(content: &str) -> Value {
    let content: String = content.chars().take(MAX_TEXT_LEN).collect();
    json!({ "text": { "content": content } })
}

fn rich_text(prop: Option<&Value>, kind: &str) -> Option<String> {
    let segments = prop?.get(kind)?.as_array()?;
    let text: String = segments
        .iter()
        .filter_map(|s| {
            s.get("plain_text")
                .or_else(|| s.get("text").and_then(|t| t.get("content")))
                .and_then(Value::as_str)
        })
        .collect();
    (!text.trim().is_empty()).then_some(text)
}

fn multi_select(prop: Option<&Value>) -> Vec<String> {
    prop.and_then(|p| p.get("multi_select"))
        .and_then(Value::as_array)
        .map(|options| {
            options
                .iter()
                .filter_map(|o| o.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn select(prop: Option<&Value>) -> Option<String> {
    prop?
        .get("select")?
        .get("name")?
        .as_str()
        .map(str::to_string)
}

/// Notion dates are either full timestamps or bare dates
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
