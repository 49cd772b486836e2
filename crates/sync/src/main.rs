//! Paperstack Sync
//!
//! Single pass over the paper database:
//! 1. Loads every record from Notion
//! 2. Fills missing metadata from arXiv
//! 3. Optionally discovers new papers (arXiv search, Semantic Scholar)
//! 4. Generates summaries and labels with OpenAI
//! 5. Writes back only the fields that changed

mod cli;
mod errors;
mod pipeline;
mod writer;

use crate::cli::Cli;
use crate::errors::SyncError;
use crate::pipeline::{Collaborators, PipelineOptions, SyncPipeline};
use crate::writer::WriterOptions;
use clap::Parser;
use paperstack_common::{
    config::{AppConfig, ObservabilityConfig},
    index::ArxivIndex,
    llm::OpenAiGenerator,
    metrics,
    recommend::SemanticScholarRecommender,
    retry::RetryPolicy,
    store::NotionStore,
    VERSION,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration, then let flags win
    let mut config = match cli.config.as_deref() {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load()?,
    };
    cli.apply(&mut config);

    init_tracing(&config.observability);
    info!("Starting Paperstack v{}", VERSION);

    // Missing credentials abort before any external call
    config.validate().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        SyncError::from(e)
    })?;

    metrics::register_metrics();

    let collaborators = Collaborators {
        store: Arc::new(
            NotionStore::new(&config.notion).map_err(|e| SyncError::client("notion", e))?,
        ),
        index: Arc::new(ArxivIndex::new(&config.arxiv).map_err(|e| SyncError::client("arxiv", e))?),
        recommender: Arc::new(
            SemanticScholarRecommender::new(&config.scholar)
                .map_err(|e| SyncError::client("semantic-scholar", e))?,
        ),
        llm: Arc::new(OpenAiGenerator::new(&config.llm).map_err(|e| SyncError::client("openai", e))?),
    };

    let options = PipelineOptions::from_config(&config)
        .with_discovery(cli.search_arxiv, cli.search_semantic_scholar);

    info!(
        database_id = %options.collection_id,
        search_arxiv = options.search_index,
        search_semantic_scholar = options.search_recommendations,
        "Pipeline configured"
    );

    let pipeline = SyncPipeline::new(
        collaborators,
        RetryPolicy::from_config(&config.retry),
        options,
        WriterOptions::from_config(&config.notion),
    )?;

    let summary = pipeline.run().await;

    info!(
        loaded = summary.loaded,
        enriched = summary.enriched,
        unresolved = summary.unresolved,
        discovered_search = summary.discovered_search,
        discovered_recommended = summary.discovered_recommended,
        summaries = summary.summaries,
        focus_labels = summary.focus_labels,
        attack_labels = summary.attack_labels,
        created = summary.created,
        updated = summary.updated,
        unchanged = summary.unchanged,
        failed_writes = summary.failed_writes,
        "Done"
    );

    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}
