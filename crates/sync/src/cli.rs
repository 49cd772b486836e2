//! CLI argument definitions for Paperstack.

use clap::Parser;
use paperstack_common::config::AppConfig;

/// Paperstack - keeps a Notion paper database deduplicated and enriched.
///
/// Loads every record, fills missing metadata from arXiv, optionally discovers
/// new papers, generates summaries and labels, and writes back only what changed.
#[derive(Parser, Debug, Default)]
#[command(name = "paperstack")]
#[command(author, version, about = "Sync and enrich a Notion paper database", long_about = None)]
pub struct Cli {
    /// Notion integration token
    #[arg(long, env = "NOTION_TOKEN", hide_env_values = true)]
    pub notion_token: Option<String>,

    /// Notion database holding the papers
    #[arg(long, env = "NOTION_DATABASE_ID")]
    pub database_id: Option<String>,

    /// OpenAI API token
    #[arg(long, env = "OPENAI_API_TOKEN", hide_env_values = true)]
    pub openai_token: Option<String>,

    /// Semantic Scholar API key (optional, raises rate limits)
    #[arg(long, env = "SEMANTIC_SCHOLAR_API_KEY", hide_env_values = true)]
    pub semantic_scholar_key: Option<String>,

    /// arXiv query used by --search-arxiv
    #[arg(long)]
    pub arxiv_search_query: Option<String>,

    /// Search arXiv for new papers
    #[arg(long)]
    pub search_arxiv: bool,

    /// Pull related papers from Semantic Scholar for unexplored records
    #[arg(long)]
    pub search_semantic_scholar: bool,

    /// Load configuration from this file instead of config/{default,APP_ENV,local}
    #[arg(short, long)]
    pub config: Option<String>,
}

impl Cli {
    /// Flags win over file and environment configuration
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(token) = &self.notion_token {
            config.notion.token = Some(token.clone());
        }
        if let Some(id) = &self.database_id {
            config.notion.database_id = Some(id.clone());
        }
        if let Some(token) = &self.openai_token {
            config.llm.api_key = Some(token.clone());
        }
        if let Some(key) = &self.semantic_scholar_key {
            config.scholar.api_key = Some(key.clone());
        }
        if let Some(query) = &self.arxiv_search_query {
            config.arxiv.search_query = query.clone();
        }
    }
}
