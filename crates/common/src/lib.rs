//! Paperstack Common Library
//!
//! Shared code for the paper sync tooling including:
//! - Paper records with change tracking
//! - Identity resolution and deduplication
//! - Change-set building for write-back
//! - Retry/backoff policy
//! - Store, index, recommendation and text-generation clients
//! - Error types, configuration and metrics

pub mod changeset;
pub mod config;
pub mod errors;
pub mod identity;
pub mod index;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod recommend;
pub mod retry;
pub mod store;

// Re-export commonly used types
pub use changeset::{build_write_plan, PropertyPatch, WriteOp, WritePlan};
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use identity::DedupIndex;
pub use index::PaperIndex;
pub use llm::TextGenerator;
pub use models::{AttackType, ExternalPaper, Focus, Paper, Recommendation};
pub use recommend::Recommender;
pub use retry::RetryPolicy;
pub use store::RecordStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
