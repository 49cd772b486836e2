//! Sync pipeline
//!
//! One sequential pass over the in-memory collection:
//! 1. Load records from the store (tracked, baseline captured)
//! 2. Normalise (explore cutoff, author cap)
//! 3. Backfill canonical ids from urls
//! 4. Fill incomplete records from the paper index
//! 5. Discover new papers (index search, recommendations), then fill again
//! 6. Generate summaries, focus labels and attack-type labels
//! 7. Write back only what changed
//!
//! Stages never overlap, so dedup always sees a stable collection. Per-record
//! failures are logged and skipped; nothing after configuration validation
//! aborts the run.

use crate::errors::SyncError;
use crate::writer::{BatchWriter, WriteReport, WriterOptions};
use chrono::{DateTime, Utc};
use paperstack_common::config::AppConfig;
use paperstack_common::identity::{normalize_title, DedupIndex};
use paperstack_common::index::PaperIndex;
use paperstack_common::llm::TextGenerator;
use paperstack_common::metrics;
use paperstack_common::models::{AttackType, ExternalPaper, Focus, LabelChoice, Paper};
use paperstack_common::recommend::Recommender;
use paperstack_common::retry::RetryPolicy;
use paperstack_common::store::RecordStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// External collaborators of a run
pub struct Collaborators {
    pub store: Arc<dyn RecordStore>,
    pub index: Arc<dyn PaperIndex>,
    pub recommender: Arc<dyn Recommender>,
    pub llm: Arc<dyn TextGenerator>,
}

/// What a run does and with which limits
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub collection_id: String,
    pub search_index: bool,
    pub search_recommendations: bool,
    pub search_query: String,
    pub search_max_results: usize,
    pub recommend_max_results: usize,
    pub min_year: i32,
    pub explore_cutoff: Option<DateTime<Utc>>,
    pub author_cap: usize,
}

impl PipelineOptions {
    /// Discovery stages are off until enabled explicitly
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            collection_id: config.database_id().to_string(),
            search_index: false,
            search_recommendations: false,
            search_query: config.arxiv.search_query.clone(),
            search_max_results: config.arxiv.max_results,
            recommend_max_results: config.scholar.max_results,
            min_year: config.scholar.min_year,
            explore_cutoff: config.pipeline.explore_cutoff,
            author_cap: config.pipeline.author_cap,
        }
    }

    pub fn with_discovery(mut self, search_index: bool, search_recommendations: bool) -> Self {
        self.search_index = search_index;
        self.search_recommendations = search_recommendations;
        self
    }
}

/// Counts from one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub loaded: usize,
    pub enriched: usize,
    pub unresolved: usize,
    pub discovered_search: usize,
    pub discovered_recommended: usize,
    pub summaries: usize,
    pub focus_labels: usize,
    pub attack_labels: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed_writes: usize,
}

impl RunSummary {
    fn record_writes(&mut self, report: WriteReport) {
        self.created = report.created;
        self.updated = report.updated;
        self.unchanged = report.unchanged;
        self.failed_writes = report.failed;
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct FillOutcome {
    enriched: usize,
    unresolved: usize,
}

pub struct SyncPipeline {
    store: Arc<dyn RecordStore>,
    index: Arc<dyn PaperIndex>,
    recommender: Arc<dyn Recommender>,
    llm: Arc<dyn TextGenerator>,
    retry: RetryPolicy,
    writer: BatchWriter,
    options: PipelineOptions,
}

impl SyncPipeline {
    pub fn new(
        collaborators: Collaborators,
        retry: RetryPolicy,
        options: PipelineOptions,
        writer_options: WriterOptions,
    ) -> Result<Self, SyncError> {
        if options.collection_id.trim().is_empty() {
            return Err(SyncError::Configuration(
                "a target collection id is required".to_string(),
            ));
        }

        let writer = BatchWriter::new(collaborators.store.clone(), retry, writer_options);

        Ok(Self {
            store: collaborators.store,
            index: collaborators.index,
            recommender: collaborators.recommender,
            llm: collaborators.llm,
            retry,
            writer,
            options,
        })
    }

    /// Run every stage in order
    #[instrument(skip(self), fields(collection = %self.options.collection_id))]
    pub async fn run(&self) -> RunSummary {
        let mut summary = RunSummary::default();

        let mut papers = self.load().await;
        summary.loaded = papers.len();

        self.normalize(&mut papers);
        self.resolve_identities(&mut papers);

        let first = self.fill_from_index(&mut papers).await;
        summary.enriched = first.enriched;
        summary.unresolved = first.unresolved;

        let discovered_from = papers.len();
        if self.options.search_index {
            summary.discovered_search = self.discover_from_index(&mut papers).await;
        }
        if self.options.search_recommendations {
            summary.discovered_recommended = self.discover_recommendations(&mut papers).await;
        }

        if papers.len() > discovered_from {
            let second = self.fill_from_index(&mut papers[discovered_from..]).await;
            summary.enriched += second.enriched;
            summary.unresolved += second.unresolved;
        }

        summary.summaries = self.generate_summaries(&mut papers).await;
        summary.focus_labels = self.assign_focus(&mut papers).await;
        summary.attack_labels = self.assign_attack_types(&mut papers).await;

        let report = self
            .writer
            .write_changes(&self.options.collection_id, &mut papers)
            .await;
        summary.record_writes(report);

        summary
    }

    /// Every stored record; an exhausted read degrades to an empty collection
    async fn load(&self) -> Vec<Paper> {
        let collection_id = self.options.collection_id.as_str();
        match self
            .retry
            .run("list_records", || self.store.list_records(collection_id))
            .await
        {
            Ok(papers) => {
                info!(count = papers.len(), "Loaded existing records");
                metrics::record_loaded(papers.len());
                papers
            }
            Err(e) => {
                error!(error = %e, "Failed to load records, continuing with an empty collection");
                Vec::new()
            }
        }
    }

    /// Mark old papers explored and cap author lists
    fn normalize(&self, papers: &mut [Paper]) {
        let cap = self.options.author_cap;
        for paper in papers.iter_mut() {
            if let (Some(cutoff), Some(published)) = (self.options.explore_cutoff, paper.published)
            {
                if published < cutoff {
                    paper.explored = true;
                }
            }
            if paper.authors.len() > cap {
                paper.authors.truncate(cap);
            }
        }
    }

    fn resolve_identities(&self, papers: &mut [Paper]) {
        for paper in papers.iter_mut() {
            if paper.canonical_id().is_some() {
                continue;
            }
            if paper.url().is_some() && !paper.resolve_canonical_id() {
                debug!(
                    title = %paper.title_prefix(),
                    url = paper.url().unwrap_or_default(),
                    "No canonical id in url"
                );
            }
        }
    }

    /// Fill title, url, abstract, authors and published date for every
    /// record lacking complete identity
    async fn fill_from_index(&self, papers: &mut [Paper]) -> FillOutcome {
        let mut outcome = FillOutcome::default();

        for paper in papers.iter_mut() {
            if paper.complete_identity() {
                continue;
            }

            let Some(result) = self.find_in_index(paper).await else {
                warn!(
                    title = %paper.title_prefix(),
                    url = paper.url().unwrap_or("-"),
                    "Could not find paper in the index"
                );
                metrics::record_enrichment(false);
                outcome.unresolved += 1;
                continue;
            };

            if let Some(title) = paper.title.as_deref().filter(|t| !t.trim().is_empty()) {
                if normalize_title(title) != normalize_title(&result.title) {
                    let found: String = result.title.chars().take(50).collect();
                    warn!(
                        title = %paper.title_prefix(),
                        found = %found,
                        url = paper.url().unwrap_or("-"),
                        "Title mismatch, leaving record as is"
                    );
                    metrics::record_enrichment(false);
                    outcome.unresolved += 1;
                    continue;
                }
            }

            paper.apply_index_result(result);
            debug!(title = %paper.title_prefix(), "Filled from index");
            metrics::record_enrichment(true);
            outcome.enriched += 1;
        }

        if outcome.enriched + outcome.unresolved > 0 {
            info!(
                enriched = outcome.enriched,
                unresolved = outcome.unresolved,
                "Index enrichment finished"
            );
        }
        outcome
    }

    /// Lookup by canonical id, falling back to the title
    async fn find_in_index(&self, paper: &Paper) -> Option<ExternalPaper> {
        if let Some(id) = paper.canonical_id() {
            match self
                .retry
                .run("lookup_by_id", || self.index.lookup_by_id(id))
                .await
            {
                Ok(Some(found)) => return Some(found),
                Ok(None) => debug!(canonical_id = id, "No index entry for id"),
                Err(e) => warn!(canonical_id = id, error = %e, "Index lookup failed"),
            }
        }

        let title = paper.title.as_deref().filter(|t| !t.trim().is_empty())?;
        match self
            .retry
            .run("search_title", || self.index.search_title(title))
            .await
        {
            Ok(found) => found,
            Err(e) => {
                warn!(title = %paper.title_prefix(), error = %e, "Index title search failed");
                None
            }
        }
    }

    /// Append search results that don't duplicate the collection
    #[instrument(skip(self, papers))]
    async fn discover_from_index(&self, papers: &mut Vec<Paper>) -> usize {
        let results = match self
            .retry
            .run("search", || {
                self.index
                    .search(&self.options.search_query, self.options.search_max_results)
            })
            .await
        {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "Index search failed");
                return 0;
            }
        };

        let mut seen = DedupIndex::from_papers(papers.iter());
        let mut added = 0;
        for result in results {
            let paper = Paper::from_index(result);
            match seen.admit(&paper) {
                Ok(()) => {
                    debug!(title = %paper.title_prefix(), "New paper from search");
                    papers.push(paper);
                    added += 1;
                }
                Err(reason) => {
                    debug!(title = %paper.title_prefix(), ?reason, "Skipping duplicate");
                }
            }
        }

        info!(added, "Index search finished");
        metrics::record_discovered("search", added);
        added
    }

    /// Seed the recommendation service with every unexplored record and
    /// append the filtered results as incomplete records
    #[instrument(skip(self, papers))]
    async fn discover_recommendations(&self, papers: &mut Vec<Paper>) -> usize {
        let limit = self.options.recommend_max_results * 2;
        let mut collected = Vec::new();
        let mut seeds = 0;

        for paper in papers.iter_mut() {
            if paper.explored {
                continue;
            }
            let Some(seed) = paper.canonical_id().map(str::to_string) else {
                continue;
            };

            match self
                .retry
                .run("recommend", || self.recommender.recommend(&seed, limit))
                .await
            {
                Ok(results) => collected.extend(results),
                Err(e) => warn!(
                    title = %paper.title_prefix(),
                    canonical_id = %seed,
                    error = %e,
                    "Recommendation lookup failed"
                ),
            }
            // One shot per record, whatever came back
            paper.explored = true;
            seeds += 1;
        }

        if seeds == 0 {
            info!("All papers have been explored");
            return 0;
        }

        let mut seen = DedupIndex::from_papers(papers.iter());
        let mut survivors = Vec::new();
        for rec in collected {
            if survivors.len() >= self.options.recommend_max_results {
                break;
            }
            let Some(canonical_id) = rec.canonical_id else {
                continue;
            };
            if !rec.year.is_some_and(|year| year >= self.options.min_year) {
                continue;
            }

            let paper = Paper::recommended(rec.title, canonical_id, rec.abstract_text);
            if seen.admit(&paper).is_ok() {
                survivors.push(paper);
            }
        }

        let added = survivors.len();
        papers.extend(survivors);
        info!(seeds, added, "Recommendation discovery finished");
        metrics::record_discovered("recommendations", added);
        added
    }

    async fn generate_summaries(&self, papers: &mut [Paper]) -> usize {
        let mut generated = 0;
        for paper in papers.iter_mut() {
            if paper.summary.as_deref().is_some_and(|s| !s.trim().is_empty()) {
                continue;
            }
            let Some(text) = paper.abstract_text.as_deref().filter(|a| !a.trim().is_empty())
            else {
                continue;
            };

            match self
                .retry
                .run("summarize", || self.llm.summarize(text))
                .await
            {
                Ok(summary) if !summary.trim().is_empty() => {
                    debug!(title = %paper.title_prefix(), "Generated summary");
                    paper.summary = Some(summary);
                    metrics::record_label("summary");
                    generated += 1;
                }
                Ok(_) => warn!(title = %paper.title_prefix(), "Empty summary returned"),
                Err(e) => warn!(title = %paper.title_prefix(), error = %e, "Summary failed"),
            }
        }
        generated
    }

    async fn assign_focus(&self, papers: &mut [Paper]) -> usize {
        let choices = Focus::choices();
        let mut assigned = 0;
        for paper in papers.iter_mut().filter(|p| p.focus.is_none()) {
            if let Some(focus) = self
                .classify(paper, "focus", &choices)
                .await
                .and_then(|label| Focus::from_label(&label))
            {
                paper.focus = Some(focus);
                assigned += 1;
            }
        }
        assigned
    }

    async fn assign_attack_types(&self, papers: &mut [Paper]) -> usize {
        let choices = AttackType::choices();
        let mut assigned = 0;
        for paper in papers.iter_mut().filter(|p| p.attack_type.is_none()) {
            if let Some(attack_type) = self
                .classify(paper, "attack_type", &choices)
                .await
                .and_then(|label| AttackType::from_label(&label))
            {
                paper.attack_type = Some(attack_type);
                assigned += 1;
            }
        }
        assigned
    }

    /// Classify from the abstract, falling back to the summary. `None` leaves
    /// the label unset for a later run.
    async fn classify(&self, paper: &Paper, kind: &str, choices: &[LabelChoice]) -> Option<String> {
        let text = paper.label_source()?;
        match self
            .retry
            .run("classify", || self.llm.classify(text, choices))
            .await
        {
            Ok(Some(label)) => {
                debug!(title = %paper.title_prefix(), kind, label = %label, "Assigned label");
                metrics::record_label(kind);
                Some(label)
            }
            Ok(None) => {
                warn!(title = %paper.title_prefix(), kind, "No valid label returned");
                None
            }
            Err(e) => {
                warn!(title = %paper.title_prefix(), kind, error = %e, "Classification failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use paperstack_common::index::MockIndex;
    use paperstack_common::llm::MockTextGenerator;
    use paperstack_common::models::Recommendation;
    use paperstack_common::recommend::MockRecommender;
    use paperstack_common::store::MockStore;
    use std::time::Duration;
    use uuid::Uuid;

    struct Harness {
        store: Arc<MockStore>,
        index: Arc<MockIndex>,
        recommender: Arc<MockRecommender>,
        llm: Arc<MockTextGenerator>,
    }

    impl Harness {
        fn new(store: MockStore, index: MockIndex) -> Self {
            Self {
                store: Arc::new(store),
                index: Arc::new(index),
                recommender: Arc::new(MockRecommender::new()),
                llm: Arc::new(MockTextGenerator::new()),
            }
        }

        fn with_recommender(mut self, recommender: MockRecommender) -> Self {
            self.recommender = Arc::new(recommender);
            self
        }

        fn with_llm(mut self, llm: MockTextGenerator) -> Self {
            self.llm = Arc::new(llm);
            self
        }

        fn pipeline(&self, options: PipelineOptions) -> SyncPipeline {
            SyncPipeline::new(
                Collaborators {
                    store: self.store.clone(),
                    index: self.index.clone(),
                    recommender: self.recommender.clone(),
                    llm: self.llm.clone(),
                },
                RetryPolicy::new(5, Duration::from_millis(1)),
                options,
                WriterOptions {
                    batch_size: 10,
                    batch_pause: Duration::ZERO,
                    write_pause: Duration::ZERO,
                },
            )
            .unwrap()
        }
    }

    fn options() -> PipelineOptions {
        PipelineOptions {
            collection_id: "db".to_string(),
            explore_cutoff: None,
            ..PipelineOptions::from_config(&AppConfig::default())
        }
    }

    fn published(year: i32, month: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).unwrap()
    }

    fn index_entry(title: &str, id: &str) -> ExternalPaper {
        ExternalPaper {
            title: title.to_string(),
            url: format!("http://arxiv.org/abs/{}v1", id),
            canonical_id: Some(id.to_string()),
            abstract_text: format!("Abstract of {}", title),
            authors: vec!["Ada Lovelace".to_string(), "Alan Turing".to_string()],
            published: Some(published(2024, 8)),
        }
    }

    fn stored(title: &str) -> Paper {
        let mut paper = Paper::titled(title);
        paper.page_id = Some(Uuid::new_v4());
        paper.track_changes()
    }

    fn stored_complete(title: &str, id: &str) -> Paper {
        let mut paper = Paper::titled(title).with_url(format!("https://arxiv.org/abs/{}", id));
        paper.page_id = Some(Uuid::new_v4());
        paper.authors = vec!["Grace Hopper".to_string()];
        paper.published = Some(published(2024, 9));
        paper.summary = Some("Already summarised".to_string());
        paper.focus = Some(Focus::Safety);
        paper.attack_type = Some(AttackType::Other);
        paper.track_changes()
    }

    fn recommendation(title: &str, id: Option<&str>, year: Option<i32>) -> Recommendation {
        Recommendation {
            title: title.to_string(),
            canonical_id: id.map(str::to_string),
            abstract_text: Some(format!("Abstract of {}", title)),
            year,
        }
    }

    #[tokio::test]
    async fn test_paper_x_is_filled_and_updated() {
        let record = stored("Paper X");
        let page_id = record.page_id.unwrap();
        let harness = Harness::new(
            MockStore::new(vec![record]),
            MockIndex::new(vec![index_entry("Paper X", "2408.01234")]),
        );

        let summary = harness.pipeline(options()).run().await;

        assert_eq!(summary.loaded, 1);
        assert_eq!(summary.enriched, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.created, 0);
        assert_eq!(harness.index.title_calls(), 1);

        let updated = harness.store.updated();
        assert_eq!(updated.len(), 1);
        let (id, patch) = &updated[0];
        assert_eq!(*id, page_id);
        assert_eq!(patch.title, None);
        assert_eq!(patch.url.as_deref(), Some("http://arxiv.org/abs/2408.01234v1"));
        assert_eq!(patch.authors.as_ref().map(Vec::len), Some(2));
        assert_eq!(patch.published, Some(published(2024, 8)));
        assert!(patch.summary.is_some());
    }

    #[tokio::test]
    async fn test_paper_x_fill_marks_record_changed() {
        let harness = Harness::new(
            MockStore::default(),
            MockIndex::new(vec![index_entry("Paper X", "2408.01234")]),
        );
        let pipeline = harness.pipeline(options());
        let mut papers = vec![stored("Paper X")];
        assert!(!papers[0].has_changed());

        let outcome = pipeline.fill_from_index(&mut papers).await;

        assert_eq!(outcome.enriched, 1);
        assert!(papers[0].complete_identity());
        assert_eq!(papers[0].canonical_id(), Some("2408.01234"));
        assert!(papers[0].has_changed());
    }

    #[tokio::test]
    async fn test_unsaved_paper_x_is_created() {
        let harness = Harness::new(
            MockStore::new(vec![Paper::titled("Paper X")]),
            MockIndex::new(vec![index_entry("Paper X", "2408.01234")]),
        );

        let summary = harness.pipeline(options()).run().await;

        assert_eq!(summary.created, 1);
        let created = harness.store.created();
        assert_eq!(created[0].title.as_deref(), Some("Paper X"));
        assert!(created[0].url.is_some());
    }

    #[tokio::test]
    async fn test_complete_records_make_no_calls() {
        let harness = Harness::new(
            MockStore::new(vec![stored_complete("Done", "2409.00001")]),
            MockIndex::default(),
        );

        let summary = harness.pipeline(options()).run().await;

        assert_eq!(harness.index.total_calls(), 0);
        assert_eq!(harness.llm.summarize_calls(), 0);
        assert_eq!(harness.llm.classify_calls(), 0);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(harness.store.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_id_lookup_falls_back_to_title() {
        let record = Paper::titled("Paper Y").with_url("https://arxiv.org/abs/2401.99999");
        let harness = Harness::new(
            MockStore::default(),
            MockIndex::new(vec![index_entry("Paper Y", "2401.00042")]),
        );
        let pipeline = harness.pipeline(options());
        let mut papers = vec![record];

        let outcome = pipeline.fill_from_index(&mut papers).await;

        assert_eq!(outcome.enriched, 1);
        assert_eq!(harness.index.id_calls(), 1);
        assert_eq!(harness.index.title_calls(), 1);
        assert_eq!(papers[0].canonical_id(), Some("2401.00042"));
    }

    #[tokio::test]
    async fn test_title_mismatch_leaves_record_untouched() {
        let record = stored("Paper Z").with_url("https://arxiv.org/abs/2401.00001");
        let harness = Harness::new(
            MockStore::default(),
            MockIndex::new(vec![index_entry("Something Else Entirely", "2401.00001")]),
        );
        let pipeline = harness.pipeline(options());
        let mut papers = vec![record];

        let outcome = pipeline.fill_from_index(&mut papers).await;

        assert_eq!(outcome.enriched, 0);
        assert_eq!(outcome.unresolved, 1);
        assert_eq!(papers[0].title.as_deref(), Some("Paper Z"));
        assert!(papers[0].authors.is_empty());
    }

    #[tokio::test]
    async fn test_no_match_is_not_an_error() {
        let harness = Harness::new(
            MockStore::new(vec![stored("Unknown Paper")]),
            MockIndex::default(),
        );

        let summary = harness.pipeline(options()).run().await;

        assert_eq!(summary.unresolved, 1);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(harness.store.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_search_dedup_is_idempotent() {
        let existing = stored_complete("Existing Paper", "2409.00001");
        let results = vec![
            index_entry("New Paper", "2410.00001"),
            index_entry("  existing   PAPER ", "2410.00002"),
            index_entry("Same Id Different Title", "2409.00001"),
            index_entry("Another New Paper", "2410.00003"),
            index_entry("New Paper", "2410.00004"),
        ];
        let harness = Harness::new(
            MockStore::default(),
            MockIndex::default().with_search_results(results),
        );
        let pipeline = harness.pipeline(options());
        let mut papers = vec![existing];

        let first = pipeline.discover_from_index(&mut papers).await;
        let size_after_once = papers.len();
        let second = pipeline.discover_from_index(&mut papers).await;

        assert_eq!(first, 2);
        assert_eq!(second, 0);
        assert_eq!(size_after_once, 3);
        assert_eq!(papers.len(), size_after_once);
        assert_eq!(papers[1].title.as_deref(), Some("New Paper"));
        assert_eq!(papers[1].canonical_id(), Some("2410.00001"));
    }

    #[tokio::test]
    async fn test_explored_once_per_record() {
        let mut seed_a = stored_complete("Seed A", "2409.00001");
        seed_a.explored = false;
        let mut seed_b = stored_complete("Seed B", "2409.00002");
        seed_b.explored = false;
        let no_id = stored("No Id");

        let recommender = MockRecommender::new().failing_for("2409.00002");
        let harness = Harness::new(MockStore::default(), MockIndex::default())
            .with_recommender(recommender);
        let pipeline = harness.pipeline(options());
        let mut papers = vec![seed_a, seed_b, no_id];

        pipeline.discover_recommendations(&mut papers).await;

        assert!(papers[0].explored);
        assert!(papers[1].explored);
        assert!(!papers[2].explored);
        assert_eq!(harness.recommender.calls(), 2);
        assert_eq!(harness.recommender.seeds(), vec!["2409.00001", "2409.00002"]);

        pipeline.discover_recommendations(&mut papers).await;
        assert_eq!(harness.recommender.calls(), 2);
    }

    #[tokio::test]
    async fn test_recommendation_filters() {
        let mut seed = stored_complete("Seed", "2409.00001");
        seed.explored = false;
        let mut known = stored_complete("Known Paper", "2409.00002");
        known.explored = false;

        let recommender = MockRecommender::new()
            .with_results(
                "2409.00001",
                vec![
                    recommendation("No Index Id", None, Some(2024)),
                    recommendation("First", Some("2410.00001"), Some(2024)),
                    recommendation("First Again", Some("2410.00001"), Some(2024)),
                    recommendation("known paper", Some("2410.00002"), Some(2024)),
                ],
            )
            .with_results(
                "2409.00002",
                vec![
                    recommendation("Too Old", Some("2410.00003"), Some(2015)),
                    recommendation("No Year", Some("2410.00004"), None),
                    recommendation("Second", Some("2410.00005"), Some(2018)),
                    recommendation("Over The Cap", Some("2410.00006"), Some(2024)),
                ],
            );
        let harness = Harness::new(MockStore::default(), MockIndex::default())
            .with_recommender(recommender);
        let pipeline = harness.pipeline(PipelineOptions {
            recommend_max_results: 2,
            ..options()
        });
        let mut papers = vec![seed, known];

        let added = pipeline.discover_recommendations(&mut papers).await;

        assert_eq!(added, 2);
        let titles: Vec<_> = papers[2..]
            .iter()
            .map(|p| p.title.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(titles, vec!["First", "Second"]);

        let first = &papers[2];
        assert_eq!(first.canonical_id(), Some("2410.00001"));
        assert_eq!(first.url(), None);
        assert!(first.authors.is_empty());
        assert!(!first.is_tracking());
    }

    #[tokio::test]
    async fn test_recommended_papers_are_filled_in_second_pass() {
        let mut seed = stored_complete("Seed", "2409.00001");
        seed.explored = false;

        let recommender = MockRecommender::new().with_results(
            "2409.00001",
            vec![recommendation("Related Work", Some("2410.00001"), Some(2024))],
        );
        let harness = Harness::new(
            MockStore::new(vec![seed]),
            MockIndex::new(vec![index_entry("Related Work", "2410.00001")]),
        )
        .with_recommender(recommender);

        let summary = harness
            .pipeline(options().with_discovery(false, true))
            .run()
            .await;

        assert_eq!(summary.discovered_recommended, 1);
        assert_eq!(summary.enriched, 1);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(harness.index.id_calls(), 1);

        let created = &harness.store.created()[0];
        assert_eq!(created.title.as_deref(), Some("Related Work"));
        assert_eq!(created.url.as_deref(), Some("http://arxiv.org/abs/2410.00001v1"));
        assert!(created.published.is_some());

        let (_, seed_patch) = &harness.store.updated()[0];
        assert_eq!(seed_patch.field_names(), vec!["explored"]);
    }

    #[tokio::test]
    async fn test_classifier_garbage_leaves_labels_unset() {
        let mut paper = Paper::titled("Labelled");
        paper.page_id = Some(Uuid::new_v4());
        paper.abstract_text = Some("We study prompt injection.".to_string());
        let paper = paper.track_changes();
        let llm = MockTextGenerator::new().with_label_output("I would say Offensive");
        let harness = Harness::new(MockStore::default(), MockIndex::default()).with_llm(llm);
        let pipeline = harness.pipeline(options());
        let mut papers = vec![paper];

        assert_eq!(pipeline.assign_focus(&mut papers).await, 0);
        assert_eq!(pipeline.assign_attack_types(&mut papers).await, 0);

        assert_eq!(papers[0].focus, None);
        assert_eq!(papers[0].attack_type, None);
        assert!(!papers[0].has_changed());
    }

    #[tokio::test]
    async fn test_labels_and_summary_assigned() {
        let mut from_abstract = stored("From Abstract");
        from_abstract.abstract_text = Some("We study prompt injection.".to_string());
        let mut from_summary = stored("From Summary");
        from_summary.summary = Some("Defends against jailbreaks.".to_string());
        let no_source = stored("No Source");

        let llm = MockTextGenerator::new()
            .with_label_output("Defensive")
            .with_label_output("`Prompt Injection`");
        let harness = Harness::new(MockStore::default(), MockIndex::default()).with_llm(llm);
        let pipeline = harness.pipeline(options());
        let mut papers = vec![from_abstract, from_summary, no_source];

        assert_eq!(pipeline.generate_summaries(&mut papers).await, 1);
        assert_eq!(pipeline.assign_focus(&mut papers).await, 2);
        assert_eq!(pipeline.assign_attack_types(&mut papers).await, 2);

        assert!(papers[0].summary.is_some());
        assert_eq!(papers[1].summary.as_deref(), Some("Defends against jailbreaks."));
        assert_eq!(papers[0].focus, Some(Focus::Defensive));
        assert_eq!(papers[1].attack_type, Some(AttackType::PromptInjection));
        assert_eq!(papers[2].focus, None);
        assert_eq!(harness.llm.summarize_calls(), 1);
        assert_eq!(harness.llm.classify_calls(), 4);
    }

    #[tokio::test]
    async fn test_generation_failures_are_skipped() {
        let mut paper = stored("Flaky");
        paper.abstract_text = Some("Abstract".to_string());
        let harness = Harness::new(MockStore::default(), MockIndex::default())
            .with_llm(MockTextGenerator::failing());
        let pipeline = harness.pipeline(options());
        let mut papers = vec![paper];

        assert_eq!(pipeline.generate_summaries(&mut papers).await, 0);
        assert_eq!(pipeline.assign_focus(&mut papers).await, 0);
        assert_eq!(papers[0].summary, None);
        // Permanent errors are not retried
        assert_eq!(harness.llm.summarize_calls(), 1);
    }

    #[tokio::test]
    async fn test_load_recovers_after_four_failures() {
        let harness = Harness::new(
            MockStore::new(vec![stored_complete("Done", "2409.00001")]).with_list_failures(4),
            MockIndex::default(),
        );

        let summary = harness.pipeline(options()).run().await;

        assert_eq!(summary.loaded, 1);
        assert_eq!(harness.store.list_calls(), 5);
    }

    #[tokio::test]
    async fn test_exhausted_load_degrades_to_empty() {
        let harness = Harness::new(
            MockStore::new(vec![stored_complete("Done", "2409.00001")]).with_list_failures(5),
            MockIndex::default(),
        );

        let summary = harness.pipeline(options()).run().await;

        assert_eq!(summary, RunSummary::default());
        assert_eq!(harness.store.list_calls(), 5);
        assert_eq!(harness.store.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_normalization_is_persisted() {
        let mut old = stored_complete("Old Paper", "2301.00001");
        old.explored = false;
        old.published = Some(published(2023, 3));
        old.authors = (1..=7).map(|i| format!("Author {}", i)).collect();
        let old = old.track_changes();

        let harness = Harness::new(MockStore::new(vec![old]), MockIndex::default());
        let summary = harness
            .pipeline(PipelineOptions {
                explore_cutoff: Some(published(2024, 7)),
                ..options()
            })
            .run()
            .await;

        assert_eq!(summary.updated, 1);
        let (_, patch) = &harness.store.updated()[0];
        assert_eq!(patch.explored, Some(true));
        assert_eq!(patch.authors.as_ref().map(Vec::len), Some(5));
    }

    #[test]
    fn test_requires_collection_id() {
        let harness = Harness::new(MockStore::default(), MockIndex::default());
        let result = SyncPipeline::new(
            Collaborators {
                store: harness.store.clone(),
                index: harness.index.clone(),
                recommender: harness.recommender.clone(),
                llm: harness.llm.clone(),
            },
            RetryPolicy::default(),
            PipelineOptions::from_config(&AppConfig::default()),
            WriterOptions::from_config(&AppConfig::default().notion),
        );

        assert!(matches!(result, Err(SyncError::Configuration(_))));
    }
}
