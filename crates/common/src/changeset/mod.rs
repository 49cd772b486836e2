//! Change-set builder
//!
//! Partitions the collection into records that need a write and records that
//! don't. Untracked records become creates carrying every populated field.
//! Tracked records become updates carrying only the fields that differ from
//! their baseline. A field is never written back unchanged, and a field that
//! is now empty is never written (updates don't clear store values).

use crate::models::{AttackType, Focus, Paper, PaperSnapshot, MAX_DISPLAY_AUTHORS};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Persisted fields to write; `None` means "leave as is"
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PropertyPatch {
    pub title: Option<String>,
    pub url: Option<String>,
    pub summary: Option<String>,
    pub authors: Option<Vec<String>>,
    pub published: Option<DateTime<Utc>>,
    pub focus: Option<Focus>,
    pub attack_type: Option<AttackType>,
    pub explored: Option<bool>,
}

impl PropertyPatch {
    /// Every populated persisted field, for creates
    pub fn full(current: &PaperSnapshot) -> Self {
        Self::diff(current, &PaperSnapshot::default())
    }

    /// Populated fields of `current` that differ from `baseline`
    pub fn diff(current: &PaperSnapshot, baseline: &PaperSnapshot) -> Self {
        Self {
            title: changed_text(&current.title, &baseline.title),
            url: changed_text(&current.url, &baseline.url),
            summary: changed_text(&current.summary, &baseline.summary),
            authors: changed_authors(&current.authors, &baseline.authors),
            published: current.published.filter(|_| current.published != baseline.published),
            focus: current.focus.filter(|_| current.focus != baseline.focus),
            attack_type: current
                .attack_type
                .filter(|_| current.attack_type != baseline.attack_type),
            explored: (current.explored && !baseline.explored).then_some(true),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.field_names().is_empty()
    }

    /// Names of the fields carried by this patch, in store order
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.title.is_some() {
            names.push("title");
        }
        if self.url.is_some() {
            names.push("url");
        }
        if self.summary.is_some() {
            names.push("summary");
        }
        if self.authors.is_some() {
            names.push("authors");
        }
        if self.published.is_some() {
            names.push("published");
        }
        if self.focus.is_some() {
            names.push("focus");
        }
        if self.attack_type.is_some() {
            names.push("attack_type");
        }
        if self.explored.is_some() {
            names.push("explored");
        }
        names
    }
}

fn changed_text(current: &Option<String>, baseline: &Option<String>) -> Option<String> {
    current
        .as_ref()
        .filter(|v| !v.trim().is_empty() && Some(*v) != baseline.as_ref())
        .cloned()
}

/// Compared as displayed, since the store only ever holds the capped list
fn changed_authors(current: &[String], baseline: &[String]) -> Option<Vec<String>> {
    let shown: Vec<String> = current.iter().take(MAX_DISPLAY_AUTHORS).cloned().collect();
    (!shown.is_empty() && shown != baseline).then_some(shown)
}

/// A single write for the store
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Create { patch: PropertyPatch },
    Update { page_id: Uuid, patch: PropertyPatch },
}

impl WriteOp {
    pub fn patch(&self) -> &PropertyPatch {
        match self {
            WriteOp::Create { patch } | WriteOp::Update { patch, .. } => patch,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WriteOp::Create { .. } => "create",
            WriteOp::Update { .. } => "update",
        }
    }
}

/// A pending write with enough context to log it
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    /// Position of the record in the collection
    pub position: usize,
    pub title: String,
    pub url: Option<String>,
    pub op: WriteOp,
}

/// Outcome of partitioning a collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WritePlan {
    /// Writes in collection order
    pub writes: Vec<PendingWrite>,
    pub unchanged: usize,
}

impl WritePlan {
    pub fn creates(&self) -> usize {
        self.writes
            .iter()
            .filter(|w| matches!(w.op, WriteOp::Create { .. }))
            .count()
    }

    pub fn updates(&self) -> usize {
        self.writes.len() - self.creates()
    }
}

/// Decide the write for one record, if any
pub fn plan_write(paper: &Paper) -> Option<WriteOp> {
    if !paper.has_changed() {
        return None;
    }

    let current = paper.snapshot();
    match paper.page_id {
        None => {
            let patch = PropertyPatch::full(&current);
            (!patch.is_empty()).then_some(WriteOp::Create { patch })
        }
        Some(page_id) => {
            let patch = match paper.baseline() {
                Some(baseline) => PropertyPatch::diff(&current, baseline),
                None => PropertyPatch::full(&current),
            };
            // Differences confined to in-memory fields (abstract, derived id)
            (!patch.is_empty()).then_some(WriteOp::Update { page_id, patch })
        }
    }
}

/// Partition the collection, preserving collection order
pub fn build_write_plan(papers: &[Paper]) -> WritePlan {
    let mut plan = WritePlan::default();
    for (position, paper) in papers.iter().enumerate() {
        match plan_write(paper) {
            Some(op) => plan.writes.push(PendingWrite {
                position,
                title: paper.title_prefix(),
                url: paper.url().map(str::to_string),
                op,
            }),
            None => plan.unchanged += 1,
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn loaded(title: &str) -> Paper {
        let mut paper = Paper::titled(title);
        paper.page_id = Some(Uuid::new_v4());
        paper.track_changes()
    }

    #[test]
    fn test_diff_contains_only_changed_field() {
        let mut paper = loaded("A");
        paper.summary = Some("S".into());

        match plan_write(&paper) {
            Some(WriteOp::Update { patch, .. }) => {
                assert_eq!(patch.field_names(), vec!["summary"]);
                assert_eq!(patch.summary.as_deref(), Some("S"));
                assert_eq!(patch.title, None);
            }
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_untouched_tracked_record_skipped() {
        let paper = loaded("A");
        assert_eq!(plan_write(&paper), None);
    }

    #[test]
    fn test_new_record_is_full_create() {
        let mut paper = Paper::titled("New").with_url("https://arxiv.org/abs/2408.00001");
        paper.authors = vec!["X".into()];
        paper.published = Some(Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap());
        paper.focus = Some(Focus::Defensive);

        match plan_write(&paper) {
            Some(WriteOp::Create { patch }) => {
                assert_eq!(
                    patch.field_names(),
                    vec!["title", "url", "authors", "published", "focus"]
                );
            }
            other => panic!("expected create, got {:?}", other),
        }
    }

    #[test]
    fn test_authors_capped_for_display() {
        let mut paper = loaded("A");
        paper.authors = (0..8).map(|i| format!("Author {}", i)).collect();

        let op = plan_write(&paper).unwrap();
        assert_eq!(op.patch().authors.as_ref().unwrap().len(), MAX_DISPLAY_AUTHORS);
    }

    #[test]
    fn test_longer_author_list_with_same_display_not_written() {
        let mut paper = Paper::titled("A");
        paper.page_id = Some(Uuid::new_v4());
        paper.authors = (1..=5).map(|i| format!("Author {}", i)).collect();
        let mut paper = paper.track_changes();

        paper.authors = (1..=8).map(|i| format!("Author {}", i)).collect();
        assert!(paper.has_changed());
        assert_eq!(plan_write(&paper), None);

        paper.summary = Some("S".into());
        let op = plan_write(&paper).unwrap();
        assert_eq!(op.patch().field_names(), vec!["summary"]);
    }

    #[test]
    fn test_abstract_only_change_yields_no_write() {
        let mut paper = loaded("A");
        paper.abstract_text = Some("in-memory only".into());
        assert!(paper.has_changed());
        assert_eq!(plan_write(&paper), None);
    }

    #[test]
    fn test_cleared_field_not_written() {
        let mut paper = loaded("A");
        paper.title = None;
        paper.explored = true;
        let op = plan_write(&paper).unwrap();
        assert_eq!(op.patch().field_names(), vec!["explored"]);
    }

    #[test]
    fn test_plan_preserves_collection_order() {
        let mut first = loaded("First");
        first.explored = true;
        let second = loaded("Second");
        let third = Paper::titled("Third");

        let plan = build_write_plan(&[first, second, third]);
        assert_eq!(plan.unchanged, 1);
        assert_eq!(plan.writes.len(), 2);
        assert_eq!(plan.writes[0].position, 0);
        assert_eq!(plan.writes[0].op.kind(), "update");
        assert_eq!(plan.writes[1].position, 2);
        assert_eq!(plan.writes[1].op.kind(), "create");
        assert_eq!(plan.creates(), 1);
        assert_eq!(plan.updates(), 1);
    }
}
