//! Text generation abstraction
//!
//! Provides:
//! - Abstract summaries
//! - Closed-set label classification
//! - Strict parsing of classifier output

mod openai;

pub use openai::OpenAiGenerator;

use crate::errors::{AppError, Result};
use crate::models::LabelChoice;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Trait for text generation providers
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// One or two sentence synopsis of `text`
    async fn summarize(&self, text: &str) -> Result<String>;

    /// Pick one of `choices` for `text`
    ///
    /// Returns `Ok(None)` when the model answers with anything other than
    /// exactly one of the label names.
    async fn classify(&self, text: &str, choices: &[LabelChoice]) -> Result<Option<String>>;
}

/// Match raw classifier output against the label names
///
/// Surrounding whitespace and backticks are ignored; everything else must
/// match exactly.
pub fn match_label(output: &str, choices: &[LabelChoice]) -> Option<String> {
    let candidate = output.trim().trim_matches('`').trim();
    choices
        .iter()
        .find(|c| c.name == candidate)
        .map(|c| c.name.to_string())
}

/// Render the label list offered in the classification prompt
pub fn render_choices(choices: &[LabelChoice]) -> String {
    choices
        .iter()
        .map(|c| match c.description {
            Some(description) => format!("- `{}`: {}", c.name, description),
            None => format!("- {}", c.name),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Mock generator for testing
///
/// Summaries are derived from the input. Classification walks the scripted
/// raw outputs and returns the first one that parses against the offered
/// label set, so a single mock can answer several label sets.
#[derive(Default)]
pub struct MockTextGenerator {
    label_outputs: Vec<String>,
    failing: bool,
    summarize_calls: AtomicUsize,
    classify_calls: AtomicUsize,
}

impl MockTextGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a raw classifier response
    pub fn with_label_output(mut self, raw: &str) -> Self {
        self.label_outputs.push(raw.to_string());
        self
    }

    /// Fail every call with an upstream error
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn summarize_calls(&self) -> usize {
        self.summarize_calls.load(Ordering::SeqCst)
    }

    pub fn classify_calls(&self) -> usize {
        self.classify_calls.load(Ordering::SeqCst)
    }

    fn check_failing(&self) -> Result<()> {
        if self.failing {
            return Err(AppError::Upstream {
                service: "mock-llm".to_string(),
                message: "generation unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn summarize(&self, text: &str) -> Result<String> {
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failing()?;
        let head: String = text.chars().take(40).collect();
        Ok(format!("Summary: {}", head.trim()))
    }

    async fn classify(&self, _text: &str, choices: &[LabelChoice]) -> Result<Option<String>> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failing()?;
        Ok(self
            .label_outputs
            .iter()
            .find_map(|raw| match_label(raw, choices)))
    }
}
