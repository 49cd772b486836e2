//! OpenAI chat completions adapter

use super::{match_label, render_choices, TextGenerator};
use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use crate::models::LabelChoice;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const SERVICE: &str = "openai";

const SUMMARY_PROMPT: &str = "You will be provided with an abstract of a scientific paper. \
Compress this abstract in 1-2 sentences. Use very concise language usable as bullet points \
on a slide deck. Respond ONLY with your summary.";

const SUMMARY_TEMPERATURE: f32 = 0.5;
const SUMMARY_MAX_TOKENS: usize = 100;
const LABEL_TEMPERATURE: f32 = 0.5;
const LABEL_MAX_TOKENS: usize = 10;

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

/// OpenAI-backed generator
pub struct OpenAiGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    summary_model: String,
    label_model: String,
}

impl OpenAiGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AppError::Configuration {
                message: "llm.api_key is required".to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            api_key,
            summary_model: config.summary_model.clone(),
            label_model: config.label_model.clone(),
        })
    }

    async fn complete(
        &self,
        model: &str,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: usize,
    ) -> Result<String> {
        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens,
            temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::from_transport(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::from_status(SERVICE, status.as_u16(), body));
        }

        let chat: ChatResponse = response.json().await.map_err(|e| AppError::MalformedRecord {
            service: SERVICE.to_string(),
            message: format!("Failed to parse completion: {}", e),
        })?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| AppError::MalformedRecord {
                service: SERVICE.to_string(),
                message: "Empty response from model".to_string(),
            })
    }
}

/// System prompt for a classification over `choices`
pub(super) fn label_prompt(choices: &[LabelChoice]) -> String {
    let mut prompt = String::from(
        "You will be provided with an abstract of a scientific paper. \
         Assess the most applicable label based on the target audience, research focus, \
         produced materials, and key outcomes.\n\n",
    );
    prompt.push_str(&render_choices(choices));
    prompt.push_str("\n\n");
    if choices.iter().any(|c| c.name == "Other") {
        prompt.push_str("If none of the labels apply, respond with \"Other\".\n\n");
    }
    prompt.push_str(
        "Respond with ONLY ONE of the labels above. Do not include anything else in your response.",
    );
    prompt
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    #[instrument(skip(self, text), fields(chars = text.len()))]
    async fn summarize(&self, text: &str) -> Result<String> {
        self.complete(
            &self.summary_model,
            SUMMARY_PROMPT,
            text,
            SUMMARY_TEMPERATURE,
            SUMMARY_MAX_TOKENS,
        )
        .await
    }

    #[instrument(skip(self, text, choices), fields(chars = text.len()))]
    async fn classify(&self, text: &str, choices: &[LabelChoice]) -> Result<Option<String>> {
        let output = self
            .complete(
                &self.label_model,
                &label_prompt(choices),
                text,
                LABEL_TEMPERATURE,
                LABEL_MAX_TOKENS,
            )
            .await?;

        let label = match_label(&output, choices);
        if label.is_none() {
            debug!(output = %output, "Classifier returned no valid label");
        }
        Ok(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttackType, Focus};

    #[test]
    fn test_requires_api_key() {
        let config = LlmConfig::default();
        let err = OpenAiGenerator::new(&config).err().unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_endpoint_from_base() {
        let config = LlmConfig {
            api_key: Some("sk-test".to_string()),
            api_base: "http://localhost:8080/v1/".to_string(),
            ..Default::default()
        };
        let generator = OpenAiGenerator::new(&config).unwrap();
        assert_eq!(generator.endpoint, "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_label_prompt_lists_choices() {
        let prompt = label_prompt(&Focus::choices());
        assert!(prompt.contains("- Offensive\n- Defensive"));
        assert!(prompt.contains("respond with \"Other\""));

        let prompt = label_prompt(&AttackType::choices());
        assert!(prompt.contains("- `Prompt Injection`: "));
    }

    #[test]
    fn test_parse_completion() {
        let chat: ChatResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":" Safety "}}]}"#,
        )
        .unwrap();
        assert_eq!(chat.choices[0].message.content.as_deref(), Some(" Safety "));
    }
}
