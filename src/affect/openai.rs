//! LLM-backed affect classifier.
//!
//! Asks a chat model to rate a chunk against the configured label set and
//! parses the JSON object it answers with.

use super::{AffectClassifier, LabelScore};
use crate::error::{CompanionError, Result};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, instrument};

const SYSTEM_PROMPT: &str = "You rate the emotional tone of podcast transcript excerpts. \
For every label you are given, return a score between 0 and 1 for how strongly the excerpt \
expresses that emotion. Scores are independent and do not need to sum to 1. \
Answer with a single JSON object mapping each label to its score and nothing else.";

/// Chat-model affect classifier with a fixed label set.
pub struct OpenAIAffectClassifier {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    labels: Vec<String>,
    object_regex: Regex,
}

impl OpenAIAffectClassifier {
    pub fn new(model: &str, labels: Vec<String>) -> Result<Self> {
        if labels.is_empty() {
            return Err(CompanionError::Config(
                "affect classifier needs at least one label".to_string(),
            ));
        }

        let object_regex = Regex::new(r"(?s)\{.*\}")
            .map_err(|e| CompanionError::Affect(format!("Invalid regex: {}", e)))?;

        Ok(Self {
            client: create_client()?,
            model: model.to_string(),
            labels,
            object_regex,
        })
    }

    fn user_prompt(&self, text: &str) -> String {
        format!(
            "Labels: {}\n\nExcerpt:\n{}",
            self.labels.join(", "),
            text.trim()
        )
    }

    /// Parse a model reply into scores in label order.
    fn parse_scores(&self, response: &str) -> Result<Vec<LabelScore>> {
        let json_str = self
            .object_regex
            .find(response)
            .map(|m| m.as_str())
            .unwrap_or(response);

        let raw: HashMap<String, f64> = serde_json::from_str(json_str).map_err(|e| {
            CompanionError::Affect(format!(
                "Failed to parse affect response: {}. Response was: {}",
                e,
                response.chars().take(500).collect::<String>()
            ))
        })?;

        let normalized: HashMap<String, f64> = raw
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v))
            .collect();

        self.labels
            .iter()
            .map(|label| {
                let score = normalized
                    .get(&label.to_lowercase())
                    .copied()
                    .ok_or_else(|| {
                        CompanionError::Affect(format!("Response is missing label '{}'", label))
                    })?;
                Ok(LabelScore::new(label.clone(), score.clamp(0.0, 1.0) as f32))
            })
            .collect()
    }
}

#[async_trait]
impl AffectClassifier for OpenAIAffectClassifier {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    #[instrument(skip(self, text), fields(chars = text.len()))]
    async fn classify(&self, text: &str) -> Result<Vec<LabelScore>> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_PROMPT)
                .build()
                .map_err(|e| CompanionError::Affect(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(self.user_prompt(text))
                .build()
                .map_err(|e| CompanionError::Affect(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.0)
            .build()
            .map_err(|e| CompanionError::Affect(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| CompanionError::OpenAI(format!("Affect classification failed: {}", e)))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| CompanionError::Affect("Empty response from LLM".to_string()))?;

        debug!(
            "Affect response: {}",
            content.chars().take(200).collect::<String>()
        );

        self.parse_scores(content)
    }
}
