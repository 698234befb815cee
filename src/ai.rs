// src/ai.rs

//! Drafting practice questions through an OpenAI-compatible chat API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::config::{AiConfig, MAX_GENERATED_QUESTIONS};
use crate::models::question::{
    Approach, CreateQuestionRequest, Difficulty, Domain, QuestionOption,
};

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("question generation is disabled")]
    Disabled,
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("generator returned HTTP {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("generator returned an empty response")]
    EmptyResponse,
    #[error("invalid generator output: {0}")]
    InvalidOutput(String),
}

/// What the admin asked for.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateRequest {
    #[validate(length(min = 3, max = 300))]
    pub topic: String,
    pub domain: Domain,
    pub approach: Option<Approach>,
    pub difficulty: Option<Difficulty>,
    #[validate(range(min = 1, max = 10))]
    pub count: usize,
    pub exam_id: Option<i64>,
}

#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    fn enabled(&self) -> bool;

    /// Returns drafts ready to insert. Drafts are always inactive.
    async fn generate(&self, req: &GenerateRequest)
    -> Result<Vec<CreateQuestionRequest>, GeneratorError>;
}

#[derive(Clone)]
pub struct OpenAiGenerator {
    client: Client,
    config: Option<AiConfig>,
}

impl OpenAiGenerator {
    pub fn new(config: Option<AiConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl QuestionGenerator for OpenAiGenerator {
    fn enabled(&self) -> bool {
        self.config.is_some()
    }

    async fn generate(
        &self,
        req: &GenerateRequest,
    ) -> Result<Vec<CreateQuestionRequest>, GeneratorError> {
        let config = self.config.as_ref().ok_or(GeneratorError::Disabled)?;

        let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        let payload = ChatRequest {
            model: config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: build_prompt(req),
                },
            ],
            temperature: 0.7,
        };

        tracing::info!(topic = %req.topic, count = req.count, "requesting generated questions");

        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GeneratorError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(GeneratorError::EmptyResponse)?;

        parse_generated(&content, req)
    }
}

const SYSTEM_PROMPT: &str = "You write PMP certification practice questions. \
Answer with a JSON array only, no prose. Each element has: \
\"statement\" (string), \"options\" (array of {\"id\": \"A\".., \"text\": string}, 4 items), \
\"correct_option_ids\" (array of option ids), \"explanation\" (string).";

fn build_prompt(req: &GenerateRequest) -> String {
    let approach = req
        .approach
        .map(|a| format!("{a:?}").to_lowercase())
        .unwrap_or_else(|| "any".to_string());
    let difficulty = format!("{:?}", req.difficulty.unwrap_or_default()).to_lowercase();
    format!(
        "Write {} situational questions about \"{}\" for the {} domain. \
         Delivery approach: {}. Difficulty: {}.",
        req.count,
        req.topic,
        req.domain.as_str(),
        approach,
        difficulty
    )
}

#[derive(Debug, Deserialize)]
struct GeneratedQuestion {
    statement: String,
    options: Vec<QuestionOption>,
    correct_option_ids: Vec<String>,
    explanation: Option<String>,
}

/// Parses model output into sanitized drafts. Tolerates a surrounding ```json fence.
/// Invalid items are dropped; an output with no valid item is an error.
pub fn parse_generated(
    content: &str,
    req: &GenerateRequest,
) -> Result<Vec<CreateQuestionRequest>, GeneratorError> {
    let trimmed = content.trim();
    let json = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);

    let items: Vec<GeneratedQuestion> = serde_json::from_str(json.trim())
        .map_err(|e| GeneratorError::InvalidOutput(e.to_string()))?;

    let drafts: Vec<CreateQuestionRequest> = items
        .into_iter()
        .take(req.count.min(MAX_GENERATED_QUESTIONS))
        .map(|item| CreateQuestionRequest {
            statement: item.statement,
            options: item.options,
            correct_option_ids: item.correct_option_ids,
            explanation: item.explanation,
            domain: req.domain,
            approach: req.approach.unwrap_or(Approach::Predictive),
            difficulty: req.difficulty.unwrap_or_default(),
            is_active: false,
            exam_id: req.exam_id,
        })
        .filter(|draft| match draft.validate() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Dropping generated question: {}", e);
                false
            }
        })
        .map(CreateQuestionRequest::sanitized)
        .collect();

    if drafts.is_empty() {
        return Err(GeneratorError::InvalidOutput(
            "no valid question in output".to_string(),
        ));
    }
    Ok(drafts)
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(count: usize) -> GenerateRequest {
        GenerateRequest {
            topic: "risk responses".into(),
            domain: Domain::Process,
            approach: Some(Approach::Hybrid),
            difficulty: None,
            count,
            exam_id: None,
        }
    }

    const ONE: &str = r#"[{
        "statement": "A risk owner leaves. What next?",
        "options": [
            {"id": "A", "text": "Assign a new owner"},
            {"id": "B", "text": "Close the risk"},
            {"id": "C", "text": "Escalate"},
            {"id": "D", "text": "Wait"}
        ],
        "correct_option_ids": ["A"],
        "explanation": "Every risk needs an owner."
    }]"#;

    #[test]
    fn parses_fenced_output_as_inactive_drafts() {
        let content = format!("```json\n{ONE}\n```");
        let drafts = parse_generated(&content, &request(3)).unwrap();
        assert_eq!(drafts.len(), 1);
        assert!(!drafts[0].is_active);
        assert_eq!(drafts[0].approach, Approach::Hybrid);
        assert_eq!(drafts[0].difficulty, Difficulty::Medium);
    }

    #[test]
    fn drops_items_with_bad_answer_key() {
        let bad = ONE.replace(r#"["A"]"#, r#"["Z"]"#);
        let err = parse_generated(&bad, &request(1)).unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidOutput(_)));
    }

    #[test]
    fn prose_is_invalid_output() {
        assert!(matches!(
            parse_generated("Sure! Here are some questions.", &request(1)),
            Err(GeneratorError::InvalidOutput(_))
        ));
    }

    #[tokio::test]
    async fn disabled_generator_refuses() {
        let generator = OpenAiGenerator::new(None);
        assert!(!generator.enabled());
        assert!(matches!(
            generator.generate(&request(1)).await,
            Err(GeneratorError::Disabled)
        ));
    }
}
