//! HTTP client for the content-analysis service
//!
//! Speaks an OpenAI-style chat-completions API: one JSON POST per call,
//! the model instructed to answer with JSON only.

use crate::analysis::{AnalysisError, AnalysisResult, Analyzer};
use crate::config::AnalysisConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How much page text is sent with one analysis request
const ANALYSIS_TEXT_LIMIT: usize = 3000;

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
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
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Analysis fields as the model reports them; everything defaulted so a
/// sparse but valid JSON answer still parses
#[derive(Debug, Deserialize)]
struct WireAnalysis {
    #[serde(default = "default_language")]
    language: String,
    #[serde(default)]
    languages: Vec<String>,
    #[serde(default = "default_category")]
    category: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default = "default_importance")]
    importance_score: u8,
}

fn default_language() -> String {
    "unknown".to_string()
}

fn default_category() -> String {
    "general".to_string()
}

fn default_importance() -> u8 {
    5
}

/// Chat-completions client implementing [`Analyzer`]
pub struct AnalysisClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl AnalysisClient {
    /// Creates a client from config, reading the API key from the
    /// configured environment variable
    pub fn new(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            AnalysisError::Permanent(format!(
                "API key environment variable '{}' is not set",
                config.api_key_env
            ))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AnalysisError::Permanent(format!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
        })
    }

    /// Sends one chat request and returns the assistant message content
    async fn complete(
        &self,
        system: String,
        user: String,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, AnalysisError> {
        let request = ChatRequest {
            model: self.model.clone(),
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
            temperature,
            max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::Permanent(format!("unparseable response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AnalysisError::Permanent("response contained no choices".to_string()))
    }
}

#[async_trait]
impl Analyzer for AnalysisClient {
    async fn analyze(
        &self,
        text: &str,
        url: &str,
        title: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let truncated: String = text.chars().take(ANALYSIS_TEXT_LIMIT).collect();

        let system = "You are an expert content analyst specializing in multilingual \
                      websites. Respond only with valid JSON."
            .to_string();

        let user = format!(
            "Analyze the following web page content and provide a JSON object with:\n\
             1. \"language\": primary language (lowercase name, or \"mixed\")\n\
             2. \"languages\": every language present, only if more than one\n\
             3. \"category\": a short content category tag\n\
             4. \"summary\": a 2-3 sentence summary\n\
             5. \"keywords\": up to 5 key topics\n\
             6. \"importance_score\": 1-10, where 10 is most important\n\n\
             URL: {}\nTitle: {}\nContent:\n{}\n\nRespond with valid JSON only.",
            url,
            title.unwrap_or(""),
            truncated
        );

        let content = self.complete(system, user, 0.3, 500).await?;
        let wire: WireAnalysis = serde_json::from_str(strip_code_fences(&content))
            .map_err(|e| AnalysisError::Permanent(format!("unparseable analysis JSON: {}", e)))?;

        Ok(AnalysisResult {
            language: wire.language.trim().to_lowercase(),
            languages: wire
                .languages
                .iter()
                .map(|l| l.trim().to_lowercase())
                .filter(|l| !l.is_empty())
                .collect(),
            category: wire.category,
            summary: wire.summary,
            keywords: wire.keywords,
            importance: wire.importance_score.clamp(1, 10),
        })
    }

    async fn translate(
        &self,
        text: &str,
        target_language: &str,
    ) -> Result<String, AnalysisError> {
        let system = format!(
            "You are a professional translator. Translate content accurately to {}, \
             preserving formatting and meaning.",
            target_language
        );

        let user = format!(
            "Translate the following text to {}. Maintain the original formatting and \
             structure. If the text is already in {}, return it unchanged.\n\n{}",
            target_language, target_language, text
        );

        self.complete(system, user, 0.1, 2000).await
    }
}

/// Classifies an HTTP status from the analysis service
fn classify_status(status: StatusCode) -> AnalysisError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        AnalysisError::Transient(format!("HTTP {}", status.as_u16()))
    } else {
        AnalysisError::Permanent(format!("HTTP {}", status.as_u16()))
    }
}

/// Classifies a transport-level failure
fn classify_transport_error(error: reqwest::Error) -> AnalysisError {
    if error.is_timeout() || error.is_connect() {
        AnalysisError::Transient(error.to_string())
    } else {
        AnalysisError::Permanent(error.to_string())
    }
}

/// Models often wrap JSON answers in markdown code fences
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open.strip_suffix("```").unwrap_or(without_open).trim()
}
