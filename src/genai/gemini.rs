//! Gemini `generateContent` REST client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::prompt::{
    description_prompt, extract_content_between, parse_synthetic_response,
    synthetic_examples_prompt, RESULT_END, RESULT_START,
};
use super::{LlmClient, ObjectKind, DEFAULT_MODEL};
use crate::error::{EnrichError, EnrichResult};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content>,
    generation_config: &'a GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

/// Sampling parameters sent with each request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    top_p: f32,
    top_k: u32,
}

const DESCRIPTION_CONFIG: GenerationConfig = GenerationConfig {
    temperature: 0.3,
    max_output_tokens: 150,
    top_p: 0.9,
    top_k: 40,
};

const SYNTHETIC_CONFIG: GenerationConfig = GenerationConfig {
    temperature: 0.5,
    max_output_tokens: 500,
    top_p: 0.9,
    top_k: 40,
};

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate.
    fn first_text(&self) -> EnrichResult<&str> {
        let candidate = self
            .candidates
            .first()
            .ok_or_else(|| EnrichError::query("empty response from Gemini API"))?;
        candidate
            .content
            .as_ref()
            .and_then(|c| c.parts.first())
            .and_then(|p| p.text.as_deref())
            .ok_or_else(|| {
                EnrichError::query(format!(
                    "incomplete response from Gemini API, finish reason: {}",
                    candidate.finish_reason.as_deref().unwrap_or("unknown")
                ))
            })
    }
}

/// Map a non-success HTTP status onto the error taxonomy.
fn status_error(status: StatusCode, body: &str) -> EnrichError {
    let message = format!("Gemini API returned {status}: {}", body.trim());
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            EnrichError::InvalidInput(message)
        }
        StatusCode::NOT_FOUND => EnrichError::InvalidInput(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => EnrichError::Timeout(message),
        _ => EnrichError::QueryExecution(message),
    }
}

/// [`LlmClient`] backed by the Gemini REST API.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// Create a client. An empty API key is rejected; an empty model falls
    /// back to [`DEFAULT_MODEL`].
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> EnrichResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(EnrichError::invalid_input(
                "cannot create Gemini client: API key is missing",
            ));
        }

        let mut model = model.into();
        if model.trim().is_empty() {
            info!(model = DEFAULT_MODEL, "Gemini model not specified, using default");
            model = DEFAULT_MODEL.to_string();
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            api_key,
            model,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: String, config: &GenerationConfig) -> EnrichResult<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: Some(prompt) }],
            }],
            generation_config: config,
        };

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let body: GenerateContentResponse = response.json().await?;
        body.first_text().map(str::to_string)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate_description(
        &self,
        kind: ObjectKind,
        name: &str,
        parent: &str,
        context: &str,
    ) -> EnrichResult<String> {
        if context.trim().is_empty() {
            return Ok(String::new());
        }

        let text = self
            .generate(description_prompt(kind, name, parent, context), &DESCRIPTION_CONFIG)
            .await?;

        match extract_content_between(&text, RESULT_START, RESULT_END) {
            Some(description) => {
                debug!(kind = kind.as_str(), name, parent, model = %self.model, "generated description");
                Ok(description.to_string())
            }
            None => {
                warn!(kind = kind.as_str(), name, parent, "no <result> tags in Gemini response");
                Ok(String::new())
            }
        }
    }

    async fn generate_synthetic_examples(
        &self,
        column: &str,
        table: &str,
        data_type: &str,
        examples: &[String],
    ) -> EnrichResult<(Vec<String>, bool)> {
        if examples.is_empty() {
            return Ok((Vec::new(), false));
        }

        let text = self
            .generate(
                synthetic_examples_prompt(column, table, data_type, examples),
                &SYNTHETIC_CONFIG,
            )
            .await?;

        let (values, synthesized) = parse_synthetic_response(&text, examples);
        if synthesized {
            info!(table, column, count = values.len(), "replaced likely PII examples with synthetic values");
        }
        Ok((values, synthesized))
    }

    async fn validate_api_key(&self) -> EnrichResult<()> {
        let response = self
            .http
            .get(format!("{}/models", self.base_url))
            .query(&[("pageSize", "1")])
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(match status_error(status, &body) {
            EnrichError::InvalidInput(message) => EnrichError::InvalidInput(format!(
                "invalid Gemini API key or insufficient permissions: {message}"
            )),
            other => other,
        })
    }
}
