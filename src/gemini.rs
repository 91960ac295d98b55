//! Gemini API transport client.
//!
//! One authenticated client is built at startup and shared by every mode.
//! All network, auth, and provider-side failures are folded into
//! [`TransportError`] before they reach callers.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("rate limited by the API")]
    RateLimited,
    #[error("API error: {0}")]
    Api(String),
    #[error("invalid response: {0}")]
    Parse(String),
}

/// An ordered request payload fragment: plain text, or binary content
/// (an image) carried as base64 with its MIME type.
#[derive(Debug, Clone)]
pub enum Part {
    Text(String),
    Inline { mime_type: String, data: String },
}

/// Response-shaping options recognized by the provider.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Persona/task description prepended by the provider.
    pub system_instruction: String,
    /// Allow the provider to augment the answer with live web search and
    /// return citation metadata.
    pub enable_grounding: bool,
    /// Upper bound on provider-side deliberation for high-effort queries.
    pub reasoning_budget: Option<u32>,
}

/// One request to the generative API.
#[derive(Debug, Clone)]
pub struct Request {
    pub model: String,
    pub parts: Vec<Part>,
    pub options: RequestOptions,
}

/// Provider answer: concatenated candidate text plus the citation chunks
/// exactly as returned (unfiltered).
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub text: String,
    pub grounding: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroundingChunk {
    #[serde(default)]
    pub web: Option<WebSource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebSource {
    pub uri: String,
    pub title: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
    #[serde(default)]
    grounding_metadata: GroundingMetadata,
}

#[derive(Deserialize, Default)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Deserialize, Default)]
struct TextPart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

/// The seam between orchestrators and the network. Orchestrators take an
/// injected `Arc<dyn Transport>`, so tests substitute a fake.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &Request) -> Result<RawResponse, TransportError>;
}

/// Gemini API client.
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            base_url: GEMINI_API_BASE.to_string(),
        }
    }

    fn api_url(&self, model: &str) -> String {
        format!("{}/{}:generateContent", self.base_url, model)
    }

    /// Build the JSON request body for the Gemini API.
    fn build_body(request: &Request) -> Value {
        let parts: Vec<Value> = request
            .parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => json!({ "text": text }),
                Part::Inline { mime_type, data } => json!({
                    "inlineData": { "mimeType": mime_type, "data": data }
                }),
            })
            .collect();

        let mut body = json!({
            "contents": [{ "parts": parts }],
            "systemInstruction": {
                "parts": [{ "text": request.options.system_instruction }]
            },
        });

        if request.options.enable_grounding {
            body["tools"] = json!([{ "googleSearch": {} }]);
        }

        if let Some(budget) = request.options.reasoning_budget {
            body["generationConfig"] = json!({
                "thinkingConfig": { "thinkingBudget": budget }
            });
        }

        body
    }

    fn parse_response(value: Value) -> Result<RawResponse, TransportError> {
        let response: GenerateResponse =
            serde_json::from_value(value).map_err(|e| TransportError::Parse(e.to_string()))?;

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::Parse("no candidates in response".to_string()))?;

        let mut text = String::new();
        for part in &candidate.content.parts {
            text.push_str(&part.text);
        }

        Ok(RawResponse {
            text,
            grounding: candidate.grounding_metadata.grounding_chunks,
        })
    }
}

#[async_trait]
impl Transport for GeminiClient {
    async fn send(&self, request: &Request) -> Result<RawResponse, TransportError> {
        let body = Self::build_body(request);
        let url = self.api_url(&request.model);

        debug!(model = %request.model, "Gemini API request");

        let response = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(TransportError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TransportError::Api(format!("HTTP {status}: {text}")));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| TransportError::Parse(e.to_string()))?;

        Self::parse_response(json)
    }
}
