//! Ollama API client.
//!
//! One client serves both external capabilities: image extraction through a
//! multimodal model and record equivalence through a text model. Retries are
//! left to the caller; a failed call is reported once.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use super::{extract_json, prompt::semantic_match_prompt};
use crate::error::{SemanticError, SkuflowError, VisionError};
use crate::extract::vision::{VisionModel, VisionRequest};
use crate::matching::SemanticMatcher;
use crate::models::config::{SemanticConfig, VisionConfig};
use crate::models::matching::CatalogEntry;
use crate::models::record::ExtractedRecord;

/// Default Ollama API endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Request body for the generate API.
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<&'a str>,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

/// Response from the generate API.
#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Why a generate call failed.
#[derive(Debug)]
enum CallError {
    Timeout,
    Communication(String),
    InvalidResponse(String),
}

impl From<reqwest::Error> for CallError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CallError::Timeout
        } else if e.is_decode() {
            CallError::InvalidResponse(e.to_string())
        } else {
            CallError::Communication(e.to_string())
        }
    }
}

/// Client for an Ollama-compatible `/api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    endpoint: String,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a client for the given endpoint and model.
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SkuflowError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            timeout,
            client,
        })
    }

    /// Client for the configured vision model.
    pub fn for_vision(config: &VisionConfig) -> crate::Result<Self> {
        Self::new(&config.endpoint, &config.model, config.timeout())
    }

    /// Client for the configured semantic model.
    pub fn for_semantic(config: &SemanticConfig, timeout: Duration) -> crate::Result<Self> {
        Self::new(&config.endpoint, &config.model, timeout)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, images: Vec<&str>) -> Result<String, CallError> {
        let url = format!("{}/api/generate", self.endpoint);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: "json",
            images,
            options: GenerateOptions { temperature: 0.0 },
        };

        debug!("POST {} (model {})", url, self.model);
        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CallError::Communication(format!("HTTP {}: {}", status, text)));
        }

        let reply: GenerateResponse = response.json().await?;
        trace!("Model reply: {}", reply.response);
        Ok(reply.response)
    }
}

#[async_trait]
impl VisionModel for OllamaClient {
    async fn extract(&self, request: &VisionRequest) -> Result<String, VisionError> {
        self.generate(&request.prompt, vec![request.image_base64.as_str()])
            .await
            .map_err(|e| match e {
                CallError::Timeout => VisionError::Timeout(self.timeout.as_millis() as u64),
                CallError::Communication(m) => VisionError::Communication(m),
                CallError::InvalidResponse(m) => VisionError::InvalidResponse(m),
            })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl SemanticMatcher for OllamaClient {
    async fn evaluate(&self, extracted: &ExtractedRecord, candidate: &CatalogEntry) -> Result<f64, SemanticError> {
        let prompt = semantic_match_prompt(extracted, candidate);
        let raw = self
            .generate(&prompt, Vec::new())
            .await
            .map_err(|e| match e {
                CallError::Timeout => SemanticError::Timeout,
                CallError::Communication(m) => SemanticError::Communication(m),
                CallError::InvalidResponse(m) => SemanticError::InvalidResponse(m),
            })?;
        parse_confidence(&raw)
    }
}

/// Smallest bare value read as a percentage.
const PERCENT_FLOOR: f64 = 2.0;

/// Read `{"confidence": x}` or a bare number.
///
/// A trailing `%` or a value of at least 2 is read as a percentage. Values
/// between 1 and 2 are out of range rather than tiny percentages.
pub fn parse_confidence(raw: &str) -> Result<f64, SemanticError> {
    let body = extract_json(raw);
    let (body, percent) = match body.strip_suffix('%') {
        Some(number) => (number.trim_end(), true),
        None => (body, false),
    };
    let value: Value = serde_json::from_str(body)?;
    let number = match &value {
        Value::Number(n) => n.as_f64(),
        Value::Object(map) => map.get("confidence").and_then(Value::as_f64),
        _ => None,
    }
    .ok_or_else(|| SemanticError::InvalidResponse(format!("no confidence in '{}'", raw.trim())))?;

    let number = if percent || (PERCENT_FLOOR..=100.0).contains(&number) {
        number / 100.0
    } else {
        number
    };
    if !(0.0..=1.0).contains(&number) {
        return Err(SemanticError::InvalidResponse(format!("confidence out of range: {}", number)));
    }
    Ok(number)
}
