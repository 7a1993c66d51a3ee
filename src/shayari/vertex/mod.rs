//! Vertex AI backends: Veo clip generation and Gemini text/audio calls.

pub mod prompts;
pub mod transcribe;
pub mod veo;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tokio::process::Command;
use tokio::sync::Mutex;

use super::config::ServiceConfig;
use super::error::{GenerationFailure, PipelineError};
use crate::ui::prelude::*;

pub use transcribe::GeminiAligner;
pub use veo::VeoGenerator;

const TOKEN_LIFETIME: Duration = Duration::from_secs(45 * 60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Bearer token from configuration, or from the gcloud CLI cached for a
/// bounded lifetime.
pub struct TokenSource {
    fixed: Option<String>,
    cached: Mutex<Option<(String, Instant)>>,
}

impl TokenSource {
    pub fn new(fixed: Option<String>) -> Self {
        Self {
            fixed,
            cached: Mutex::new(None),
        }
    }

    pub async fn bearer(&self) -> Result<String, PipelineError> {
        if let Some(token) = &self.fixed {
            return Ok(token.clone());
        }
        if let Some(token) = self.fresh_cached().await {
            return Ok(token);
        }

        // gcloud runs outside the lock; concurrent misses each fetch a token.
        let token = fetch_gcloud_token().await?;
        self.remember(token.clone(), Instant::now()).await;
        Ok(token)
    }

    async fn fresh_cached(&self) -> Option<String> {
        let cached = self.cached.lock().await;
        cached
            .as_ref()
            .filter(|(_, fetched)| fetched.elapsed() < TOKEN_LIFETIME)
            .map(|(token, _)| token.clone())
    }

    async fn remember(&self, token: String, fetched: Instant) {
        *self.cached.lock().await = Some((token, fetched));
    }
}

async fn fetch_gcloud_token() -> Result<String, PipelineError> {
    let output = Command::new("gcloud")
        .args(["auth", "print-access-token"])
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            PipelineError::generation(
                GenerationFailure::Rejected,
                format!("no access token configured and gcloud is unavailable: {}", e),
            )
        })?;
    if !output.status.success() {
        return Err(PipelineError::generation(
            GenerationFailure::Rejected,
            format!(
                "gcloud auth print-access-token failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }
    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(PipelineError::generation(
            GenerationFailure::Rejected,
            "gcloud returned an empty access token",
        ));
    }
    Ok(token)
}

/// The Vertex AI calls the backends make.
#[async_trait]
pub trait VertexApi: Send + Sync {
    /// One POST to a publisher model method, with no retry.
    async fn post_json(&self, model: &str, method: &str, body: &Value)
    -> Result<Value, PipelineError>;

    /// Gemini `generateContent` and the first candidate's text.
    async fn generate_content(
        &self,
        model: &str,
        parts: Vec<Value>,
        temperature: f64,
    ) -> Result<String, PipelineError> {
        let body = serde_json::json!({
            "contents": [{"role": "user", "parts": parts}],
            "generationConfig": {
                "temperature": temperature,
                "maxOutputTokens": 2048,
            }
        });
        let response = self.post_json(model, "generateContent", &body).await?;
        candidate_text(&response)
    }
}

/// Shared HTTP plumbing for every Vertex AI publisher model call.
pub struct VertexClient {
    http: Client,
    project_id: String,
    location: String,
    tokens: TokenSource,
}

impl VertexClient {
    pub fn new(service: &ServiceConfig) -> anyhow::Result<Self> {
        let project_id = service
            .project_id
            .clone()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!("PROJECT_ID is not set (config [service].project_id or env)")
            })?;
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            project_id,
            location: service.location.clone(),
            tokens: TokenSource::new(service.access_token.clone()),
        })
    }

    pub fn model_url(&self, model: &str, method: &str) -> String {
        model_url(&self.location, &self.project_id, model, method)
    }
}

#[async_trait]
impl VertexApi for VertexClient {
    /// Status codes map onto generation failure kinds.
    async fn post_json(
        &self,
        model: &str,
        method: &str,
        body: &Value,
    ) -> Result<Value, PipelineError> {
        let url = self.model_url(model, method);
        let token = self.tokens.bearer().await?;
        emit(
            Level::Debug,
            "shayari.vertex.request",
            &format!("POST {}", url),
            None,
        );

        let resp = self.http.post(&url).bearer_auth(token).json(body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::from_http_status(status.as_u16(), &text));
        }
        resp.json::<Value>().await.map_err(|e| {
            PipelineError::generation(
                GenerationFailure::InvalidResponse,
                format!("{} returned malformed JSON: {}", method, e),
            )
        })
    }
}

fn model_url(location: &str, project: &str, model: &str, method: &str) -> String {
    format!(
        "https://{loc}-aiplatform.googleapis.com/v1/projects/{project}/locations/{loc}/publishers/google/models/{model}:{method}",
        loc = location,
        project = project,
        model = model,
        method = method,
    )
}

fn candidate_text(response: &Value) -> Result<String, PipelineError> {
    if let Some(reason) = response["promptFeedback"]["blockReason"].as_str() {
        return Err(PipelineError::generation(
            GenerationFailure::Rejected,
            format!("prompt blocked: {}", reason),
        ));
    }
    let text = response["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();
    let text = text.trim();
    if text.is_empty() {
        let finish = response["candidates"][0]["finishReason"]
            .as_str()
            .unwrap_or("no candidates");
        return Err(PipelineError::generation(
            GenerationFailure::InvalidResponse,
            format!("model returned no text ({})", finish),
        ));
    }
    Ok(text.to_string())
}
