//! The generative-model backend: trait seam plus the Gemini REST adapter.
//!
//! The pipeline depends only on [`GenerativeBackend`] — one call takes a
//! model id, a PDF payload, and a prompt, and yields the model's raw JSON
//! text or a **classified** [`BackendError`]. Classification happens here,
//! at the adapter boundary, from the HTTP status code: retry logic upstream
//! matches on [`BackendError::RateLimited`], never on the wording of an
//! error message.
//!
//! [`GeminiClient`] is the production implementation: a thin reqwest client
//! for the `generativelanguage.googleapis.com` `generateContent` surface.
//! The PDF travels as a base64 `inline_data` part with MIME type
//! `application/pdf`; `response_mime_type` pins the reply to strict JSON so
//! no prose wrapper needs stripping.

use crate::config::API_TIMEOUT;
use crate::error::{BackendError, InvoiceError};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// One outbound model call per invocation; no other observable side effects.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Send one PDF payload plus the extraction prompt to `model` and return
    /// the raw JSON text of the response.
    async fn extract_json(
        &self,
        model: &str,
        pdf_bytes: &[u8],
        prompt: &str,
    ) -> Result<String, BackendError>;
}

/// Gemini REST adapter.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    /// Build a client. Fails fast on an empty key so a credential problem
    /// surfaces before any document is touched.
    pub fn new(api_key: impl Into<String>) -> Result<Self, InvoiceError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(InvoiceError::MissingApiKey);
        }

        let http = reqwest::Client::builder()
            .timeout(API_TIMEOUT)
            .build()
            .map_err(|e| InvoiceError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key,
            base_url: API_BASE.to_string(),
        })
    }

    /// Point the client at a different endpoint (local stub servers in
    /// tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn extract_json(
        &self,
        model: &str,
        pdf_bytes: &[u8],
        prompt: &str,
    ) -> Result<String, BackendError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let body = GenerateRequest::for_pdf(pdf_bytes, prompt);

        debug!(
            "Calling {model} with {} PDF bytes, {} prompt chars",
            pdf_bytes.len(),
            prompt.len()
        );

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Transport {
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_http_failure(
                status.as_u16(),
                retry_after_secs(&response),
                response.text().await.unwrap_or_default(),
            ));
        }

        let parsed: GenerateResponse =
            response.json().await.map_err(|e| BackendError::Api {
                status: status.as_u16(),
                detail: format!("unreadable response body: {e}"),
            })?;

        parsed.first_text().ok_or(BackendError::Api {
            status: status.as_u16(),
            detail: "response contained no text part".to_string(),
        })
    }
}

/// Map a non-success HTTP status to the explicit failure taxonomy.
fn classify_http_failure(
    status: u16,
    retry_after_secs: Option<u64>,
    body: String,
) -> BackendError {
    let detail = snippet(&body);
    match status {
        429 => BackendError::RateLimited { retry_after_secs },
        401 | 403 => BackendError::Auth { detail },
        _ => BackendError::Api { status, detail },
    }
}

fn retry_after_secs(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// First line of the body, bounded, for error messages.
fn snippet(body: &str) -> String {
    let line = body.lines().next().unwrap_or("").trim();
    if line.chars().count() > 200 {
        let truncated: String = line.chars().take(199).collect();
        format!("{truncated}…")
    } else {
        line.to_string()
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

impl GenerateRequest {
    fn for_pdf(pdf_bytes: &[u8], prompt: &str) -> Self {
        Self {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart {
                        inline_data: Some(InlineData {
                            mime_type: "application/pdf".to_string(),
                            data: BASE64.encode(pdf_bytes),
                        }),
                        text: None,
                    },
                    RequestPart {
                        inline_data: None,
                        text: Some(prompt.to_string()),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        }
    }
}

#[derive(Serialize)]
struct GenerationConfig {
    response_mime_type: String,
}

#[derive(Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
struct RequestPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content
            .parts
            .into_iter()
            .find_map(|part| part.text)
    }
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Deserialize, Default)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}
