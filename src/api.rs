//! Generative text provider interaction with key rotation.
//!
//! The translation orchestrator talks to an AI text-generation service
//! through [`GenerativeClient`]. [`ask_with_rotation`] drives a client
//! against a [`KeyPool`]: every transient failure rotates to the next key
//! and waits a fixed backoff before trying again.
//!
//! # Architecture
//!
//! - [`GenerativeClient`]: core trait, one prompt in, generated text out
//! - [`GeminiClient`]: the Google Generative Language `generateContent` endpoint
//! - [`ask_with_rotation`]: retry driver shared by every generative call site
//!
//! # Retry Strategy
//!
//! - `max_retries` attempts in total (3 by default)
//! - Rotate the key after every transient failure, success never rotates
//! - Any other error ends the attempts at once, the key is kept
//! - Fixed delay between attempts (2 s by default), none after the last one

use crate::config::TranslationSettings;
use crate::error::{Error, Result};
use crate::keys::KeyPool;
use crate::utils::truncate_for_log;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

const PROVIDER: &str = "gemini";

/// Trait for async text generation.
///
/// Implementors send a prompt authenticated with `key` and return the
/// generated text. An empty generation is an error, not a success.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    async fn generate(&self, key: &str, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            top_p: 0.8,
            max_output_tokens: 1024,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    /// Text of the first part of the first candidate.
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content
            .parts
            .into_iter()
            .next()
            .map(|p| p.text.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

/// Client for `POST {base}/v1/models/{model}:generateContent?key=...`.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: Url,
    config: GenerationConfig,
}

impl GeminiClient {
    pub fn new(settings: &TranslationSettings) -> Result<Self> {
        let endpoint = Url::parse(&settings.gemini_base_url)
            .and_then(|base| {
                base.join(&format!(
                    "/v1/models/{}:generateContent",
                    settings.gemini_model
                ))
            })
            .map_err(|e| {
                Error::config(
                    format!("invalid generative endpoint: {e}"),
                    "translation.gemini_base_url",
                )
            })?;
        let http = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()?;
        Ok(Self {
            http,
            endpoint,
            config: GenerationConfig::default(),
        })
    }
}

#[async_trait]
impl GenerativeClient for GeminiClient {
    #[instrument(level = "info", skip_all, fields(prompt_chars = prompt.chars().count()))]
    async fn generate(&self, key: &str, prompt: &str) -> Result<String> {
        let t0 = Instant::now();
        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
            generation_config: self.config,
        };
        let response = self
            .http
            .post(self.endpoint.clone())
            .query(&[("key", key)])
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let dt = t0.elapsed();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                elapsed_ms = dt.as_millis() as u64,
                body = %truncate_for_log(&text, 200),
                "API call failed"
            );
            return Err(Error::ProviderStatus {
                provider: PROVIDER,
                status: status.as_u16(),
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        let text = parsed.first_text().ok_or_else(|| Error::Provider {
            provider: PROVIDER,
            message: "response has no candidate text".into(),
        })?;
        debug!(
            elapsed_ms = dt.as_millis() as u64,
            chars = text.chars().count(),
            "API call succeeded"
        );
        Ok(text)
    }
}

/// Call `client` with the pool's current key, rotating on transient failures.
///
/// Makes at most `max_retries` attempts and sleeps `backoff` between them.
/// Returns the last error once attempts run out, or
/// [`Error::Unconfigured`] for an empty pool.
#[instrument(level = "info", skip_all, fields(pool_size = keys.len()))]
pub async fn ask_with_rotation(
    client: &dyn GenerativeClient,
    keys: &KeyPool,
    prompt: &str,
    max_retries: usize,
    backoff: Duration,
) -> Result<String> {
    let total_t0 = Instant::now();
    let mut last_err = Error::Unconfigured("generative provider");

    for attempt in 1..=max_retries {
        let Some(key) = keys.current() else {
            return Err(Error::Unconfigured("generative provider"));
        };
        let attempt_t0 = Instant::now();
        match client.generate(key, prompt).await {
            Ok(text) => {
                info!(
                    attempt,
                    key_index = keys.current_index(),
                    elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                    "ask_with_rotation succeeded"
                );
                return Ok(text);
            }
            Err(e) if !e.is_transient() => {
                error!(attempt, error = %e, "Generation failed; not retrying");
                return Err(e);
            }
            Err(e) => {
                warn!(
                    attempt,
                    max = max_retries,
                    key_index = keys.current_index(),
                    elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64,
                    error = %e,
                    "Generation attempt failed; rotating key"
                );
                keys.rotate();
                last_err = e;
                if attempt < max_retries {
                    sleep(backoff).await;
                }
            }
        }
    }

    error!(
        max = max_retries,
        elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
        error = %last_err,
        "ask_with_rotation exhausted retries"
    );
    Err(last_err)
}
