//! Translation orchestration.
//!
//! [`Translator::translate`] tries the generative provider first (with key
//! rotation, see [`ask_with_rotation`]) and falls back once to a plain
//! machine translation endpoint. Each provider's output goes through its own
//! cleanup pass:
//!
//! - generative output: markdown emphasis and leading boilerplate labels removed
//! - machine output: fixed Persian term corrections, punctuation spacing, whitespace
//!
//! Outcomes:
//!
//! | Input | Result |
//! |-------|--------|
//! | blank | `Some("")`, no provider is called |
//! | either provider succeeds | `Some(text)` |
//! | both fail | `None` |

use crate::api::{GenerativeClient, ask_with_rotation};
use crate::config::TranslationSettings;
use crate::error::{Error, Result};
use crate::keys::KeyPool;
use crate::utils::{collapse_whitespace, truncate_chars, truncate_for_log};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Machine translation provider.
#[async_trait]
pub trait MachineTranslator: Send + Sync {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String>;
}

/// The public `translate_a/single` endpoint used by the Google Translate web widget.
#[derive(Debug, Clone)]
pub struct GoogleTranslateClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl GoogleTranslateClient {
    pub fn new(settings: &TranslationSettings) -> Result<Self> {
        let endpoint = Url::parse(&settings.fallback_base_url)
            .and_then(|base| base.join("/translate_a/single"))
            .map_err(|e| {
                Error::config(
                    format!("invalid fallback endpoint: {e}"),
                    "translation.fallback_base_url",
                )
            })?;
        let http = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()?;
        Ok(Self { http, endpoint })
    }
}

/// Concatenate the translated segments of a `translate_a/single` response:
/// `[[["segment", "source", ...], ...], ...]`.
fn join_segments(body: &Value) -> Option<String> {
    let segments = body.get(0)?.as_array()?;
    let text: String = segments
        .iter()
        .filter_map(|segment| segment.get(0)?.as_str())
        .collect();
    Some(text).filter(|t| !t.trim().is_empty())
}

#[async_trait]
impl MachineTranslator for GoogleTranslateClient {
    #[instrument(level = "info", skip_all, fields(%source, %target, chars = text.chars().count()))]
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let t0 = Instant::now();
        let response = self
            .http
            .get(self.endpoint.clone())
            .query(&[
                ("client", "gtx"),
                ("sl", source),
                ("tl", target),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Machine translation rejected");
            return Err(Error::ProviderStatus {
                provider: "google_translate",
                status: status.as_u16(),
            });
        }
        let body: Value = response.json().await?;
        let translated = join_segments(&body).ok_or_else(|| Error::Provider {
            provider: "google_translate",
            message: format!("unexpected payload: {}", truncate_for_log(&body.to_string(), 120)),
        })?;
        debug!(elapsed_ms = t0.elapsed().as_millis() as u64, "Machine translation done");
        Ok(translated)
    }
}

const BOILERPLATE_LABELS: &[&str] = &["Translation:", "Summary:", "Translated text:"];

/// Strip markdown emphasis and any leading boilerplate labels.
pub fn clean_generated(text: &str) -> String {
    let mut text = text.replace("**", "").replace('*', "");
    loop {
        let trimmed = text.trim_start();
        match BOILERPLATE_LABELS
            .iter()
            .find(|label| trimmed.starts_with(*label))
        {
            Some(label) => text = trimmed[label.len()..].to_string(),
            None => break,
        }
    }
    text.trim().to_string()
}

/// Literal find/replace pairs applied to machine output, in order.
const CORRECTIONS: &[(&str, &str)] = &[
    ("طرف ها", "طرف‌ها"),
    ("سلاح های", "سلاح‌های"),
    ("تحریم های", "تحریم‌های"),
    ("قطعنامه های", "قطعنامه‌های"),
    ("روابط دو جانبه", "روابط دوجانبه"),
    ("همکاری های", "همکاری‌های"),
    ("رئیس جمهور", "رئیس‌جمهور"),
    ("تحریم هسته ای", "تحریم هسته‌ای"),
    ("اظهار داشت", "گفت"),
    ("عنوان کرد", "گفت"),
    ("خاطرنشان کرد", "گفت"),
    ("میباشد", "است"),
    ("می‌باشد", "است"),
    ("نمود", "کرد"),
];

static SPACE_BEFORE_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([.,:])").expect("static regex"));

/// Deterministic cleanup of machine translation output.
///
/// Text shorter than 10 characters is returned untouched.
pub fn improve_machine_output(text: &str) -> String {
    if text.trim().chars().count() < 10 {
        return text.to_string();
    }
    let mut text = text.to_string();
    for (wrong, right) in CORRECTIONS {
        text = text.replace(wrong, right);
    }
    let text = SPACE_BEFORE_PUNCT.replace_all(&text, "$1");
    collapse_whitespace(&text)
}

/// Prompt sent to the generative provider.
pub fn build_prompt(text: &str, target: &str) -> String {
    if target == "fa" {
        format!(
            "You are a professional international political news translator. \
             Translate and summarize the news text below into fluent and natural Persian.\n\n\
             Important instructions:\n\
             1. The translation must be completely fluent, smooth and understandable for Persian speakers\n\
             2. Accurately convey political and international terms\n\
             3. Optimize sentence structure for easy reading\n\
             4. Avoid literal word-for-word translation\n\
             5. Final text should be 150-200 words maximum (intelligent summarization)\n\
             6. Focus on main and key points of the news\n\
             7. The result must be standalone and the reader should understand the whole subject by reading it\n\n\
             News text for translation and summarization:\n{text}\n\n\
             Return only the final fluent and summarized translation."
        )
    } else {
        format!("Translate the following text to {target}: {text}")
    }
}

pub struct Translator {
    primary: Arc<dyn GenerativeClient>,
    fallback: Arc<dyn MachineTranslator>,
    keys: KeyPool,
    max_retries: usize,
    backoff: Duration,
    max_length: usize,
    target_language: String,
}

impl Translator {
    pub fn new(
        primary: Arc<dyn GenerativeClient>,
        fallback: Arc<dyn MachineTranslator>,
        settings: &TranslationSettings,
    ) -> Self {
        Self {
            primary,
            fallback,
            keys: KeyPool::new("gemini", settings.api_keys.iter().cloned()),
            max_retries: settings.max_retries,
            backoff: settings.backoff(),
            max_length: settings.max_length,
            target_language: settings.target_language.clone(),
        }
    }

    /// Build the translator with the real HTTP providers.
    pub fn from_settings(settings: &TranslationSettings) -> Result<Self> {
        Ok(Self::new(
            Arc::new(crate::api::GeminiClient::new(settings)?),
            Arc::new(GoogleTranslateClient::new(settings)?),
            settings,
        ))
    }

    pub fn target_language(&self) -> &str {
        &self.target_language
    }

    pub fn keys(&self) -> &KeyPool {
        &self.keys
    }

    /// Translate `text` into `target`.
    ///
    /// Returns `None` only when both providers fail.
    #[instrument(level = "info", skip_all, fields(%target, chars = text.chars().count()))]
    pub async fn translate(&self, text: &str, target: &str) -> Option<String> {
        if text.trim().is_empty() {
            return Some(String::new());
        }
        let text = truncate_chars(text, self.max_length);

        if self.keys.is_configured() {
            let prompt = build_prompt(text, target);
            match ask_with_rotation(
                self.primary.as_ref(),
                &self.keys,
                &prompt,
                self.max_retries,
                self.backoff,
            )
            .await
            {
                Ok(raw) => {
                    let cleaned = clean_generated(&raw);
                    if !cleaned.is_empty() {
                        info!(out_chars = cleaned.chars().count(), "Generative translation succeeded");
                        return Some(cleaned);
                    }
                    warn!(raw = %truncate_for_log(&raw, 80), "Generative output empty after cleanup");
                }
                Err(e) => warn!(error = %e, "Generative translation failed"),
            }
        } else {
            debug!("Generative provider unconfigured");
        }

        info!("Falling back to machine translation");
        match self.fallback.translate(text, "auto", target).await {
            Ok(raw) => {
                let improved = improve_machine_output(&raw);
                info!(out_chars = improved.chars().count(), "Machine translation succeeded");
                Some(improved)
            }
            Err(e) => {
                error!(error = %e, "Machine translation failed");
                None
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FixedTranslator;
    use super::*;
    use crate::api::testing::ScriptedGenerator;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(keys: &[&str]) -> TranslationSettings {
        TranslationSettings {
            api_keys: keys.iter().map(|k| k.to_string()).collect(),
            backoff_ms: 0,
            ..Default::default()
        }
    }

    fn translator(
        primary: Arc<ScriptedGenerator>,
        fallback: Arc<FixedTranslator>,
        settings: &TranslationSettings,
    ) -> Translator {
        Translator::new(primary, fallback, settings)
    }

    fn unavailable() -> Error {
        Error::ProviderStatus {
            provider: "scripted",
            status: 503,
        }
    }

    #[test]
    fn generated_output_is_cleaned() {
        assert_eq!(clean_generated("**Translation:** متن *خبر*"), "متن خبر");
        assert_eq!(clean_generated("Summary: Translated text: done"), "done");
        assert_eq!(clean_generated("Keep Summary: inside"), "Keep Summary: inside");
    }

    #[test]
    fn machine_output_gets_corrections_and_spacing() {
        let raw = "رئیس جمهور  اظهار داشت که تحریم های جدید , غیرقانونی میباشد .";
        assert_eq!(
            improve_machine_output(raw),
            "رئیس‌جمهور گفت که تحریم‌های جدید, غیرقانونی است."
        );
        assert_eq!(improve_machine_output("کوتاه ."), "کوتاه .");
    }

    #[test]
    fn prompt_depends_on_target() {
        assert!(build_prompt("x", "fa").contains("fluent and natural Persian"));
        assert_eq!(build_prompt("hello", "de"), "Translate the following text to de: hello");
    }

    #[tokio::test]
    async fn blank_input_skips_both_providers() {
        let primary = Arc::new(ScriptedGenerator::new(vec![Ok("x".into())]));
        let fallback = Arc::new(FixedTranslator::ok("y"));
        let t = translator(primary.clone(), fallback.clone(), &settings(&["k"]));
        assert_eq!(t.translate("   \n", "fa").await, Some(String::new()));
        assert_eq!(primary.calls(), 0);
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn primary_success_is_cleaned_and_returned() {
        let primary = Arc::new(ScriptedGenerator::new(vec![Ok("**ترجمه نهایی**".into())]));
        let fallback = Arc::new(FixedTranslator::ok("unused"));
        let t = translator(primary.clone(), fallback.clone(), &settings(&["k"]));
        assert_eq!(t.translate("text", "fa").await.as_deref(), Some("ترجمه نهایی"));
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn three_primary_failures_then_fallback() {
        let primary = Arc::new(ScriptedGenerator::new(vec![
            Err(unavailable()),
            Err(unavailable()),
            Err(unavailable()),
        ]));
        let fallback = Arc::new(FixedTranslator::ok("ترجمه ماشینی کامل شد ."));
        let t = translator(primary.clone(), fallback.clone(), &settings(&["a", "b"]));

        let out = t.translate("Some news text", "fa").await;
        assert_eq!(out.as_deref(), Some("ترجمه ماشینی کامل شد."));
        assert_eq!(*primary.keys_seen.lock().unwrap(), vec!["a", "b", "a"]);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn unconfigured_primary_goes_straight_to_fallback() {
        let primary = Arc::new(ScriptedGenerator::new(vec![Ok("unused".into())]));
        let fallback = Arc::new(FixedTranslator::ok("done by fallback"));
        let t = translator(primary.clone(), fallback.clone(), &settings(&[]));
        assert_eq!(t.translate("text", "fa").await.as_deref(), Some("done by fallback"));
        assert_eq!(primary.calls(), 0);
    }

    #[tokio::test]
    async fn both_failing_is_none_not_empty() {
        let primary = Arc::new(ScriptedGenerator::new(vec![]));
        let fallback = Arc::new(FixedTranslator::failing());
        let t = translator(primary, fallback, &settings(&["a"]));
        assert_eq!(t.translate("text", "fa").await, None);
    }

    #[tokio::test]
    async fn long_input_is_truncated_not_rejected() {
        let primary = Arc::new(ScriptedGenerator::new(vec![]));
        let fallback = Arc::new(FixedTranslator::ok("short result text"));
        let mut s = settings(&[]);
        s.max_length = 20;
        let t = translator(primary, fallback.clone(), &s);
        t.translate(&"x".repeat(100), "fa").await.unwrap();
        assert_eq!(fallback.inputs.lock().unwrap()[0], "x".repeat(20));
    }

    #[tokio::test]
    async fn google_client_joins_segments() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/translate_a/single"))
            .and(query_param("client", "gtx"))
            .and(query_param("sl", "auto"))
            .and(query_param("tl", "fa"))
            .and(query_param("q", "Hello. World."))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                [["سلام. ", "Hello. ", null], ["دنیا.", "World.", null]],
                null,
                "en"
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = GoogleTranslateClient::new(&TranslationSettings {
            fallback_base_url: server.uri(),
            ..Default::default()
        })
        .unwrap();
        let out = client.translate("Hello. World.", "auto", "fa").await.unwrap();
        assert_eq!(out, "سلام. دنیا.");
    }

    #[tokio::test]
    async fn google_client_rejects_unexpected_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "nope"})))
            .mount(&server)
            .await;

        let client = GoogleTranslateClient::new(&TranslationSettings {
            fallback_base_url: server.uri(),
            ..Default::default()
        })
        .unwrap();
        assert!(client.translate("Hello", "auto", "fa").await.is_err());
    }
}
