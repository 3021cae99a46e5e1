//! Message formatting and delivery to the channel.
//!
//! [`Publisher`] turns an [`Article`] into an HTML message and hands it to a
//! [`DeliveryChannel`]. The only production channel is [`TelegramChannel`]
//! (Bot API `sendMessage`).
//!
//! # Message Layout
//!
//! ```text
//! <title variant>
//!
//! <cleaned display text>
//!
//! 📖 ادامه مطلب: <url>
//!
//! <hashtag variant>
//! <signature, if configured>
//! ```
//!
//! Title and hashtag variants are picked at random from a caption RNG that
//! is separate from the queue-selection RNG in [`crate::workflow`]. Caption
//! choice is cosmetic.

use crate::config::TelegramSettings;
use crate::error::{Error, Result};
use crate::models::Article;
use crate::utils::{truncate_chars, truncate_for_log};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{error, info, instrument, warn};
use url::Url;

/// Longest cleaned body, in characters, before the `...` marker.
pub const MAX_CONTENT_CHARS: usize = 600;
const MAX_SENTENCES: usize = 4;
const MIN_SENTENCE_CHARS: usize = 10;
const BLOCKED_OPENERS: &[&str] = &["این متن را", "ویرایش کنید"];

const HASHTAG_VARIANTS: &[&str] = &[
    "#خبر #ایران #سیاسی",
    "#ایران #سیاسی #بین_المللی",
    "#خبر_فوری #ایران #سیاسی",
    "#تحلیل_سیاسی #ایران #خارجی",
];

const READ_MORE: &str = "📖 ادامه مطلب:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    #[serde(rename = "HTML")]
    Html,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    pub disable_preview: bool,
    pub parse_mode: Option<ParseMode>,
}

/// Anything that can deliver a text message to a chat.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// `true` when the channel accepted the message. Failures are logged, not raised.
    async fn send_message(&self, chat_id: &str, text: &str, options: SendOptions) -> bool;
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<ParseMode>,
}

#[derive(Debug, Deserialize)]
struct BotResponse {
    #[serde(default = "default_ok")]
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

fn default_ok() -> bool {
    true
}

/// Telegram Bot API client.
#[derive(Debug, Clone)]
pub struct TelegramChannel {
    http: reqwest::Client,
    bot_base: Url,
}

impl TelegramChannel {
    pub fn new(settings: &TelegramSettings) -> Result<Self> {
        if settings.bot_token.trim().is_empty() {
            return Err(Error::Unconfigured("telegram"));
        }
        let bot_base = Url::parse(&settings.base_url)
            .and_then(|base| base.join(&format!("/bot{}/", settings.bot_token.trim())))
            .map_err(|e| Error::config(format!("invalid telegram url: {e}"), "telegram.base_url"))?;
        let http = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()?;
        Ok(Self { http, bot_base })
    }

    fn method_url(&self, method: &str) -> Result<Url> {
        self.bot_base.join(method).map_err(|e| Error::Provider {
            provider: "telegram",
            message: e.to_string(),
        })
    }

    /// `getMe` round trip; `true` when the token is accepted.
    #[instrument(level = "info", skip_all)]
    pub async fn test_connection(&self) -> bool {
        let url = match self.method_url("getMe") {
            Ok(url) => url,
            Err(e) => {
                error!(error = %e, "Telegram connection test failed");
                return false;
            }
        };
        match self.http.get(url).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!(status = resp.status().as_u16(), "Telegram rejected getMe");
                false
            }
            Err(e) => {
                error!(error = %e, "Telegram connection test failed");
                false
            }
        }
    }
}

#[async_trait]
impl DeliveryChannel for TelegramChannel {
    #[instrument(level = "info", skip_all, fields(%chat_id, chars = text.chars().count()))]
    async fn send_message(&self, chat_id: &str, text: &str, options: SendOptions) -> bool {
        let t0 = Instant::now();
        let url = match self.method_url("sendMessage") {
            Ok(url) => url,
            Err(e) => {
                error!(error = %e, "Failed to send Telegram message");
                return false;
            }
        };
        let body = SendMessageRequest {
            chat_id,
            text,
            disable_web_page_preview: options.disable_preview,
            parse_mode: options.parse_mode,
        };
        let response = match self.http.post(url).json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, "Failed to send Telegram message");
                return false;
            }
        };
        let status = response.status();
        let raw = response.text().await.unwrap_or_default();
        if !status.is_success() {
            error!(
                status = status.as_u16(),
                body = %truncate_for_log(&raw, 200),
                "Telegram API error"
            );
            return false;
        }
        match serde_json::from_str::<BotResponse>(&raw) {
            Ok(BotResponse { ok: false, description }) => {
                error!(description = ?description, "Telegram refused the message");
                false
            }
            _ => {
                info!(elapsed_ms = t0.elapsed().as_millis() as u64, "Message sent to Telegram");
                true
            }
        }
    }
}

/// Stand-in used when no bot token is configured; refuses every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledChannel;

#[async_trait]
impl DeliveryChannel for DisabledChannel {
    async fn send_message(&self, chat_id: &str, _text: &str, _options: SendOptions) -> bool {
        warn!(%chat_id, "Telegram is not configured; message dropped");
        false
    }
}

/// Escape the characters Telegram's HTML parse mode treats as markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Deduplicate and shorten text for a channel post.
///
/// Splits on `.`, keeps sentences longer than 10 characters that are not
/// repeats and do not open with an editorial placeholder, joins the first
/// four with `". "` and closes with `.`. Anything longer than 600
/// characters is cut and marked with `...`. If no sentence survives, the
/// trimmed input is used as is.
pub fn clean_content(content: &str) -> String {
    let mut seen = HashSet::new();
    let sentences: Vec<&str> = content
        .split('.')
        .map(str::trim)
        .filter(|s| s.chars().count() > MIN_SENTENCE_CHARS)
        .filter(|s| !BLOCKED_OPENERS.iter().any(|opener| s.starts_with(opener)))
        .filter(|s| seen.insert(*s))
        .take(MAX_SENTENCES)
        .collect();

    let joined = if sentences.is_empty() {
        content.trim().to_string()
    } else {
        format!("{}.", sentences.join(". "))
    };

    if joined.chars().count() > MAX_CONTENT_CHARS {
        format!("{}...", truncate_chars(&joined, MAX_CONTENT_CHARS))
    } else {
        joined
    }
}

fn title_variants(title: &str) -> [String; 4] {
    [
        title.to_string(),
        format!("📰 {title}"),
        format!("خبر فوری: {title}"),
        format!("🔴 {title}"),
    ]
}

pub struct Publisher {
    channel: Arc<dyn DeliveryChannel>,
    chat_id: String,
    signature: Option<String>,
    options: SendOptions,
    captions: Mutex<StdRng>,
}

impl Publisher {
    /// `caption_seed` fixes the caption choices; `None` seeds from the OS.
    pub fn new(
        channel: Arc<dyn DeliveryChannel>,
        settings: &TelegramSettings,
        caption_seed: Option<u64>,
    ) -> Self {
        let rng = match caption_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            channel,
            chat_id: settings.channel.clone(),
            signature: settings.signature.clone().filter(|s| !s.trim().is_empty()),
            options: SendOptions {
                disable_preview: settings.disable_preview,
                parse_mode: Some(ParseMode::Html),
            },
            captions: Mutex::new(rng),
        }
    }

    fn pick<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        match self.captions.lock() {
            Ok(mut rng) => items.choose(&mut *rng),
            Err(poisoned) => items.choose(&mut *poisoned.into_inner()),
        }
    }

    /// Render the channel message for `article`.
    ///
    /// Fails with [`Error::MissingText`] when the article has nothing to show.
    pub fn format_message(&self, article: &Article) -> Result<String> {
        let text = article.display_text().ok_or(Error::MissingText(article.id))?;
        let titles = title_variants(&article.title);
        let title = self.pick(&titles).map_or(article.title.as_str(), String::as_str);
        let hashtags = self.pick(HASHTAG_VARIANTS).copied().unwrap_or_default();

        let mut message = format!(
            "{}\n\n{}\n\n{READ_MORE} {}\n\n{hashtags}",
            escape_html(title),
            escape_html(&clean_content(text)),
            escape_html(&article.url),
        );
        if let Some(signature) = &self.signature {
            message.push('\n');
            message.push_str(&escape_html(signature));
        }
        Ok(message)
    }

    /// Format and send. `Ok(false)` means the channel refused the message.
    #[instrument(level = "info", skip_all, fields(article_id = %article.id))]
    pub async fn publish(&self, article: &Article) -> Result<bool> {
        let message = self.format_message(article)?;
        Ok(self
            .channel
            .send_message(&self.chat_id, &message, self.options)
            .await)
    }

    pub async fn send_test_message(&self) -> bool {
        self.channel
            .send_message(
                &self.chat_id,
                "🔧 Test connection: If you see this message, Telegram connection is working.",
                self.options,
            )
            .await
    }
}
