//! Runtime settings.
//!
//! Settings come from an optional YAML file; every field has a default so an
//! empty file (or no file) is valid. Credentials are normally supplied through
//! the CLI / environment and merged in with [`Settings::apply_credentials`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub search: SearchSettings,
    pub scoring: ScoringSettings,
    pub dedup: DedupSettings,
    pub translation: TranslationSettings,
    pub telegram: TelegramSettings,
    pub workflow: WorkflowSettings,
    pub schedule: ScheduleSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub base_url: String,
    pub endpoint: String,
    pub api_keys: Vec<String>,
    /// Fixed topic every query is anchored on.
    pub core_topic: String,
    /// Category filter appended to the simple query (`category:<x>`).
    pub category_filter: Option<String>,
    pub languages: Vec<String>,
    pub max_pages: usize,
    pub max_results: usize,
    pub timeout_secs: u64,
    /// Pause between days of an advanced (date range) ingestion.
    pub day_delay_ms: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.webz.io".into(),
            endpoint: "/newsApiLite".into(),
            api_keys: Vec::new(),
            core_topic: "iran".into(),
            category_filter: Some("politics".into()),
            languages: vec![
                "english".into(),
                "french".into(),
                "arabic".into(),
                "chinese".into(),
            ],
            max_pages: 5,
            max_results: 100,
            timeout_secs: 30,
            day_delay_ms: 1000,
        }
    }
}

impl SearchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub urgency: f64,
    pub relevance: f64,
    pub credibility: f64,
    pub diversity: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            urgency: 0.30,
            relevance: 0.30,
            credibility: 0.20,
            diversity: 0.20,
        }
    }
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.urgency + self.relevance + self.credibility + self.diversity
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringSettings {
    pub weights: ScoreWeights,
    pub keywords: Vec<String>,
    pub high_value_categories: Vec<String>,
    /// Candidates scoring below this are dropped at ingestion.
    pub min_score: f64,
    pub high_priority: f64,
    /// Trailing window of persisted articles used for duplicate checks.
    pub window_days: i64,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            keywords: [
                "iran",
                "iranian",
                "tehran",
                "persia",
                "persian",
                "nuclear",
                "sanctions",
                "jcpoa",
                "irgc",
                "khamenei",
                "raisi",
                "president",
                "supreme leader",
            ]
            .map(String::from)
            .to_vec(),
            high_value_categories: [
                "Politics",
                "Economy, Business and Finance",
                "International Relations",
                "Security",
                "Defense",
                "Diplomacy",
            ]
            .map(String::from)
            .to_vec(),
            min_score: 0.3,
            high_priority: 0.7,
            window_days: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupSettings {
    /// Title similarity (0-100) above which a candidate is a duplicate.
    pub title_threshold: u32,
    /// Body prefix partial similarity (0-100) above which a candidate is a duplicate.
    pub body_threshold: u32,
    pub body_prefix_chars: usize,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            title_threshold: 85,
            body_threshold: 80,
            body_prefix_chars: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationSettings {
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub api_keys: Vec<String>,
    pub max_retries: usize,
    pub backoff_ms: u64,
    /// Longer input is truncated to this many characters before sending.
    pub max_length: usize,
    pub timeout_secs: u64,
    pub target_language: String,
    pub fallback_base_url: String,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            gemini_base_url: "https://generativelanguage.googleapis.com".into(),
            gemini_model: "gemini-pro".into(),
            api_keys: Vec::new(),
            max_retries: 3,
            backoff_ms: 2000,
            max_length: 15000,
            timeout_secs: 30,
            target_language: "fa".into(),
            fallback_base_url: "https://translate.googleapis.com".into(),
        }
    }
}

impl TranslationSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    pub base_url: String,
    pub bot_token: String,
    pub channel: String,
    /// Closing line appended to every message, e.g. `🔹 @channel`.
    pub signature: Option<String>,
    pub disable_preview: bool,
    pub timeout_secs: u64,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.telegram.org".into(),
            bot_token: String::new(),
            channel: String::new(),
            signature: None,
            disable_preview: false,
            timeout_secs: 30,
        }
    }
}

impl TelegramSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn is_configured(&self) -> bool {
        !self.bot_token.trim().is_empty() && !self.channel.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    pub translation_batch: usize,
    /// How many queued articles the publish cycle picks from.
    pub queue_window: usize,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            translation_batch: 5,
            queue_window: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    pub crawler_interval_mins: u64,
    pub translator_interval_mins: u64,
    pub publisher_interval_mins: u64,
    /// Page / result limits used by the scheduled crawler.
    pub crawler_max_pages: usize,
    pub crawler_max_results: usize,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            crawler_interval_mins: 60,
            translator_interval_mins: 30,
            publisher_interval_mins: 30,
            crawler_max_pages: 3,
            crawler_max_results: 50,
        }
    }
}

/// Split a comma-separated key list, dropping blanks.
pub fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}

/// Credentials collected from the command line or environment.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub webz_api_keys: Option<String>,
    pub gemini_api_keys: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_channel: Option<String>,
}

impl Settings {
    /// Load settings from a YAML file, or defaults when `path` is `None`.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            info!("No settings file given; using defaults");
            return Ok(Settings::default());
        };
        let raw = tokio::fs::read_to_string(path).await?;
        let settings = Self::from_yaml(&raw)?;
        info!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Settings::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Override keys and tokens with values from the command line / environment.
    pub fn apply_credentials(&mut self, creds: &Credentials) {
        if let Some(raw) = &creds.webz_api_keys {
            self.search.api_keys = parse_key_list(raw);
        }
        if let Some(raw) = &creds.gemini_api_keys {
            self.translation.api_keys = parse_key_list(raw);
        }
        if let Some(token) = &creds.telegram_bot_token {
            self.telegram.bot_token = token.trim().to_string();
        }
        if let Some(channel) = &creds.telegram_channel {
            self.telegram.channel = channel.trim().to_string();
        }
    }

    /// Reject settings the pipeline cannot run with; warn about missing credentials.
    pub fn validate(&self) -> Result<()> {
        let weights = &self.scoring.weights;
        let all_weights = [
            weights.urgency,
            weights.relevance,
            weights.credibility,
            weights.diversity,
        ];
        if all_weights.iter().any(|w| !(0.0..=1.0).contains(w)) {
            return Err(Error::config(
                "each weight must be within [0, 1]",
                "scoring.weights",
            ));
        }
        if (weights.sum() - 1.0).abs() > 1e-6 {
            return Err(Error::config(
                format!("weights must sum to 1.0, got {:.4}", weights.sum()),
                "scoring.weights",
            ));
        }
        for (key, value) in [
            ("scoring.min_score", self.scoring.min_score),
            ("scoring.high_priority", self.scoring.high_priority),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::config(format!("{value} is outside [0, 1]"), key));
            }
        }
        for (key, value) in [
            ("dedup.title_threshold", self.dedup.title_threshold),
            ("dedup.body_threshold", self.dedup.body_threshold),
        ] {
            if value > 100 {
                return Err(Error::config(format!("{value} is outside [0, 100]"), key));
            }
        }
        if self.scoring.window_days <= 0 {
            return Err(Error::config("must be positive", "scoring.window_days"));
        }
        if self.translation.max_retries == 0 {
            return Err(Error::config("must be at least 1", "translation.max_retries"));
        }
        if self.translation.max_length == 0 {
            return Err(Error::config("must be at least 1", "translation.max_length"));
        }
        for (key, value) in [
            ("workflow.translation_batch", self.workflow.translation_batch),
            ("workflow.queue_window", self.workflow.queue_window),
        ] {
            if value == 0 {
                return Err(Error::config("must be at least 1", key));
            }
        }

        if self.search.api_keys.is_empty() {
            warn!("No search API keys configured; ingestion will be a no-op");
        }
        if self.translation.api_keys.is_empty() {
            warn!("No Gemini API keys configured; translation goes straight to the fallback provider");
        }
        if !self.telegram.is_configured() {
            warn!("Telegram bot token or channel missing; publishing will fail");
        }
        Ok(())
    }
}
