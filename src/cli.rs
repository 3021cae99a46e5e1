//! Command-line interface definition.
//!
//! Global flags locate the settings file and the article snapshot, and carry
//! provider credentials (each also readable from the environment). Every
//! subcommand maps onto one pipeline or workflow operation; `run` starts the
//! periodic crawler / translator / publisher jobs.
//!
//! ```text
//! bureau_news --config settings.yaml ingest --language english
//! bureau_news ingest-range --from 2025-06-01 --to 2025-06-03 --keywords sanctions,talks
//! bureau_news approve 12
//! bureau_news list --state ready_for_final --order published
//! bureau_news run
//! ```

use bureau_news::config::Credentials;
use bureau_news::models::ArticleState;
use bureau_news::store::SortOrder;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// YAML settings file; built-in defaults are used when omitted.
    #[arg(short, long, global = true, env = "BUREAU_CONFIG")]
    pub config: Option<PathBuf>,

    /// JSON snapshot holding the article store between runs.
    #[arg(
        short,
        long,
        global = true,
        env = "BUREAU_DATA_FILE",
        default_value = "data/articles.json"
    )]
    pub data_file: PathBuf,

    /// Comma-separated Webz.io API keys.
    #[arg(long, global = true, env = "WEBZ_API_KEYS", hide_env_values = true)]
    pub webz_api_keys: Option<String>,

    /// Comma-separated Gemini API keys.
    #[arg(long, global = true, env = "GEMINI_API_KEYS", hide_env_values = true)]
    pub gemini_api_keys: Option<String>,

    #[arg(long, global = true, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub telegram_bot_token: Option<String>,

    /// Channel handle (`@name`) or numeric chat id.
    #[arg(long, global = true, env = "TELEGRAM_CHANNEL")]
    pub telegram_channel: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            webz_api_keys: self.webz_api_keys.clone(),
            gemini_api_keys: self.gemini_api_keys.clone(),
            telegram_bot_token: self.telegram_bot_token.clone(),
            telegram_channel: self.telegram_channel.clone(),
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Collect one day of articles for a language.
    Ingest {
        #[arg(short, long, default_value = "english")]
        language: String,
        /// Day to search from (YYYY-MM-DD); today when omitted.
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        max_pages: Option<usize>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Collect day by day over an inclusive date range.
    IngestRange {
        #[arg(short, long, default_value = "english")]
        language: String,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        /// Optional keywords OR-ed together and AND-ed with the core topic.
        #[arg(long, value_delimiter = ',')]
        keywords: Vec<String>,
        /// Page budget per day.
        #[arg(long, default_value_t = 3)]
        max_pages: usize,
        /// Accepted articles across the whole range.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Approve a collected article and translate it straight away.
    Approve { id: u64 },
    /// Translate a batch of approved articles.
    Translate {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Move a translated article into the publish queue.
    FinalApprove { id: u64 },
    /// Replace the editor's text; an empty string clears it.
    Edit { id: u64, text: String },
    /// Run one publish cycle.
    Publish,
    /// Publish a single article immediately.
    PublishNow { id: u64 },
    List {
        #[arg(long)]
        state: Option<ArticleState>,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        min_score: Option<f64>,
        /// Case-insensitive text to look for in title, body and translation.
        #[arg(short, long)]
        search: Option<String>,
        #[arg(long, value_enum, default_value_t = ListOrder::Score)]
        order: ListOrder,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    Stats,
    /// Show the per-factor score breakdown of a stored article.
    Explain { id: u64 },
    /// Check provider connectivity.
    Check {
        /// Also post a test message to the channel.
        #[arg(long)]
        send_test: bool,
    },
    /// Run the periodic jobs until interrupted.
    Run,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOrder {
    Score,
    Published,
    Created,
}

impl From<ListOrder> for SortOrder {
    fn from(order: ListOrder) -> Self {
        match order {
            ListOrder::Score => SortOrder::Score,
            ListOrder::Published => SortOrder::Published,
            ListOrder::Created => SortOrder::Created,
        }
    }
}
