//! # Bureau News
//!
//! Command-line front end for the news desk pipeline: ingestion, the
//! editorial workflow, translation and channel publishing.
//!
//! ## Usage
//!
//! ```sh
//! WEBZ_API_KEYS=k1,k2 GEMINI_API_KEYS=g1 bureau_news ingest --language english
//! bureau_news approve 12
//! TELEGRAM_BOT_TOKEN=... TELEGRAM_CHANNEL=@desk bureau_news run
//! ```
//!
//! ## Architecture
//!
//! Each invocation loads the article snapshot, runs one command and writes
//! the snapshot back. `run` keeps three periodic jobs alive instead:
//! 1. **Crawler**: ingest every configured language
//! 2. **Translator**: translate a batch of approved articles
//! 3. **Publisher**: promote ready articles and post one from the queue
//!
//! Each job owns its own ticker, so a slow run delays that job only and a
//! job never overlaps itself. The snapshot is saved after every job.

use bureau_news::config::Settings;
use bureau_news::ingest::{IngestOutcome, IngestRequest, IngestionPipeline, RangeRequest};
use bureau_news::models::ArticleId;
use bureau_news::publish::{DeliveryChannel, DisabledChannel, Publisher, TelegramChannel};
use bureau_news::scoring::Scorer;
use bureau_news::scrapers::{SearchProvider, SearchQuery, WebzClient};
use bureau_news::store::{ArticleFilter, ArticleStore, MemoryStore, snapshot};
use bureau_news::translate::Translator;
use bureau_news::workflow::{PublishOutcome, Workflow};
use chrono::{Duration as ChronoDuration, Utc};
use clap::Parser;
use futures::future::join3;
use serde::Serialize;
use std::error::Error;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;

use cli::{Cli, Command};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let args = Cli::parse();
    info!(config = ?args.config, data_file = %args.data_file.display(), "Starting bureau_news");

    let mut settings = Settings::load(args.config.as_deref()).await?;
    settings.apply_credentials(&args.credentials());
    settings.validate()?;

    let store = Arc::new(snapshot::load(&args.data_file).await?);
    let desk = Desk::build(settings, store, args.data_file.clone())?;
    desk.dispatch(args.command).await
}

/// Everything a command needs, wired once per invocation.
struct Desk {
    settings: Settings,
    store: Arc<MemoryStore>,
    data_file: PathBuf,
    search: Arc<WebzClient>,
    pipeline: IngestionPipeline,
    translator: Arc<Translator>,
    telegram: Option<TelegramChannel>,
    publisher: Arc<Publisher>,
    workflow: Workflow,
    save_lock: Mutex<()>,
}

impl Desk {
    fn build(
        settings: Settings,
        store: Arc<MemoryStore>,
        data_file: PathBuf,
    ) -> Result<Self, Box<dyn Error>> {
        let shared: Arc<dyn ArticleStore> = store.clone();

        let search = Arc::new(WebzClient::new(&settings.search)?);
        let pipeline = IngestionPipeline::new(search.clone(), shared.clone(), &settings);
        let translator = Arc::new(Translator::from_settings(&settings.translation)?);

        let telegram = if settings.telegram.is_configured() {
            Some(TelegramChannel::new(&settings.telegram)?)
        } else {
            warn!("Telegram credentials missing; publishing is disabled");
            None
        };
        let channel: Arc<dyn DeliveryChannel> = match &telegram {
            Some(tg) => Arc::new(tg.clone()),
            None => Arc::new(DisabledChannel),
        };
        let publisher = Arc::new(Publisher::new(channel, &settings.telegram, None));

        let workflow = Workflow::new(shared, translator.clone(), publisher.clone(), &settings, None);

        Ok(Self {
            settings,
            store,
            data_file,
            search,
            pipeline,
            translator,
            telegram,
            publisher,
            workflow,
            save_lock: Mutex::new(()),
        })
    }

    async fn dispatch(&self, command: Command) -> Result<(), Box<dyn Error>> {
        let read_only = matches!(
            command,
            Command::List { .. } | Command::Stats | Command::Explain { .. } | Command::Check { .. }
        );

        match command {
            Command::Ingest {
                language,
                date,
                max_pages,
                limit,
            } => {
                let req = IngestRequest {
                    language,
                    date,
                    max_pages: max_pages.unwrap_or(self.settings.search.max_pages),
                    limit: limit.unwrap_or(self.settings.search.max_results),
                };
                let outcome = self.pipeline.ingest(&req).await;
                print_outcome(&outcome);
            }
            Command::IngestRange {
                language,
                from,
                to,
                keywords,
                max_pages,
                limit,
            } => {
                if from > to {
                    return Err(format!("--from {from} is after --to {to}").into());
                }
                let req = RangeRequest {
                    language,
                    from,
                    to,
                    keywords,
                    max_pages,
                    limit,
                };
                let outcome = self.pipeline.ingest_range(&req).await;
                print_outcome(&outcome);
            }
            Command::Approve { id } => {
                let article = self.workflow.approve_for_translation(ArticleId(id)).await?;
                println!("article {} -> {}", article.id, article.state);
            }
            Command::Translate { limit } => {
                let batch = self.workflow.run_translation_batch(limit).await;
                println!("translated: {}, failed: {}", batch.translated, batch.failed);
            }
            Command::FinalApprove { id } => {
                let article = self.workflow.final_approve(ArticleId(id)).await?;
                println!("article {} -> {}", article.id, article.state);
            }
            Command::Edit { id, text } => {
                let article = self.workflow.edit_text(ArticleId(id), &text).await?;
                println!("article {} edited ({})", article.id, article.state);
            }
            Command::Publish => print_publish(self.workflow.run_publish_cycle().await?),
            Command::PublishNow { id } => {
                let article = self.workflow.publish_now(ArticleId(id)).await?;
                println!("article {} -> {}", article.id, article.state);
            }
            Command::List {
                state,
                language,
                min_score,
                search,
                order,
                limit,
                offset,
            } => {
                let filter = ArticleFilter {
                    state,
                    language,
                    min_score,
                    text: search,
                    order: order.into(),
                    limit: Some(limit),
                    offset,
                    ..Default::default()
                };
                print_json(&self.store.query(&filter).await?)?;
            }
            Command::Stats => print_json(&self.workflow.stats().await?)?,
            Command::Explain { id } => {
                let article = self
                    .store
                    .get(ArticleId(id))
                    .await?
                    .ok_or(bureau_news::Error::NotFound(ArticleId(id)))?;
                let breakdown =
                    Scorer::new(&self.settings.scoring).explain(&article.as_candidate(), Utc::now());
                print_json(&breakdown)?;
            }
            Command::Check { send_test } => self.check(send_test).await,
            Command::Run => self.run_jobs().await,
        }

        if !read_only {
            self.persist().await;
        }
        Ok(())
    }

    /// Provider round trips; each result is reported, none is fatal.
    #[instrument(level = "info", skip(self))]
    async fn check(&self, send_test: bool) {
        let search_ok = match self.pipeline.keys().current() {
            Some(key) => {
                let query = SearchQuery {
                    q: self.pipeline.simple_query("english"),
                    since: Utc::now() - ChronoDuration::days(1),
                };
                match self.search.search(&query, key).await {
                    Ok(page) => {
                        info!(requests_left = ?page.requests_left, "Search provider reachable");
                        true
                    }
                    Err(e) => {
                        error!(error = %e, "Search provider check failed");
                        false
                    }
                }
            }
            None => false,
        };
        report("search (webz)", search_ok);

        let target = self.translator.target_language().to_string();
        let translated = self.translator.translate("Hello world", &target).await;
        report("translation", translated.is_some_and(|t| !t.is_empty()));

        let telegram_ok = match &self.telegram {
            Some(tg) => tg.test_connection().await,
            None => false,
        };
        report("telegram", telegram_ok);

        if send_test {
            report("test message", self.publisher.send_test_message().await);
        }
    }

    /// Write the snapshot; failures are logged and the caller carries on.
    async fn persist(&self) {
        let _guard = self.save_lock.lock().await;
        if let Err(e) = snapshot::save(&self.store, &self.data_file).await {
            error!(error = %e, path = %self.data_file.display(), "Failed to save snapshot");
        }
    }

    #[instrument(level = "info", skip_all)]
    async fn crawl(&self) {
        let schedule = &self.settings.schedule;
        let mut total = 0usize;
        for language in &self.settings.search.languages {
            let req = IngestRequest {
                language: language.clone(),
                date: None,
                max_pages: schedule.crawler_max_pages,
                limit: schedule.crawler_max_results,
            };
            total += self.pipeline.ingest(&req).await.articles.len();
        }
        info!(collected = total, "Crawler job done");
        self.persist().await;
    }

    async fn translate_batch(&self) {
        let batch = self.workflow.run_translation_batch(None).await;
        info!(translated = batch.translated, failed = batch.failed, "Translator job done");
        self.persist().await;
    }

    async fn publish_cycle(&self) {
        match self.workflow.run_publish_cycle().await {
            Ok(outcome) => info!(outcome = ?outcome, "Publisher job done"),
            Err(e) => error!(error = %e, "Publisher job failed"),
        }
        self.persist().await;
    }

    /// Run the three periodic jobs until Ctrl-C.
    async fn run_jobs(&self) {
        let schedule = &self.settings.schedule;
        let jobs = join3(
            every("crawler", schedule.crawler_interval_mins, || self.crawl()),
            every("translator", schedule.translator_interval_mins, || {
                self.translate_batch()
            }),
            every("publisher", schedule.publisher_interval_mins, || {
                self.publish_cycle()
            }),
        );
        tokio::select! {
            _ = jobs => {}
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!(error = %e, "Failed to listen for shutdown signal");
                }
                info!("Shutdown requested");
            }
        }
    }
}

/// Run `job` on a fixed period, starting immediately. Missed ticks are skipped.
async fn every<F, Fut>(name: &'static str, minutes: u64, mut job: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let period = Duration::from_secs(minutes.max(1) * 60);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(job = name, minutes = minutes.max(1), "Job scheduled");
    loop {
        ticker.tick().await;
        let t0 = Instant::now();
        job().await;
        info!(job = name, elapsed_ms = t0.elapsed().as_millis() as u64, "Job finished");
    }
}

fn print_outcome(outcome: &IngestOutcome) {
    println!(
        "collected: {} ({} high priority), duplicates: {}, url conflicts: {}, below threshold: {}, failed: {}, pages: {}",
        outcome.articles.len(),
        outcome.high_priority,
        outcome.duplicates,
        outcome.url_conflicts,
        outcome.below_threshold,
        outcome.failed,
        outcome.pages
    );
    for article in &outcome.articles {
        println!("  [{}] {:.3} {}", article.id, article.score, article.title);
    }
}

fn print_publish(outcome: PublishOutcome) {
    match outcome {
        PublishOutcome::Idle => println!("nothing to publish"),
        PublishOutcome::Published(id) => println!("published article {id}"),
        PublishOutcome::DeliveryFailed(id) => println!("delivery failed for article {id}"),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report(check: &str, ok: bool) {
    println!("{check:<16} {}", if ok { "OK" } else { "FAILED" });
}
