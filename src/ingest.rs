//! Ingestion pipeline: search, score, deduplicate, persist.
//!
//! One [`IngestionPipeline::ingest`] call issues a single query for one
//! language and day, then follows `next` cursors until the page budget or
//! the result limit is reached. Every post is turned into a [`Candidate`],
//! scored, checked against the trailing window of stored articles and
//! persisted in `Collected` state when it passes.
//!
//! # Failure Policy
//!
//! - First page rejected (non-2xx, timeout, bad JSON): rotate the search key
//!   and return what was collected so far (nothing). The next scheduled run
//!   retries with the new key.
//! - Later page fails: stop paginating, keep what was stored.
//! - One post fails to persist: log it and move on.
//!
//! # Known Limitation
//!
//! The duplicate window is read once per query. Posts accepted earlier in
//! the same query are not part of it, so two near-identical posts returned
//! together are both stored (URL uniqueness still applies).

use crate::config::Settings;
use crate::dedup::DuplicateDetector;
use crate::error::{Error, Result};
use crate::keys::KeyPool;
use crate::models::{Article, Candidate, NewArticle};
use crate::scoring::{PriorityLevel, Scorer};
use crate::scrapers::{SearchPage, SearchPost, SearchProvider, SearchQuery};
use crate::store::ArticleStore;
use crate::utils::{parse_published, strip_html};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveTime, Utc};
use itertools::Itertools;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// A single-day ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRequest {
    pub language: String,
    /// Day to search from; today (UTC) when `None`.
    pub date: Option<NaiveDate>,
    pub max_pages: usize,
    pub limit: usize,
}

/// A day-by-day ingestion over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRequest {
    pub language: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// Optional OR-group narrowing the core topic.
    pub keywords: Vec<String>,
    /// Page budget per day.
    pub max_pages: usize,
    /// Total accepted articles across the whole range.
    pub limit: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestOutcome {
    /// Newly stored articles, in provider order.
    pub articles: Vec<Article>,
    pub duplicates: usize,
    /// Posts whose URL is already stored.
    pub url_conflicts: usize,
    pub below_threshold: usize,
    pub failed: usize,
    pub pages: usize,
    /// Stored articles at or above the high-priority score.
    pub high_priority: usize,
}

impl IngestOutcome {
    fn absorb(&mut self, other: IngestOutcome) {
        self.articles.extend(other.articles);
        self.duplicates += other.duplicates;
        self.url_conflicts += other.url_conflicts;
        self.below_threshold += other.below_threshold;
        self.failed += other.failed;
        self.pages += other.pages;
        self.high_priority += other.high_priority;
    }
}

/// Midnight UTC of `day`.
fn day_start(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

pub struct IngestionPipeline {
    provider: Arc<dyn SearchProvider>,
    store: Arc<dyn ArticleStore>,
    keys: KeyPool,
    scorer: Scorer,
    detector: DuplicateDetector,
    core_topic: String,
    category_filter: Option<String>,
    min_score: f64,
    window: ChronoDuration,
    day_delay: Duration,
}

impl IngestionPipeline {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        store: Arc<dyn ArticleStore>,
        settings: &Settings,
    ) -> Self {
        Self {
            provider,
            store,
            keys: KeyPool::new("webz", settings.search.api_keys.iter().cloned()),
            scorer: Scorer::new(&settings.scoring),
            detector: DuplicateDetector::new(&settings.dedup),
            core_topic: settings.search.core_topic.clone(),
            category_filter: settings.search.category_filter.clone(),
            min_score: settings.scoring.min_score,
            window: ChronoDuration::days(settings.scoring.window_days),
            day_delay: Duration::from_millis(settings.search.day_delay_ms),
        }
    }

    pub fn keys(&self) -> &KeyPool {
        &self.keys
    }

    /// `iran category:politics language:english`
    pub fn simple_query(&self, language: &str) -> String {
        match &self.category_filter {
            Some(category) => format!("{} category:{category} language:{language}", self.core_topic),
            None => format!("{} language:{language}", self.core_topic),
        }
    }

    /// `(iran) AND (sanctions OR talks) language:english`
    pub fn advanced_query(&self, language: &str, keywords: &[String]) -> String {
        let group = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .join(" OR ");
        if group.is_empty() {
            format!("({}) language:{language}", self.core_topic)
        } else {
            format!("({}) AND ({group}) language:{language}", self.core_topic)
        }
    }

    /// Collect one day of results for one language.
    #[instrument(level = "info", skip_all, fields(language = %req.language, date = ?req.date))]
    pub async fn ingest(&self, req: &IngestRequest) -> IngestOutcome {
        let day = req.date.unwrap_or_else(|| Utc::now().date_naive());
        let query = SearchQuery {
            q: self.simple_query(&req.language),
            since: day_start(day),
        };
        let outcome = match self
            .run_query(&query, &req.language, req.max_pages, req.limit)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(error = %e, "Ingestion aborted");
                IngestOutcome::default()
            }
        };
        log_summary(&req.language, &outcome);
        outcome
    }

    /// Collect a date range, one query per day, pausing between days.
    ///
    /// A failed day rotates the key and moves on to the next day.
    #[instrument(level = "info", skip_all, fields(language = %req.language, from = %req.from, to = %req.to))]
    pub async fn ingest_range(&self, req: &RangeRequest) -> IngestOutcome {
        let mut total = IngestOutcome::default();
        if !self.keys.is_configured() {
            warn!("No search API keys configured; skipping ingestion");
            return total;
        }
        let q = self.advanced_query(&req.language, &req.keywords);
        let mut day = req.from;

        while day <= req.to && total.articles.len() < req.limit {
            let query = SearchQuery {
                q: q.clone(),
                since: day_start(day),
            };
            let remaining = req.limit - total.articles.len();
            match self
                .run_query(&query, &req.language, req.max_pages, remaining)
                .await
            {
                Ok(outcome) => {
                    info!(%day, collected = outcome.articles.len(), "Day ingested");
                    total.absorb(outcome);
                }
                Err(e) => warn!(%day, error = %e, "Day failed; continuing"),
            }

            let Some(next) = day.succ_opt() else { break };
            day = next;
            if day <= req.to && !self.day_delay.is_zero() {
                sleep(self.day_delay).await;
            }
        }

        log_summary(&req.language, &total);
        total
    }

    /// Fetch the first page with the current key, then follow cursors.
    ///
    /// Errors only when nothing could be fetched at all.
    async fn run_query(
        &self,
        query: &SearchQuery,
        language: &str,
        max_pages: usize,
        limit: usize,
    ) -> Result<IngestOutcome> {
        let Some(key) = self.keys.current() else {
            warn!("No search API keys configured; skipping ingestion");
            return Err(Error::Unconfigured("search provider"));
        };

        let first = match self.provider.search(query, key).await {
            Ok(page) => page,
            Err(e) => {
                error!(error = %e, key_index = self.keys.current_index(), "Search request failed");
                if e.is_transient() {
                    self.keys.rotate();
                }
                return Err(e);
            }
        };

        let window = self
            .store
            .recent_window(Utc::now() - self.window)
            .await
            .inspect_err(|e| error!(error = %e, "Could not load duplicate window"))?;
        debug!(window = window.len(), "Loaded duplicate window");

        let mut outcome = IngestOutcome::default();
        let mut page: SearchPage = first;
        let budget = max_pages.max(1);

        loop {
            outcome.pages += 1;
            for post in &page.posts {
                if outcome.articles.len() >= limit {
                    break;
                }
                self.process_post(post, language, &window, &mut outcome).await;
            }

            if outcome.articles.len() >= limit || outcome.pages >= budget {
                break;
            }
            let Some(cursor) = page.next.take() else { break };
            page = match self.provider.next_page(&cursor).await {
                Ok(next) => next,
                Err(e) => {
                    error!(error = %e, page = outcome.pages + 1, "Pagination error");
                    break;
                }
            };
        }
        Ok(outcome)
    }

    fn to_candidate(post: &SearchPost) -> Candidate {
        let published_at = post
            .published
            .as_deref()
            .and_then(parse_published)
            .unwrap_or_else(|| {
                debug!(raw = ?post.published, "Unparseable publish time; using now");
                Utc::now()
            });
        Candidate {
            title: post.title.trim().to_string(),
            body_text: strip_html(&post.highlight_text),
            published_at,
            domain_rank: post.thread.domain_rank,
            categories: post.categories.clone(),
        }
    }

    async fn process_post(
        &self,
        post: &SearchPost,
        language: &str,
        window: &[Article],
        outcome: &mut IngestOutcome,
    ) {
        let url = post.url.trim();
        if url.is_empty() || post.title.trim().is_empty() {
            debug!(url, "Post without url or title; skipping");
            outcome.failed += 1;
            return;
        }

        match self.store.get_by_url(url).await {
            Ok(Some(existing)) => {
                debug!(url, existing_id = %existing.id, "URL already stored");
                outcome.url_conflicts += 1;
                return;
            }
            Ok(None) => {}
            Err(e) => {
                error!(url, error = %e, "URL lookup failed; skipping post");
                outcome.failed += 1;
                return;
            }
        }

        let candidate = Self::to_candidate(post);
        let score = self.scorer.score(&candidate, Utc::now());

        if let Some(existing) =
            self.detector
                .find_duplicate(&candidate.title, &candidate.body_text, window)
        {
            debug!(url, existing_id = %existing.id, "Duplicate of a recent article");
            outcome.duplicates += 1;
            return;
        }
        if score < self.min_score {
            debug!(url, score, min = self.min_score, "Below minimum score");
            outcome.below_threshold += 1;
            return;
        }

        let new = NewArticle {
            title: candidate.title,
            body_text: candidate.body_text,
            url: url.to_string(),
            published_at: candidate.published_at,
            domain_rank: candidate.domain_rank,
            categories: candidate.categories,
            sentiment: post.sentiment.clone(),
            language: language.to_string(),
            score,
        };
        match self.store.create(new).await {
            Ok(article) => {
                info!(
                    article_id = %article.id,
                    score,
                    priority = %PriorityLevel::from_score(score),
                    "Collected article"
                );
                if self.scorer.is_high_priority(score) {
                    info!(article_id = %article.id, score, title = %article.title, "High score article");
                    outcome.high_priority += 1;
                }
                outcome.articles.push(article);
            }
            Err(Error::DuplicateUrl(url)) => {
                debug!(%url, "URL stored concurrently");
                outcome.url_conflicts += 1;
            }
            Err(e) => {
                error!(url, error = %e, "Failed to persist article");
                outcome.failed += 1;
            }
        }
    }
}

fn log_summary(language: &str, outcome: &IngestOutcome) {
    info!(
        language,
        collected = outcome.articles.len(),
        duplicates = outcome.duplicates,
        url_conflicts = outcome.url_conflicts,
        below_threshold = outcome.below_threshold,
        failed = outcome.failed,
        pages = outcome.pages,
        high_priority = outcome.high_priority,
        "Ingestion finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArticleState, fixtures::new_article};
    use crate::scrapers::testing::{ScriptedProvider, page, post};
    use crate::store::MemoryStore;

    fn settings(keys: &[&str]) -> Settings {
        let mut settings = Settings::default();
        settings.search.api_keys = keys.iter().map(|k| k.to_string()).collect();
        settings.search.day_delay_ms = 0;
        settings
    }

    fn pipeline(
        provider: Arc<ScriptedProvider>,
        store: Arc<MemoryStore>,
        settings: &Settings,
    ) -> IngestionPipeline {
        IngestionPipeline::new(provider, store, settings)
    }

    fn request(max_pages: usize, limit: usize) -> IngestRequest {
        IngestRequest {
            language: "english".into(),
            date: None,
            max_pages,
            limit,
        }
    }

    const HEADLINES: [&str; 6] = [
        "Iran nuclear talks stall",
        "Tehran sanctions debate",
        "IRGC drills near Hormuz",
        "Khamenei addresses assembly",
        "Raisi visits Beijing",
        "JCPOA parties meet",
    ];

    const BODIES: [&str; 6] = [
        "<p>Negotiators left Vienna without a <b>deal</b> on enrichment caps.</p>",
        "<p>Parliament argued over the economic cost of new <b>sanctions</b>.</p>",
        "<p>Naval units staged exercises close to the Strait of Hormuz.</p>",
        "<p>The supreme leader spoke to the Assembly of Experts on Thursday.</p>",
        "<p>Trade agreements were signed during a state visit to China.</p>",
        "<p>Signatories of the 2015 accord gathered for a technical review.</p>",
    ];

    fn story(n: usize) -> SearchPost {
        post(
            &format!("https://news.example/{n}"),
            HEADLINES[n % 6],
            BODIES[n % 6],
        )
    }

    #[tokio::test]
    async fn accepted_posts_are_stored_in_provider_order() {
        let provider = Arc::new(ScriptedProvider::new(vec![Some(page(
            vec![story(0), story(1), story(2)],
            None,
        ))]));
        let store = Arc::new(MemoryStore::new());
        let out = pipeline(provider, store.clone(), &settings(&["k1"]))
            .ingest(&request(5, 100))
            .await;

        let urls: Vec<&str> = out.articles.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://news.example/0", "https://news.example/1", "https://news.example/2"]
        );
        let first = &out.articles[0];
        assert_eq!(first.state, ArticleState::Collected);
        assert_eq!(first.language, "english");
        assert_eq!(first.sentiment.as_deref(), Some("neutral"));
        assert!(!first.body_text.contains('<'));
        assert!(first.score >= 0.3 && first.score <= 1.0);
        assert_eq!(store.all().await.len(), 3);
    }

    #[tokio::test]
    async fn query_embeds_topic_category_and_language() {
        let provider = Arc::new(ScriptedProvider::new(vec![Some(page(vec![], None))]));
        let store = Arc::new(MemoryStore::new());
        pipeline(provider.clone(), store, &settings(&["k1"]))
            .ingest(&request(1, 10))
            .await;
        assert_eq!(provider.queries(), vec!["iran category:politics language:english"]);
    }

    #[tokio::test]
    async fn rejected_request_rotates_key_and_returns_nothing() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            None,
            Some(page(vec![story(0)], None)),
        ]));
        let store = Arc::new(MemoryStore::new());
        let p = pipeline(provider.clone(), store, &settings(&["k1", "k2"]));

        let out = p.ingest(&request(5, 100)).await;
        assert!(out.articles.is_empty());
        assert_eq!(p.keys().current(), Some("k2"));

        let out = p.ingest(&request(5, 100)).await;
        assert_eq!(out.articles.len(), 1);
        assert_eq!(provider.keys_used(), vec!["k1", "k2"]);
        // success keeps the key
        assert_eq!(p.keys().current(), Some("k2"));
    }

    #[tokio::test]
    async fn empty_key_pool_is_a_no_op() {
        let provider = Arc::new(ScriptedProvider::new(vec![Some(page(vec![story(0)], None))]));
        let store = Arc::new(MemoryStore::new());
        let out = pipeline(provider.clone(), store, &settings(&[]))
            .ingest(&request(5, 100))
            .await;
        assert!(out.articles.is_empty());
        assert!(provider.keys_used().is_empty());
    }

    #[tokio::test]
    async fn follows_cursors_up_to_page_budget() {
        let provider = Arc::new(
            ScriptedProvider::new(vec![Some(page(vec![story(0)], Some("/p2")))])
                .with_cursor("/p2", page(vec![story(1)], Some("/p3")))
                .with_cursor("/p3", page(vec![story(2)], None)),
        );
        let store = Arc::new(MemoryStore::new());
        let out = pipeline(provider, store, &settings(&["k1"]))
            .ingest(&request(2, 100))
            .await;
        assert_eq!(out.pages, 2);
        assert_eq!(out.articles.len(), 2);
    }

    #[tokio::test]
    async fn stops_at_result_limit() {
        let provider = Arc::new(
            ScriptedProvider::new(vec![Some(page(vec![story(0), story(1), story(2)], Some("/p2")))])
                .with_cursor("/p2", page(vec![story(3)], None)),
        );
        let store = Arc::new(MemoryStore::new());
        let out = pipeline(provider, store.clone(), &settings(&["k1"]))
            .ingest(&request(5, 2))
            .await;
        assert_eq!(out.articles.len(), 2);
        assert_eq!(out.pages, 1);
        assert_eq!(store.all().await.len(), 2);
    }

    #[tokio::test]
    async fn pagination_error_keeps_earlier_pages() {
        let provider = Arc::new(ScriptedProvider::new(vec![Some(page(
            vec![story(0)],
            Some("/missing"),
        ))]));
        let store = Arc::new(MemoryStore::new());
        let out = pipeline(provider, store, &settings(&["k1"]))
            .ingest(&request(5, 100))
            .await;
        assert_eq!(out.articles.len(), 1);
        assert_eq!(out.pages, 1);
    }

    #[tokio::test]
    async fn near_duplicate_of_recent_article_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let mut existing = new_article("https://other.example/a", "Iran and IAEA agree on new inspections");
        existing.body_text = "completely unrelated body".into();
        store.create(existing).await.unwrap();

        let dup = post(
            "https://news.example/dup",
            "Iran and IAEA agree on new inspection",
            "fresh wording of the story",
        );
        let provider = Arc::new(ScriptedProvider::new(vec![Some(page(vec![dup, story(1)], None))]));
        let out = pipeline(provider, store.clone(), &settings(&["k1"]))
            .ingest(&request(5, 100))
            .await;
        assert_eq!(out.duplicates, 1);
        assert_eq!(out.articles.len(), 1);
        assert!(store.get_by_url("https://news.example/dup").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn articles_outside_the_window_do_not_block() {
        let store = Arc::new(MemoryStore::new());
        let mut old = new_article("https://other.example/old", "Iran and IAEA agree on new inspections");
        old.published_at = Utc::now() - ChronoDuration::days(30);
        store.create(old).await.unwrap();

        let again = post(
            "https://news.example/again",
            "Iran and IAEA agree on new inspections",
            "a month later the same headline returns",
        );
        let provider = Arc::new(ScriptedProvider::new(vec![Some(page(vec![again], None))]));
        let out = pipeline(provider, store, &settings(&["k1"]))
            .ingest(&request(5, 100))
            .await;
        assert_eq!(out.articles.len(), 1);
    }

    #[tokio::test]
    async fn same_batch_near_duplicates_are_both_stored() {
        let a = post("https://news.example/a", "Iran nuclear talks resume in Vienna", "first body");
        let b = post("https://news.example/b", "Iran nuclear talks resume in Vienna", "second body");
        let provider = Arc::new(ScriptedProvider::new(vec![Some(page(vec![a, b], None))]));
        let store = Arc::new(MemoryStore::new());
        let out = pipeline(provider, store, &settings(&["k1"]))
            .ingest(&request(5, 100))
            .await;
        assert_eq!(out.articles.len(), 2);
    }

    #[tokio::test]
    async fn stored_url_is_counted_not_stored_twice() {
        let store = Arc::new(MemoryStore::new());
        store
            .create(new_article("https://news.example/0", "Completely other title"))
            .await
            .unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![Some(page(vec![story(0)], None))]));
        let out = pipeline(provider, store.clone(), &settings(&["k1"]))
            .ingest(&request(5, 100))
            .await;
        assert_eq!(out.url_conflicts, 1);
        assert!(out.articles.is_empty());
        assert_eq!(store.all().await.len(), 1);
    }

    #[tokio::test]
    async fn low_scores_are_dropped() {
        let mut s = settings(&["k1"]);
        s.scoring.min_score = 0.99;
        let mut weak = post("https://news.example/weak", "Harvest festival opens", "Local fair");
        weak.published = Some("2001-01-01T00:00:00Z".into());
        weak.thread.domain_rank = Some(5_000_000);
        weak.categories = vec!["Lifestyle".into()];
        let provider = Arc::new(ScriptedProvider::new(vec![Some(page(vec![weak], None))]));
        let store = Arc::new(MemoryStore::new());
        let out = pipeline(provider, store, &s).ingest(&request(5, 100)).await;
        assert_eq!(out.below_threshold, 1);
        assert!(out.articles.is_empty());
    }

    #[tokio::test]
    async fn high_scores_are_counted() {
        let mut stale = post("https://news.example/stale", "Harvest festival opens", "Local fair");
        stale.published = Some("2001-01-01T00:00:00Z".into());
        stale.thread.domain_rank = Some(5_000_000);
        stale.categories = vec![];
        let provider = Arc::new(ScriptedProvider::new(vec![Some(page(
            vec![story(0), stale],
            None,
        ))]));
        let mut s = settings(&["k1"]);
        s.scoring.min_score = 0.0;
        let out = pipeline(provider, Arc::new(MemoryStore::new()), &s)
            .ingest(&request(5, 100))
            .await;

        assert_eq!(out.articles.len(), 2);
        assert!(out.articles[0].score >= s.scoring.high_priority);
        assert!(out.articles[1].score < s.scoring.high_priority);
        assert_eq!(out.high_priority, 1);
    }

    #[tokio::test]
    async fn unparseable_publish_time_falls_back_to_now() {
        let mut odd = story(0);
        odd.published = Some("last Tuesday".into());
        let provider = Arc::new(ScriptedProvider::new(vec![Some(page(vec![odd], None))]));
        let store = Arc::new(MemoryStore::new());
        let before = Utc::now();
        let out = pipeline(provider, store, &settings(&["k1"]))
            .ingest(&request(5, 100))
            .await;
        assert_eq!(out.articles.len(), 1);
        assert!(out.articles[0].published_at >= before);
    }

    #[tokio::test]
    async fn posts_without_url_are_skipped() {
        let mut broken = story(0);
        broken.url = String::new();
        let provider = Arc::new(ScriptedProvider::new(vec![Some(page(vec![broken, story(1)], None))]));
        let store = Arc::new(MemoryStore::new());
        let out = pipeline(provider, store, &settings(&["k1"]))
            .ingest(&request(5, 100))
            .await;
        assert_eq!(out.failed, 1);
        assert_eq!(out.articles.len(), 1);
    }

    #[test]
    fn advanced_query_builds_keyword_group() {
        let p = pipeline(
            Arc::new(ScriptedProvider::default()),
            Arc::new(MemoryStore::new()),
            &settings(&["k1"]),
        );
        assert_eq!(
            p.advanced_query("french", &["sanctions".into(), " talks ".into(), "".into()]),
            "(iran) AND (sanctions OR talks) language:french"
        );
        assert_eq!(p.advanced_query("french", &[]), "(iran) language:french");
    }

    #[tokio::test]
    async fn range_continues_past_a_failed_day() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Some(page(vec![story(0)], None)),
            None,
            Some(page(vec![story(2), story(3)], None)),
        ]));
        let store = Arc::new(MemoryStore::new());
        let p = pipeline(provider.clone(), store, &settings(&["k1", "k2"]));
        let out = p
            .ingest_range(&RangeRequest {
                language: "english".into(),
                from: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                to: NaiveDate::from_ymd_opt(2024, 3, 3).unwrap(),
                keywords: vec!["sanctions".into()],
                max_pages: 1,
                limit: 10,
            })
            .await;

        assert_eq!(out.articles.len(), 3);
        assert_eq!(provider.keys_used(), vec!["k1", "k1", "k2"]);
        assert!(provider
            .queries()
            .iter()
            .all(|q| q == "(iran) AND (sanctions) language:english"));
    }

    #[tokio::test]
    async fn range_limit_spans_days() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Some(page(vec![story(0), story(1)], None)),
            Some(page(vec![story(2), story(3)], None)),
            Some(page(vec![story(4)], None)),
        ]));
        let store = Arc::new(MemoryStore::new());
        let out = pipeline(provider.clone(), store, &settings(&["k1"]))
            .ingest_range(&RangeRequest {
                language: "english".into(),
                from: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                to: NaiveDate::from_ymd_opt(2024, 3, 3).unwrap(),
                keywords: vec![],
                max_pages: 1,
                limit: 3,
            })
            .await;
        assert_eq!(out.articles.len(), 3);
        assert_eq!(provider.keys_used().len(), 2);
    }
}
