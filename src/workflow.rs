//! Article workflow and the scheduler-facing jobs.
//!
//! ```text
//! Collected -> ApprovedForTranslate -> (TranslatedEdited) -> ReadyForFinal -> PublishedQueue -> Published
//!                                                                  \______________________________/
//!                                                                            publish now
//! ```
//!
//! Every state change goes through [`transition`], applied inside a single
//! store mutation, so a change is either fully committed or not at all.
//! Failures never move an article: it stays where it was and the next
//! scheduled run picks it up again.
//!
//! # Jobs
//!
//! | Job | Entry point | Summary |
//! |-----|-------------|---------|
//! | translator | [`Workflow::run_translation_batch`] | [`BatchOutcome`] |
//! | publisher | [`Workflow::run_publish_cycle`] | [`PublishOutcome`] |
//!
//! Queue selection draws from its own RNG, seeded independently of the
//! caption RNG in [`Publisher`].

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::models::{Article, ArticleId, ArticleState};
use crate::publish::Publisher;
use crate::store::{ArticleFilter, ArticleStore, SortOrder, StoreStats};
use crate::translate::Translator;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use std::sync::{Arc, Mutex};
use tracing::{error, info, instrument, warn};

/// Move `article` to `to`, enforcing the workflow graph and its text gates.
///
/// - `PublishedQueue` requires a translation or an edit
/// - `Published` requires some displayable text
pub fn transition(article: &mut Article, to: ArticleState) -> Result<()> {
    if !article.state.can_advance_to(to) {
        return Err(Error::InvalidTransition {
            id: article.id,
            from: article.state,
            to,
        });
    }
    let gated = match to {
        ArticleState::PublishedQueue => !article.has_translation(),
        ArticleState::Published => article.display_text().is_none(),
        _ => false,
    };
    if gated {
        return Err(Error::MissingText(article.id));
    }
    article.state = to;
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub translated: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Nothing queued and nothing ready to promote.
    Idle,
    Published(ArticleId),
    /// The channel refused the message; the article stays queued.
    DeliveryFailed(ArticleId),
}

pub struct Workflow {
    store: Arc<dyn ArticleStore>,
    translator: Arc<Translator>,
    publisher: Arc<Publisher>,
    queue_rng: Mutex<StdRng>,
    translation_batch: usize,
    queue_window: usize,
    high_priority: f64,
}

impl Workflow {
    /// `queue_seed` fixes queue selection (tests); `None` seeds from the OS.
    pub fn new(
        store: Arc<dyn ArticleStore>,
        translator: Arc<Translator>,
        publisher: Arc<Publisher>,
        settings: &Settings,
        queue_seed: Option<u64>,
    ) -> Self {
        let rng = match queue_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            store,
            translator,
            publisher,
            queue_rng: Mutex::new(rng),
            translation_batch: settings.workflow.translation_batch,
            queue_window: settings.workflow.queue_window,
            high_priority: settings.scoring.high_priority,
        }
    }

    async fn load(&self, id: ArticleId) -> Result<Article> {
        self.store.get(id).await?.ok_or(Error::NotFound(id))
    }

    async fn advance(&self, id: ArticleId, to: ArticleState) -> Result<Article> {
        let article = self
            .store
            .update(id, Box::new(move |a: &mut Article| transition(a, to)))
            .await?;
        info!(article_id = %id, state = %article.state, "Article advanced");
        Ok(article)
    }

    /// `Collected -> ApprovedForTranslate`, then one immediate translation attempt.
    ///
    /// Returns the article as it stands afterwards: `ReadyForFinal` when the
    /// translation succeeded, `ApprovedForTranslate` otherwise.
    #[instrument(level = "info", skip(self))]
    pub async fn approve_for_translation(&self, id: ArticleId) -> Result<Article> {
        let approved = self.advance(id, ArticleState::ApprovedForTranslate).await?;
        match self.translate_one(&approved).await {
            Ok(Some(translated)) => Ok(translated),
            Ok(None) => Ok(approved),
            Err(e) => {
                warn!(article_id = %id, error = %e, "Immediate translation not stored");
                self.load(id).await
            }
        }
    }

    /// Translate one approved article. `Ok(None)` when the translator gave up.
    async fn translate_one(&self, article: &Article) -> Result<Option<Article>> {
        let target = self.translator.target_language();
        let Some(text) = self
            .translator
            .translate(article.translation_source(), target)
            .await
            .filter(|t| !t.trim().is_empty())
        else {
            warn!(article_id = %article.id, "Translation failed; article stays approved");
            return Ok(None);
        };

        let updated = self
            .store
            .update(
                article.id,
                Box::new(move |a: &mut Article| {
                    transition(a, ArticleState::ReadyForFinal)?;
                    a.translated_text = Some(text.clone());
                    a.edited_text = Some(text);
                    Ok(())
                }),
            )
            .await?;
        info!(article_id = %updated.id, "Article translated");
        Ok(Some(updated))
    }

    /// Translate up to `limit` approved articles, highest score first.
    #[instrument(level = "info", skip(self))]
    pub async fn run_translation_batch(&self, limit: Option<usize>) -> BatchOutcome {
        let limit = limit.unwrap_or(self.translation_batch);
        let mut outcome = BatchOutcome::default();
        let pending = match self
            .store
            .query(
                &ArticleFilter::in_state(ArticleState::ApprovedForTranslate)
                    .order_by(SortOrder::Score)
                    .limit(limit),
            )
            .await
        {
            Ok(pending) => pending,
            Err(e) => {
                error!(error = %e, "Could not load articles awaiting translation");
                return outcome;
            }
        };

        for article in &pending {
            match self.translate_one(article).await {
                Ok(Some(_)) => outcome.translated += 1,
                Ok(None) => outcome.failed += 1,
                Err(e) => {
                    error!(article_id = %article.id, error = %e, "Failed to store translation");
                    outcome.failed += 1;
                }
            }
        }
        info!(
            pending = pending.len(),
            translated = outcome.translated,
            failed = outcome.failed,
            "Translation batch finished"
        );
        outcome
    }

    /// `ReadyForFinal -> PublishedQueue`; rejected without translated or edited text.
    #[instrument(level = "info", skip(self))]
    pub async fn final_approve(&self, id: ArticleId) -> Result<Article> {
        self.advance(id, ArticleState::PublishedQueue).await
    }

    /// Replace the human-edited text. A blank edit clears it.
    #[instrument(level = "info", skip(self, text))]
    pub async fn edit_text(&self, id: ArticleId, text: &str) -> Result<Article> {
        let text = Some(text.trim().to_string()).filter(|t| !t.is_empty());
        self.store
            .update(
                id,
                Box::new(move |a: &mut Article| {
                    a.edited_text = text;
                    Ok(())
                }),
            )
            .await
    }

    /// Uniform random pick from the queue.
    pub(crate) fn pick<'a>(&self, queue: &'a [Article]) -> Option<&'a Article> {
        match self.queue_rng.lock() {
            Ok(mut rng) => queue.choose(&mut *rng),
            Err(poisoned) => queue.choose(&mut *poisoned.into_inner()),
        }
    }

    /// Promote every `ReadyForFinal` article that can be queued.
    async fn promote_ready(&self) -> Result<usize> {
        let ready = self
            .store
            .query(&ArticleFilter::in_state(ArticleState::ReadyForFinal))
            .await?;
        if ready.is_empty() {
            return Ok(0);
        }
        let ids: Vec<ArticleId> = ready.iter().map(|a| a.id).collect();
        let promoted = self
            .store
            .bulk_update(&ids, &|a: &mut Article| {
                transition(a, ArticleState::PublishedQueue)
            })
            .await?;
        info!(ready = ready.len(), promoted, "Auto-promoted ready articles to the queue");
        Ok(promoted)
    }

    async fn queue(&self) -> Result<Vec<Article>> {
        self.store
            .query(
                &ArticleFilter::in_state(ArticleState::PublishedQueue)
                    .order_by(SortOrder::Published)
                    .limit(self.queue_window),
            )
            .await
    }

    /// Publish one randomly chosen queued article.
    ///
    /// An empty queue is refilled from `ReadyForFinal` first.
    #[instrument(level = "info", skip(self))]
    pub async fn run_publish_cycle(&self) -> Result<PublishOutcome> {
        let mut queue = self.queue().await?;
        if queue.is_empty() && self.promote_ready().await? > 0 {
            queue = self.queue().await?;
        }
        let Some(chosen) = self.pick(&queue) else {
            info!("Nothing to publish");
            return Ok(PublishOutcome::Idle);
        };
        info!(article_id = %chosen.id, queued = queue.len(), "Selected article to publish");

        let outcome = match self.publisher.publish(chosen).await {
            Ok(true) => {
                self.advance(chosen.id, ArticleState::Published).await?;
                PublishOutcome::Published(chosen.id)
            }
            Ok(false) => {
                warn!(article_id = %chosen.id, "Delivery refused; article stays queued");
                PublishOutcome::DeliveryFailed(chosen.id)
            }
            Err(e) => {
                warn!(article_id = %chosen.id, error = %e, "Could not format article");
                PublishOutcome::DeliveryFailed(chosen.id)
            }
        };
        Ok(outcome)
    }

    /// Publish a `ReadyForFinal` or queued article immediately.
    #[instrument(level = "info", skip(self))]
    pub async fn publish_now(&self, id: ArticleId) -> Result<Article> {
        let article = self.load(id).await?;
        // check the gates before anything is sent
        transition(&mut article.clone(), ArticleState::Published)?;

        if !self.publisher.publish(&article).await? {
            return Err(Error::Provider {
                provider: "telegram",
                message: format!("delivery of article {id} refused"),
            });
        }
        self.advance(id, ArticleState::Published).await
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        self.store.stats(self.high_priority).await
    }
}
