//! Article persistence.
//!
//! [`ArticleStore`] is the boundary the pipeline and workflow talk to. The
//! crate ships [`MemoryStore`], an in-process engine that can be saved to and
//! loaded from a JSON snapshot (see [`snapshot`]).

use crate::error::Result;
use crate::models::{Article, ArticleId, ArticleState, NewArticle};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

pub mod memory;
pub mod snapshot;

pub use memory::MemoryStore;

/// A mutation applied to one article. Returning an error discards every change.
pub type Mutation<'a> = Box<dyn FnOnce(&mut Article) -> Result<()> + Send + 'a>;

/// Mutation applied to each article of a bulk update.
pub type BulkMutation<'a> = &'a (dyn Fn(&mut Article) -> Result<()> + Send + Sync);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Highest score first.
    #[default]
    Score,
    /// Most recently published first.
    Published,
    /// Most recently created first.
    Created,
}

#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub state: Option<ArticleState>,
    pub language: Option<String>,
    pub min_score: Option<f64>,
    /// Case-insensitive substring of the title, body, translation or edit.
    pub text: Option<String>,
    pub published_since: Option<DateTime<Utc>>,
    pub order: SortOrder,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl ArticleFilter {
    pub fn in_state(state: ArticleState) -> Self {
        Self {
            state: Some(state),
            ..Default::default()
        }
    }

    pub fn order_by(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, article: &Article) -> bool {
        self.state.is_none_or(|s| article.state == s)
            && self
                .language
                .as_deref()
                .is_none_or(|l| article.language == l)
            && self.min_score.is_none_or(|m| article.score >= m)
            && self
                .text
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .is_none_or(|t| mentions(article, t))
            && self
                .published_since
                .is_none_or(|since| article.published_at >= since)
    }
}

fn mentions(article: &Article, needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    [
        Some(&article.title),
        Some(&article.body_text),
        article.translated_text.as_ref(),
        article.edited_text.as_ref(),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(&needle))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub by_state: BTreeMap<ArticleState, usize>,
    pub by_language: BTreeMap<String, usize>,
    pub average_score: f64,
    pub high_priority: usize,
    /// Articles created since midnight UTC.
    pub today: DayStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DayStats {
    pub total: usize,
    pub by_state: BTreeMap<ArticleState, usize>,
    pub by_language: BTreeMap<String, usize>,
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Persist a new article in `Collected` state. Fails with
    /// [`Error::DuplicateUrl`](crate::Error::DuplicateUrl) if the URL exists.
    async fn create(&self, article: NewArticle) -> Result<Article>;

    async fn get(&self, id: ArticleId) -> Result<Option<Article>>;

    async fn get_by_url(&self, url: &str) -> Result<Option<Article>>;

    /// Apply `mutation` atomically and return the committed article.
    async fn update(&self, id: ArticleId, mutation: Mutation<'_>) -> Result<Article>;

    async fn query(&self, filter: &ArticleFilter) -> Result<Vec<Article>>;

    /// Articles published at or after `since`.
    async fn recent_window(&self, since: DateTime<Utc>) -> Result<Vec<Article>> {
        self.query(&ArticleFilter {
            published_since: Some(since),
            order: SortOrder::Published,
            ..Default::default()
        })
        .await
    }

    /// Apply `mutation` to each id; returns how many articles were changed.
    /// Missing ids and rejected mutations are skipped.
    async fn bulk_update(&self, ids: &[ArticleId], mutation: BulkMutation<'_>) -> Result<usize>;

    /// Aggregate counts; `high_priority` counts scores at or above the threshold.
    async fn stats(&self, high_priority: f64) -> Result<StoreStats>;
}
