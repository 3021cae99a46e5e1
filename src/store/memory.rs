use super::{ArticleFilter, ArticleStore, BulkMutation, Mutation, SortOrder, StoreStats};
use crate::error::{Error, Result};
use crate::models::{Article, ArticleId, NewArticle};
use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    articles: BTreeMap<ArticleId, Article>,
    by_url: HashMap<String, ArticleId>,
}

impl Inner {
    fn insert(&mut self, article: Article) -> Result<()> {
        if self.by_url.contains_key(&article.url) {
            return Err(Error::DuplicateUrl(article.url));
        }
        self.next_id = self.next_id.max(article.id.0);
        self.by_url.insert(article.url.clone(), article.id);
        self.articles.insert(article.id, article);
        Ok(())
    }

    /// Run `mutation` on a copy and commit only if it succeeds.
    fn apply(
        &mut self,
        id: ArticleId,
        mutation: impl FnOnce(&mut Article) -> Result<()>,
    ) -> Result<Article> {
        let current = self.articles.get(&id).ok_or(Error::NotFound(id))?;
        let mut draft = current.clone();
        mutation(&mut draft)?;
        // identity fields are owned by the store
        draft.id = id;
        draft.url = current.url.clone();
        draft.created_at = current.created_at;
        draft.updated_at = Utc::now();
        self.articles.insert(id, draft.clone());
        Ok(draft)
    }
}

/// In-process [`ArticleStore`].
///
/// Every mutation runs under the write lock, so concurrent jobs never
/// interleave field updates on the same article.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from previously saved articles.
    pub fn from_articles(articles: impl IntoIterator<Item = Article>) -> Result<Self> {
        let mut inner = Inner::default();
        for article in articles {
            inner.insert(article)?;
        }
        Ok(Self {
            inner: RwLock::new(inner),
        })
    }

    /// Every stored article in id order.
    pub async fn all(&self) -> Vec<Article> {
        self.inner.read().await.articles.values().cloned().collect()
    }
}

fn compare(order: SortOrder, a: &Article, b: &Article) -> Ordering {
    let primary = match order {
        SortOrder::Score => b.score.total_cmp(&a.score),
        SortOrder::Published => b.published_at.cmp(&a.published_at),
        SortOrder::Created => b.created_at.cmp(&a.created_at),
    };
    primary.then(a.id.cmp(&b.id))
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn create(&self, new: NewArticle) -> Result<Article> {
        let mut inner = self.inner.write().await;
        if inner.by_url.contains_key(&new.url) {
            return Err(Error::DuplicateUrl(new.url));
        }
        let id = ArticleId(inner.next_id + 1);
        let article = Article::from_new(id, new, Utc::now());
        inner.insert(article.clone())?;
        debug!(article_id = %id, url = %article.url, "Created article");
        Ok(article)
    }

    async fn get(&self, id: ArticleId) -> Result<Option<Article>> {
        Ok(self.inner.read().await.articles.get(&id).cloned())
    }

    async fn get_by_url(&self, url: &str) -> Result<Option<Article>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_url
            .get(url)
            .and_then(|id| inner.articles.get(id))
            .cloned())
    }

    async fn update(&self, id: ArticleId, mutation: Mutation<'_>) -> Result<Article> {
        self.inner.write().await.apply(id, mutation)
    }

    async fn query(&self, filter: &ArticleFilter) -> Result<Vec<Article>> {
        let inner = self.inner.read().await;
        let mut found: Vec<Article> = inner
            .articles
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        found.sort_by(|a, b| compare(filter.order, a, b));
        let limit = filter.limit.unwrap_or(usize::MAX);
        Ok(found.into_iter().skip(filter.offset).take(limit).collect())
    }

    async fn bulk_update(&self, ids: &[ArticleId], mutation: BulkMutation<'_>) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let mut changed = 0;
        for id in ids {
            match inner.apply(*id, mutation) {
                Ok(_) => changed += 1,
                Err(e) => debug!(article_id = %id, error = %e, "Skipped in bulk update"),
            }
        }
        info!(requested = ids.len(), changed, "Bulk update applied");
        Ok(changed)
    }

    async fn stats(&self, high_priority: f64) -> Result<StoreStats> {
        let inner = self.inner.read().await;
        let mut stats = StoreStats {
            total: inner.articles.len(),
            ..Default::default()
        };
        let today = Utc::now().date_naive();
        let mut score_sum = 0.0;
        for article in inner.articles.values() {
            if article.created_at.date_naive() == today {
                stats.today.total += 1;
                *stats.today.by_state.entry(article.state).or_default() += 1;
                *stats.today.by_language.entry(article.language.clone()).or_default() += 1;
            }
            *stats.by_state.entry(article.state).or_default() += 1;
            *stats.by_language.entry(article.language.clone()).or_default() += 1;
            score_sum += article.score;
            if article.score >= high_priority {
                stats.high_priority += 1;
            }
        }
        if stats.total > 0 {
            stats.average_score = (score_sum / stats.total as f64 * 1000.0).round() / 1000.0;
        }
        Ok(stats)
    }
}
