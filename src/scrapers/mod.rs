//! News search providers.
//!
//! Collection goes through a paginated search API rather than scraping
//! outlet pages. A provider answers a [`SearchQuery`] with one
//! [`SearchPage`] of posts plus an optional `next` cursor; the ingestion
//! pipeline follows cursors up to its page budget.
//!
//! # Supported Providers
//!
//! | Provider | Module | Notes |
//! |----------|--------|-------|
//! | Webz.io News API Lite | [`webz`] | Token in the query string; relative `next` cursors |

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

pub mod webz;

pub use webz::WebzClient;

/// One search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// Provider query expression, e.g. `iran category:politics language:english`.
    pub q: String,
    /// Only posts crawled at or after this instant.
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub posts: Vec<SearchPost>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default, rename = "requestsLeft")]
    pub requests_left: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Thread {
    #[serde(default)]
    pub domain_rank: Option<i64>,
}

/// A post as the provider reports it. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SearchPost {
    #[serde(default)]
    pub title: String,
    /// Highlighted snippet, may contain markup.
    #[serde(default, rename = "highlightText")]
    pub highlight_text: String,
    #[serde(default)]
    pub url: String,
    /// Loosely ISO 8601.
    #[serde(default)]
    pub published: Option<String>,
    #[serde(default)]
    pub thread: Thread,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub sentiment: Option<String>,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// First page of results for `query`, authenticated with `key`.
    async fn search(&self, query: &SearchQuery, key: &str) -> Result<SearchPage>;

    /// Follow a `next` cursor from a previous page.
    async fn next_page(&self, cursor: &str) -> Result<SearchPage>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_tolerates_missing_fields() {
        let page: SearchPage = serde_json::from_str(
            r#"{"posts":[{"title":"Only a title"}],"moreResultsAvailable":0}"#,
        )
        .unwrap();
        assert_eq!(page.posts.len(), 1);
        assert_eq!(page.posts[0].title, "Only a title");
        assert_eq!(page.posts[0].thread.domain_rank, None);
        assert!(page.next.is_none());
        assert!(page.requests_left.is_none());
    }

    #[test]
    fn page_reads_wire_names() {
        let page: SearchPage = serde_json::from_str(
            r#"{
                "posts": [{
                    "title": "Talks resume",
                    "highlightText": "<em>Talks</em> resume",
                    "url": "https://news.example/a",
                    "published": "2024-03-01T10:00:00.000+02:00",
                    "thread": {"domain_rank": 1500},
                    "categories": ["Politics"],
                    "sentiment": "negative"
                }],
                "next": "/newsApiLite?token=t&from=10",
                "requestsLeft": 42
            }"#,
        )
        .unwrap();
        let post = &page.posts[0];
        assert_eq!(post.highlight_text, "<em>Talks</em> resume");
        assert_eq!(post.thread.domain_rank, Some(1500));
        assert_eq!(post.sentiment.as_deref(), Some("negative"));
        assert_eq!(page.next.as_deref(), Some("/newsApiLite?token=t&from=10"));
        assert_eq!(page.requests_left, Some(42));
    }
}
