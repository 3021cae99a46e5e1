//! Webz.io News API Lite client.
//!
//! # Request Shape
//!
//! ```text
//! GET {base_url}{endpoint}?token=<key>&q=<query>&ts=<millis>&highlight=true
//! ```
//!
//! The response carries `posts`, a `next` cursor (often a path relative to
//! the API host, with the token already embedded) and the remaining quota in
//! `requestsLeft`.

use super::{SearchPage, SearchProvider, SearchQuery};
use crate::config::SearchSettings;
use crate::error::{Error, Result};
use crate::utils::truncate_for_log;
use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use url::Url;

const PROVIDER: &str = "webz";

#[derive(Debug, Clone)]
pub struct WebzClient {
    http: reqwest::Client,
    base_url: Url,
    endpoint: String,
}

impl WebzClient {
    pub fn new(settings: &SearchSettings) -> Result<Self> {
        let base_url = Url::parse(&settings.base_url)
            .map_err(|e| Error::config(format!("invalid search base url: {e}"), "search.base_url"))?;
        let http = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()?;
        Ok(Self {
            http,
            base_url,
            endpoint: settings.endpoint.clone(),
        })
    }

    /// Absolute cursors pass through; relative ones resolve against the API host.
    pub fn resolve_cursor(&self, cursor: &str) -> Result<Url> {
        let resolved = if cursor.starts_with("http://") || cursor.starts_with("https://") {
            Url::parse(cursor)
        } else {
            self.base_url.join(cursor)
        };
        resolved.map_err(|e| Error::Provider {
            provider: PROVIDER,
            message: format!("bad next cursor {cursor:?}: {e}"),
        })
    }

    fn search_url(&self, query: &SearchQuery, key: &str) -> Result<Url> {
        let endpoint = self.base_url.join(&self.endpoint).map_err(|e| {
            Error::config(format!("invalid search endpoint: {e}"), "search.endpoint")
        })?;
        let ts = query.since.timestamp_millis().to_string();
        Url::parse_with_params(
            endpoint.as_str(),
            &[
                ("token", key),
                ("q", query.q.as_str()),
                ("ts", ts.as_str()),
                ("highlight", "true"),
            ],
        )
        .map_err(|e| Error::config(format!("invalid search url: {e}"), "search.base_url"))
    }

    async fn fetch(&self, url: Url) -> Result<SearchPage> {
        let t0 = Instant::now();
        // the token lives in the query string, keep it out of the logs
        let path = url.path().to_string();
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                %path,
                status = status.as_u16(),
                elapsed_ms = t0.elapsed().as_millis() as u64,
                body = %truncate_for_log(&body, 200),
                "Search request rejected"
            );
            return Err(Error::ProviderStatus {
                provider: PROVIDER,
                status: status.as_u16(),
            });
        }

        let page: SearchPage = response.json().await?;
        if let Some(left) = page.requests_left {
            info!(requests_left = left, "Search quota");
        }
        debug!(
            %path,
            posts = page.posts.len(),
            has_next = page.next.is_some(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched search page"
        );
        Ok(page)
    }
}

#[async_trait]
impl SearchProvider for WebzClient {
    #[instrument(level = "info", skip_all, fields(q = %query.q))]
    async fn search(&self, query: &SearchQuery, key: &str) -> Result<SearchPage> {
        let url = self.search_url(query, key)?;
        self.fetch(url).await
    }

    #[instrument(level = "debug", skip_all)]
    async fn next_page(&self, cursor: &str) -> Result<SearchPage> {
        let url = self.resolve_cursor(cursor)?;
        self.fetch(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> WebzClient {
        WebzClient::new(&SearchSettings {
            base_url: server.uri(),
            ..Default::default()
        })
        .unwrap()
    }

    fn query() -> SearchQuery {
        SearchQuery {
            q: "iran category:politics language:english".into(),
            since: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn search_sends_token_query_and_timestamp() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/newsApiLite"))
            .and(query_param("token", "key-1"))
            .and(query_param("q", "iran category:politics language:english"))
            .and(query_param("ts", "1709251200000"))
            .and(query_param("highlight", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "posts": [{"title": "Talks resume", "url": "https://news.example/a"}],
                "next": "/newsApiLite?token=key-1&from=1",
                "requestsLeft": 998
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = client(&server).search(&query(), "key-1").await.unwrap();
        assert_eq!(page.posts.len(), 1);
        assert_eq!(page.requests_left, Some(998));
        assert_eq!(page.next.as_deref(), Some("/newsApiLite?token=key-1&from=1"));
    }

    #[tokio::test]
    async fn non_success_status_is_a_provider_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/newsApiLite"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .mount(&server)
            .await;

        let err = client(&server).search(&query(), "revoked").await.unwrap_err();
        assert!(matches!(
            err,
            Error::ProviderStatus {
                provider: "webz",
                status: 401
            }
        ));
    }

    #[tokio::test]
    async fn relative_cursor_is_followed_against_the_api_host() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/newsApiLite"))
            .and(query_param("from", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "posts": [{"title": "Page two"}],
                "next": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = client(&server)
            .next_page("/newsApiLite?token=k&from=10")
            .await
            .unwrap();
        assert_eq!(page.posts[0].title, "Page two");
        assert!(page.next.is_none());
    }

    #[tokio::test]
    async fn malformed_json_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        assert!(client(&server).search(&query(), "k").await.is_err());
    }

    #[test]
    fn absolute_cursor_passes_through() {
        let client = WebzClient::new(&SearchSettings::default()).unwrap();
        let url = client
            .resolve_cursor("https://mirror.example/newsApiLite?from=5")
            .unwrap();
        assert_eq!(url.host_str(), Some("mirror.example"));
        let relative = client.resolve_cursor("/newsApiLite?from=5").unwrap();
        assert_eq!(relative.as_str(), "https://api.webz.io/newsApiLite?from=5");
    }
}
