use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use futures::future;
use serde::{Deserialize, Serialize};

use crate::batch_function::{BatchFunction, FetchResult};

use super::model::{People, PeopleResults};

/// Where the Star Wars API lives. Passed explicitly to [`SearchClient::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SwapiConfig {
    pub endpoint: String,
    /// Appended to `endpoint`, followed by the url-encoded name to search for.
    pub search_path: String,
    /// Appended to `endpoint`, optionally followed by a page number.
    pub page_path: String,
}

impl Default for SwapiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://swapi.dev/api".to_owned(),
            search_path: "/people/?search=".to_owned(),
            page_path: "/people/?page=".to_owned(),
        }
    }
}

impl SwapiConfig {
    pub fn search_url(&self, name: &str) -> String {
        let escaped = url::form_urlencoded::byte_serialize(name.as_bytes()).collect::<String>();
        format!("{}{}{}", self.endpoint, self.search_path, escaped)
    }

    pub fn page_url(&self, page: Option<u32>) -> String {
        match page {
            Some(page) => format!("{}{}{}", self.endpoint, self.page_path, page),
            None => format!("{}{}", self.endpoint, self.page_path),
        }
    }
}

/// Thin client over the people endpoints.
#[derive(Debug, Clone)]
pub struct SearchClient {
    http: reqwest::Client,
    config: SwapiConfig,
}

impl SearchClient {
    pub fn new(http: reqwest::Client, config: SwapiConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &SwapiConfig {
        &self.config
    }

    /// Searches people by name and returns the best match, if any.
    #[tracing::instrument(skip(self))]
    pub async fn search(&self, name: &str) -> anyhow::Result<Option<People>> {
        let results = self.get(self.config.search_url(name)).await?;
        Ok(results.best_match(name))
    }

    /// Lists one page of people, or the first page when `page` is `None`.
    #[tracing::instrument(skip(self))]
    pub async fn list_page(&self, page: Option<u32>) -> anyhow::Result<Vec<People>> {
        Ok(self.get(self.config.page_url(page)).await?.peoples)
    }

    async fn get(&self, url: String) -> anyhow::Result<PeopleResults> {
        tracing::debug!(%url, "GET");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .with_context(|| format!("GET {url}"))?;
        response.json::<PeopleResults>().await.with_context(|| format!("decoding {url}"))
    }
}

/// Loads people by exact name, one search request per key.
///
/// A failing request fails the whole batch: the resolver layer treats upstream outages
/// uniformly, and a partially answered batch would be retried key by key anyway.
pub struct PeopleSearch;

#[async_trait]
impl BatchFunction<String, Arc<People>> for PeopleSearch {
    type Context = SearchClient;

    async fn load(keys: &[String], client: &SearchClient) -> FetchResult<Arc<People>> {
        let found = future::try_join_all(keys.iter().map(|name| client.search(name))).await?;
        Ok(found.into_iter().map(|people| Ok(people.map(Arc::new))).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_built_from_config() {
        let config = SwapiConfig { endpoint: "http://localhost:8080".to_owned(), ..Default::default() };
        assert_eq!(
            config.search_url("Luke Skywalker"),
            "http://localhost:8080/people/?search=Luke+Skywalker"
        );
        assert_eq!(config.search_url("R2-D2/&"), "http://localhost:8080/people/?search=R2-D2%2F%26");
        assert_eq!(config.page_url(Some(3)), "http://localhost:8080/people/?page=3");
        assert_eq!(config.page_url(None), "http://localhost:8080/people/?page=");
    }

    #[test]
    fn config_uses_kebab_case_keys() {
        let config: SwapiConfig = serde_json::from_str(
            r#"{"endpoint": "http://swapi.local", "search-path": "/p?q="}"#,
        )
        .unwrap();
        assert_eq!(config.endpoint, "http://swapi.local");
        assert_eq!(config.search_path, "/p?q=");
        assert_eq!(config.page_path, SwapiConfig::default().page_path);
    }
}
