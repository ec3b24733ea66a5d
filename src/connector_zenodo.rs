//! Zenodo records API connector.
//!
//! Reads one community page by page:
//!
//! ```text
//! GET {api_url}?communities={id}&size=25&sort={sort}&page={n}
//! ```
//!
//! Each element of `hits.hits` becomes one [`RawRecord`] tagged
//! [`SOURCE_ZENODO`]. The public read path needs no credentials; a bearer
//! token can be attached with [`ZenodoClient::with_access_token`].

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::config::HarvestConfig;
use crate::error::{CatalogueError, Result};
use crate::http::{build_client, send_with_retry, RetryPolicy};
use crate::models::{RawRecord, SOURCE_ZENODO};
use crate::source::{PageSource, SourcePage};

pub struct ZenodoClient {
    client: reqwest::Client,
    api_url: String,
    sort: String,
    delay: Duration,
    retry: RetryPolicy,
    access_token: Option<String>,
}

impl ZenodoClient {
    pub fn from_config(config: &HarvestConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            api_url: config.api_url.clone(),
            sort: config.sort.clone(),
            delay: config.request_delay(),
            retry: RetryPolicy::from_config(config),
            access_token: config.access_token.clone(),
        })
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

#[async_trait]
impl PageSource for ZenodoClient {
    fn endpoint(&self) -> &str {
        &self.api_url
    }

    fn request_delay(&self) -> Duration {
        self.delay
    }

    async fn fetch_page(&self, collection: &str, page: u32, size: usize) -> Result<SourcePage> {
        let mut query = vec![
            ("communities", collection.to_string()),
            ("size", size.to_string()),
        ];
        if !self.sort.is_empty() {
            query.push(("sort", self.sort.clone()));
        }
        query.push(("page", page.to_string()));

        let response = send_with_retry(&self.api_url, &self.retry, || {
            let request = self
                .client
                .get(&self.api_url)
                .header("Accept", "application/json")
                .query(&query);
            match self.access_token {
                Some(ref token) => request.bearer_auth(token),
                None => request,
            }
        })
        .await?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| CatalogueError::source_unavailable(&self.api_url, e))?;

        parse_search_page(&body, page, size)
            .map_err(|reason| CatalogueError::source_unavailable(&self.api_url, reason))
    }
}

/// Turn one search response into a page.
///
/// `has_more` comes from `links.next` when present, else from `hits.total`
/// (a number, or an object with `value`), else it is assumed `true` and the
/// short-page rule ends the harvest.
pub fn parse_search_page(
    body: &Value,
    page: u32,
    size: usize,
) -> std::result::Result<SourcePage, String> {
    let hits = body
        .get("hits")
        .and_then(|h| h.get("hits"))
        .and_then(Value::as_array)
        .ok_or_else(|| "response has no hits.hits array".to_string())?;

    let records = hits
        .iter()
        .map(|hit| RawRecord::new(SOURCE_ZENODO, hit.clone()))
        .collect();

    let has_next_link = body
        .get("links")
        .and_then(|l| l.get("next"))
        .is_some_and(|next| !next.is_null());

    let has_more = if has_next_link {
        true
    } else if let Some(total) = body.get("hits").and_then(|h| h.get("total")).and_then(total_of) {
        (page as u64) * (size as u64) < total
    } else {
        true
    };

    Ok(SourcePage { records, has_more })
}

fn total_of(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.get("value").and_then(Value::as_u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hits(n: usize) -> Vec<Value> {
        (0..n).map(|i| json!({ "id": i, "metadata": {} })).collect()
    }

    #[test]
    fn test_next_link_means_more() {
        let body = json!({
            "hits": { "hits": hits(25), "total": 25 },
            "links": { "self": "x", "next": "https://zenodo.org/api/records?page=2" }
        });
        let page = parse_search_page(&body, 1, 25).unwrap();
        assert_eq!(page.records.len(), 25);
        assert!(page.has_more);
        assert_eq!(page.records[0].source, SOURCE_ZENODO);
    }

    #[test]
    fn test_total_decides_without_next_link() {
        let body = json!({ "hits": { "hits": hits(25), "total": 50 }, "links": {} });
        assert!(parse_search_page(&body, 1, 25).unwrap().has_more);
        assert!(!parse_search_page(&body, 2, 25).unwrap().has_more);

        let legacy = json!({ "hits": { "hits": hits(3), "total": { "value": 3, "relation": "eq" } } });
        assert!(!parse_search_page(&legacy, 1, 25).unwrap().has_more);
    }

    #[test]
    fn test_no_signal_assumes_more() {
        let body = json!({ "hits": { "hits": [] } });
        let page = parse_search_page(&body, 4, 25).unwrap();
        assert!(page.records.is_empty());
        assert!(page.has_more);
    }

    #[test]
    fn test_missing_hits_is_an_error() {
        assert!(parse_search_page(&json!({ "status": 200 }), 1, 25).is_err());
        assert!(parse_search_page(&json!({ "hits": { "hits": "none" } }), 1, 25).is_err());
    }
}
