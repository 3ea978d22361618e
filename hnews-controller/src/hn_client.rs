//! Hacker News API client
//!
//! Two endpoints are used: `/topstories.json` (ranked ids) and
//! `/item/{id}.json` (one record per id). Requests are issued one at a time by
//! the caller; nothing is cached.

use async_trait::async_trait;
use hnews_common::config::ControllerConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("hnews-controller/", env!("CARGO_PKG_VERSION"));

/// Upstream fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    /// Request could not be sent or the body could not be read
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream answered with a non-success status
    #[error("API error {status} for {url}")]
    Status { status: u16, url: String },

    /// Body is not the expected JSON shape
    #[error("Decode error for {url}: {message}")]
    Decode { url: String, message: String },
}

impl FetchError {
    /// Transient failures are retried after a fixed delay; malformed payloads are not
    pub fn is_transient(&self) -> bool {
        !matches!(self, FetchError::Decode { .. })
    }
}

/// Item record from `/item/{id}.json`
///
/// Missing fields decode to zero values: jobs carry no `descendants`, text
/// posts carry no `url`. `type` is kept as upstream sends it, so item kinds
/// added later still decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HackerNewsItem {
    pub by: String,
    /// Total comment count
    pub descendants: i64,
    pub id: i64,
    pub kids: Vec<i64>,
    pub score: i64,
    /// Unix seconds
    pub time: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub url: String,
}

/// Source of candidate ids and item records
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Ranked candidate ids, in upstream order
    async fn list_candidate_ids(&self) -> Result<Vec<i64>, FetchError>;

    /// Detail record for one id
    async fn fetch_item(&self, id: i64) -> Result<HackerNewsItem, FetchError>;
}

/// reqwest-backed [`ItemSource`]
pub struct HackerNewsClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl HackerNewsClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ControllerConfig) -> Result<Self, FetchError> {
        Self::new(
            &config.hn_base_url,
            config.request_timeout_secs.map(Duration::from_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T>(&self, url: &str) -> Result<T, FetchError>
    where
        T: serde::de::DeserializeOwned,
    {
        tracing::debug!(url = %url, "Querying Hacker News API");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        serde_json::from_slice(&body).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl ItemSource for HackerNewsClient {
    async fn list_candidate_ids(&self) -> Result<Vec<i64>, FetchError> {
        let url = format!("{}/topstories.json", self.base_url);
        let ids: Vec<i64> = self.get_json(&url).await?;

        tracing::debug!(count = ids.len(), "Retrieved top story ids");
        Ok(ids)
    }

    async fn fetch_item(&self, id: i64) -> Result<HackerNewsItem, FetchError> {
        let url = format!("{}/item/{}.json", self.base_url, id);
        // Unknown ids come back as JSON `null`; they are judged as a zero-valued item
        let item: Option<HackerNewsItem> = self.get_json(&url).await?;
        if item.is_none() {
            tracing::debug!(id, "Item not found upstream");
        }
        Ok(item.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_creation_trims_trailing_slash() {
        let client = HackerNewsClient::new("http://127.0.0.1:1/v0/", None).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:1/v0");
    }

    #[test]
    fn test_item_decodes_full_record() {
        let item: HackerNewsItem = serde_json::from_value(json!({
            "by": "dhouston",
            "descendants": 71,
            "id": 8863,
            "kids": [8952, 9224],
            "score": 111,
            "time": 1175714200,
            "title": "My YC app: Dropbox - Throw away your USB drive",
            "type": "story",
            "url": "http://www.getdropbox.com/u/2/screencast.html"
        }))
        .unwrap();

        assert_eq!(item.id, 8863);
        assert_eq!(item.descendants, 71);
        assert_eq!(item.item_type, "story");
        assert_eq!(item.kids, vec![8952, 9224]);
    }

    #[test]
    fn test_item_missing_fields_default_to_zero() {
        let item: HackerNewsItem =
            serde_json::from_value(json!({ "id": 192327, "type": "job", "score": 6 })).unwrap();

        assert_eq!(item.descendants, 0);
        assert_eq!(item.url, "");
        assert_eq!(item.item_type, "job");
    }

    #[test]
    fn test_unknown_item_type_decodes() {
        let item: HackerNewsItem = serde_json::from_str(
            r#"{"id":1,"type":"launch","score":500,"descendants":50}"#,
        )
        .unwrap();

        assert_eq!(item.item_type, "launch");
        assert_eq!(item.score, 500);
    }

    #[test]
    fn test_null_item_decodes_as_absent() {
        let item: Option<HackerNewsItem> = serde_json::from_str("null").unwrap();
        assert_eq!(item.unwrap_or_default(), HackerNewsItem::default());
    }

    #[test]
    fn test_error_classification() {
        assert!(FetchError::Network("refused".into()).is_transient());
        assert!(FetchError::Status {
            status: 503,
            url: "u".into()
        }
        .is_transient());
        assert!(!FetchError::Decode {
            url: "u".into(),
            message: "m".into()
        }
        .is_transient());
    }
}
