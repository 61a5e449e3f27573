//! The narrow search handle a structured log store adapter needs.
//! `HttpStoreTransport` is the live HTTP implementation;
//! `FakeStoreTransport` is a deterministic in-memory test double.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{Result, SearchError};

/// Already-connected, already-authenticated search handle to one
/// structured log store. Credential resolution, pooling, and retry policy
/// belong to the implementation behind this trait, never to the adapters.
#[async_trait]
pub trait StoreTransport: Send + Sync {
    /// Issue a rendered query body against the store's search endpoint
    /// for `index`, requesting at most `size` rows, and return the
    /// decoded response body.
    async fn search(&self, index: &str, body: &str, size: i64) -> Result<Value>;
}

/// Live HTTP transport.
pub struct HttpStoreTransport {
    client: reqwest::Client,
    base: String,
}

impl HttpStoreTransport {
    pub fn new(address: &str) -> Result<Self> {
        if address.is_empty() {
            return Err(SearchError::Config("store address is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| SearchError::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base: address.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl StoreTransport for HttpStoreTransport {
    async fn search(&self, index: &str, body: &str, size: i64) -> Result<Value> {
        let url = format!("{}/{}/_search", self.base, index);

        let response = self
            .client
            .post(&url)
            .query(&[("size", size)])
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await?
            .error_for_status()
            .map_err(|err| SearchError::Transport(err.to_string()))?;

        Ok(response.json().await?)
    }
}

/// A search request observed by [`FakeStoreTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSearch {
    pub index: String,
    pub body: String,
    pub size: i64,
}

/// In-memory transport for deterministic tests: replays canned responses
/// in order and records every request it sees.
#[derive(Default)]
pub struct FakeStoreTransport {
    responses: Mutex<VecDeque<Result<Value>>>,
    recorded: Mutex<Vec<RecordedSearch>>,
}

impl FakeStoreTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response body.
    pub fn push_response(&self, body: Value) {
        self.responses.lock().push_back(Ok(body));
    }

    /// Queue a failure.
    pub fn push_error(&self, err: SearchError) {
        self.responses.lock().push_back(Err(err));
    }

    /// The requests observed so far, in order.
    pub fn requests(&self) -> Vec<RecordedSearch> {
        self.recorded.lock().clone()
    }
}

#[async_trait]
impl StoreTransport for FakeStoreTransport {
    async fn search(&self, index: &str, body: &str, size: i64) -> Result<Value> {
        self.recorded.lock().push(RecordedSearch {
            index: index.to_string(),
            body: body.to_string(),
            size,
        });

        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(SearchError::Transport("no canned response".to_string())))
    }
}
