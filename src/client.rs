//! Star Wars API client
//!
//! HTTP client for fetching single records by collection and index from
//! the upstream API.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};

use crate::error::FetchError;

pub const SWAPI_API_BASE: &str = "https://swapi.dev/api";

/// The two upstream collections this service aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    People,
    Planets,
}

impl Collection {
    /// URL path segment of the collection.
    pub fn path(self) -> &'static str {
        match self {
            Collection::People => "people",
            Collection::Planets => "planets",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Result of one fetch that reached the upstream and got a parseable
/// answer. Transport and decode failures are the `Err` arm of
/// [`ResourceFetcher::fetch`] instead.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// A real record: the decoded body carried a non-empty `"name"`.
    Found(Map<String, Value>),
    /// A hole in the index space. Upstream signals this either with a 404
    /// or with a body that lacks the identifying `"name"` field.
    NotFound,
}

/// Fetches a single record by collection and index. The engine and the
/// resident resolver only see this trait, so tests can script an upstream
/// without a network.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, collection: Collection, index: u64) -> Result<FetchOutcome, FetchError>;
}

pub struct SwapiClient {
    http: Client,
    base_url: String,
}

impl SwapiClient {
    /// Create a client against the given base URL. Every request carries
    /// `timeout`; a slow upstream fails the fetch instead of stalling the
    /// pagination run.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ResourceFetcher for SwapiClient {
    /// One GET to `{base}/{collection}/{index}`. No retry here; retry
    /// policy belongs to the pagination engine.
    async fn fetch(&self, collection: Collection, index: u64) -> Result<FetchOutcome, FetchError> {
        let url = format!("{}/{}/{}", self.base_url, collection.path(), index);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::transport(url.clone(), source))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(FetchOutcome::NotFound);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|source| FetchError::decode(url, source))?;

        Ok(classify(body))
    }
}

/// A record is `Found` iff its body is an object with a non-empty string
/// `"name"`. Anything else that parsed is a miss, not an error.
fn classify(body: Value) -> FetchOutcome {
    match body {
        Value::Object(record)
            if record
                .get("name")
                .and_then(Value::as_str)
                .map_or(false, |name| !name.is_empty()) =>
        {
            FetchOutcome::Found(record)
        }
        _ => FetchOutcome::NotFound,
    }
}
