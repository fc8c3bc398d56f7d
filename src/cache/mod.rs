//! Response cache collaborator.
//!
//! The proxy core treats the cache as a narrow key→blob store: it serializes
//! a finished response into an opaque byte blob, addresses it by a cache key
//! string, and reads blobs back without any freshness logic of its own. TTL
//! and eviction live entirely inside the store.
//!
//! Implementations of [`ResponseCache`] must tolerate concurrent `get`/`put`
//! calls from arbitrarily many request-handling tasks; the proxy shares one
//! instance across all of them.

pub mod storage;

use async_trait::async_trait;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Body, HeaderMap, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::PorticoResult;

pub use storage::{CacheMetrics, CacheStats, InMemoryCache};

/// Narrow interface the proxy core uses to talk to cache storage.
///
/// Contract: `put` is last-writer-wins on key collision; entries the store
/// cannot accept (size limits) are dropped silently on the store side. The
/// store owns TTL and eviction. All methods are safe to call concurrently.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Look up a stored blob by key
    async fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Store a blob under a key
    async fn put(&self, key: String, blob: Vec<u8>) -> PorticoResult<()>;

    /// Remove a stored blob
    async fn remove(&self, key: &str) -> Option<Vec<u8>>;

    /// Drop all stored blobs
    async fn clear(&self);
}

/// A materialized origin response as serialized into the cache blob.
///
/// Headers are kept as an ordered list of pairs rather than a map so that
/// duplicate keys and value order survive the round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    /// Response status code as u16
    pub status: u16,
    /// Ordered response headers, duplicates preserved
    pub headers: Vec<(String, Vec<u8>)>,
    /// Fully buffered response body
    pub body: Vec<u8>,
}

impl CachedResponse {
    /// Capture a finished response's parts for serialization
    pub fn new(status: StatusCode, headers: &HeaderMap, body: Vec<u8>) -> Self {
        let headers = headers
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
            .collect();

        Self {
            status: status.as_u16(),
            headers,
            body,
        }
    }

    /// Serialize into the opaque blob format
    pub fn to_blob(&self) -> PorticoResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize from the opaque blob format
    pub fn from_blob(blob: &[u8]) -> PorticoResult<Self> {
        Ok(serde_json::from_slice(blob)?)
    }

    /// Rebuild an HTTP response tagged as a cache hit.
    ///
    /// Headers are re-appended in stored order so multi-valued keys come back
    /// exactly as the origin sent them.
    pub fn to_response(&self) -> PorticoResult<Response<Body>> {
        let mut response = Response::builder()
            .status(StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK))
            .body(Body::from(self.body.clone()))?;

        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                name.parse::<HeaderName>(),
                HeaderValue::from_bytes(value),
            ) {
                headers.append(name, value);
            }
        }

        headers.insert("x-cache", HeaderValue::from_static("HIT"));

        Ok(response)
    }
}
