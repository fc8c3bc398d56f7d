//! The request-handling pipeline.
//!
//! Every inbound request walks the same path: target validation, domain
//! gatekeeping, cache-read short-circuit, forward to the origin, buffered
//! response relay, and the cache-write decision. This is the only place where
//! policy and control flow live; storage, configuration loading, and the
//! listener are collaborators injected at construction.

use hyper::body::Bytes;
use hyper::header::HeaderValue;
use hyper::{Body, Method, Request, Response, StatusCode, Uri};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::{CachedResponse, InMemoryCache, ResponseCache};
use crate::config::{Config, ProxyConfig};
use crate::error::PorticoResult;
use crate::proxy::forwarder::{Forwarder, PROXY_MARKER};
use crate::proxy::{gatekeeper, policy};

/// Forward-proxy request handler.
///
/// Cheap to clone; all clones share the same config and cache. Dependencies
/// are injected here by explicit ownership — there are no process-wide
/// singletons besides the pooled HTTP client.
#[derive(Clone)]
pub struct ProxyHandler {
    config: Arc<ProxyConfig>,
    cache: Option<Arc<dyn ResponseCache>>,
    key_prefix: Option<String>,
    forwarder: Forwarder,
}

impl ProxyHandler {
    /// Build a handler from the loaded configuration, constructing the
    /// in-memory cache when one is configured and enabled.
    pub fn new(config: &Config) -> Self {
        let cache: Option<Arc<dyn ResponseCache>> = match &config.cache {
            Some(cache_config) if cache_config.enabled => {
                Some(Arc::new(InMemoryCache::new(cache_config.clone())))
            }
            _ => None,
        };
        let key_prefix = config.cache.as_ref().and_then(|c| c.key_prefix.clone());

        Self {
            config: Arc::new(config.proxy.clone()),
            cache,
            key_prefix,
            forwarder: Forwarder::new(config.proxy.timeout()),
        }
    }

    /// Build a handler around an externally owned cache collaborator.
    ///
    /// The collaborator must tolerate concurrent `get`/`put` calls from
    /// arbitrarily many request tasks; the handler shares it across all of
    /// them without additional locking.
    pub fn with_cache(
        config: ProxyConfig,
        cache: Arc<dyn ResponseCache>,
        key_prefix: Option<String>,
    ) -> Self {
        let forwarder = Forwarder::new(config.timeout());
        Self {
            config: Arc::new(config),
            cache: Some(cache),
            key_prefix,
            forwarder,
        }
    }

    /// Handle one inbound request.
    ///
    /// Pipeline errors become client-visible status codes (400/403/502);
    /// anything else is logged and answered with a 500.
    pub async fn handle_request(&self, req: Request<Body>) -> Result<Response<Body>, Infallible> {
        match self.process_request(req).await {
            Ok(response) => Ok(response),
            Err(e) if e.is_client_visible() => {
                warn!("Request rejected: {}", e);
                Ok(Response::builder()
                    .status(e.status_code())
                    .body(Body::from(e.to_string()))
                    .unwrap())
            }
            Err(e) => {
                warn!("Request processing error: {}", e);
                Ok(Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(Body::from("Internal server error"))
                    .unwrap())
            }
        }
    }

    async fn process_request(&self, req: Request<Body>) -> PorticoResult<Response<Body>> {
        let request_id = Uuid::new_v4();
        // Capture client address early (extensions may be consumed later)
        let client_addr = req
            .extensions()
            .get::<SocketAddr>()
            .copied()
            .unwrap_or_else(|| "127.0.0.1:0".parse().unwrap());

        debug!(
            "Request {} {} {} from {}",
            request_id,
            req.method(),
            req.uri(),
            client_addr
        );

        // A non-absolute target means the client is not talking proxy form
        gatekeeper::validate_target(req.uri())?;

        // validate_target guarantees an authority is present
        let authority = req
            .uri()
            .authority()
            .map(|a| a.as_str().to_string())
            .unwrap_or_default();
        gatekeeper::check_domain(&authority, &self.config.allowed_domains)?;

        let method = req.method().clone();
        let uri = req.uri().clone();
        let cacheable = policy::is_cacheable(&method, req.headers());

        if cacheable {
            if let Some(response) = self.try_serve_from_cache(&method, &uri).await {
                info!("Request {} served from cache", request_id);
                return Ok(response);
            }
        }

        let origin_response = self.forwarder.forward(req, client_addr).await?;

        let response = self
            .relay_and_maybe_cache(request_id, &method, &uri, cacheable, origin_response)
            .await?;

        debug!(
            "Request {} completed with status {}",
            request_id,
            response.status()
        );

        Ok(response)
    }

    /// Cache-read path: serve a stored response if one exists for this key.
    ///
    /// Entry presence alone is sufficient — no freshness check happens here,
    /// the store owns TTL. Undecodable blobs are dropped and treated as a
    /// miss.
    async fn try_serve_from_cache(&self, method: &Method, uri: &Uri) -> Option<Response<Body>> {
        let cache = self.cache.as_ref()?;
        let key = self.build_key(method, uri);

        let blob = cache.get(&key).await?;
        debug!("Cache hit for {}", key);

        match CachedResponse::from_blob(&blob).and_then(|entry| entry.to_response()) {
            Ok(response) => Some(response),
            Err(e) => {
                warn!("Failed to restore cached entry for '{}': {}", key, e);
                cache.remove(&key).await;
                None
            }
        }
    }

    /// Relay the origin response and run the cache-write decision.
    ///
    /// The body is read fully into memory before anything is written to the
    /// client. A body read failure at this point is logged only: the origin
    /// status is committed and the response goes out truncated, uncached.
    async fn relay_and_maybe_cache(
        &self,
        request_id: Uuid,
        method: &Method,
        uri: &Uri,
        cacheable: bool,
        origin_response: Response<Body>,
    ) -> PorticoResult<Response<Body>> {
        let (parts, body) = origin_response.into_parts();

        let mut truncated = false;
        let body_bytes = match hyper::body::to_bytes(body).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Error reading response body for request {}: {}", request_id, e);
                truncated = true;
                Bytes::new()
            }
        };

        let store = cacheable
            && !truncated
            && policy::is_response_cacheable(parts.status, &parts.headers);
        if store {
            let key = self.build_key(method, uri);
            let entry = CachedResponse::new(parts.status, &parts.headers, body_bytes.to_vec());
            self.submit_to_cache(key, entry);
        }

        // Rebuild the client response: origin headers verbatim, then markers
        let mut relayed = Response::new(Body::from(body_bytes));
        *relayed.status_mut() = parts.status;

        let headers = relayed.headers_mut();
        for (name, value) in parts.headers.iter() {
            headers.append(name.clone(), value.clone());
        }
        headers.insert("x-proxy-server", HeaderValue::from_static(PROXY_MARKER));
        if cacheable && self.cache.is_some() {
            headers.insert("x-cache", HeaderValue::from_static("MISS"));
        }

        Ok(relayed)
    }

    /// Cache-write path: serialize and submit in a detached task.
    ///
    /// The client response never waits on the write; failures are logged and
    /// otherwise ignored.
    fn submit_to_cache(&self, key: String, entry: CachedResponse) {
        let cache = match &self.cache {
            Some(cache) => Arc::clone(cache),
            None => return,
        };

        tokio::spawn(async move {
            match entry.to_blob() {
                Ok(blob) => {
                    let size = blob.len();
                    if let Err(e) = cache.put(key.clone(), blob).await {
                        warn!("Failed to cache response for key '{}': {}", key, e);
                    } else {
                        debug!("Cached response for {} ({} bytes)", key, size);
                    }
                }
                Err(e) => {
                    warn!("Failed to serialize response for key '{}': {}", key, e);
                }
            }
        });
    }

    fn build_key(&self, method: &Method, uri: &Uri) -> String {
        let base = policy::cache_key(method, uri);
        match &self.key_prefix {
            Some(prefix) => format!("{}{}", prefix, base),
            None => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    fn handler_with_cache(allowed_domains: Vec<String>) -> (ProxyHandler, Arc<InMemoryCache>) {
        let cache = Arc::new(InMemoryCache::new(CacheConfig {
            enabled: true,
            max_size: 1024 * 1024,
            max_entry_size: None,
            default_ttl: 60,
            key_prefix: None,
            metrics_enabled: true,
        }));
        let config = ProxyConfig {
            allowed_domains,
            timeout_secs: 5,
            http_client: None,
        };
        let handler = ProxyHandler::with_cache(config, cache.clone(), None);
        (handler, cache)
    }

    fn request(method: Method, uri: &str) -> Request<Body> {
        let mut req = Request::new(Body::empty());
        *req.method_mut() = method;
        *req.uri_mut() = uri.parse().unwrap();
        req
    }

    #[tokio::test]
    async fn test_non_absolute_target_is_400() {
        let (handler, _) = handler_with_cache(vec![]);

        let response = handler
            .handle_request(request(Method::GET, "/only/a/path"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_forbidden_domain_is_403() {
        let (handler, _) = handler_with_cache(vec!["example.com".to_string()]);

        let response = handler
            .handle_request(request(Method::GET, "http://evil.com/"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_cache_hit_short_circuits_forwarding() {
        let (handler, cache) = handler_with_cache(vec![]);

        // Seed the store with a response for this exact key; the origin in
        // the URI does not exist, so anything but a cache hit would 502
        let entry = CachedResponse::new(
            StatusCode::OK,
            &hyper::HeaderMap::new(),
            b"cached body".to_vec(),
        );
        cache
            .put(
                "GET:http://127.0.0.1:1/missing".to_string(),
                entry.to_blob().unwrap(),
            )
            .await
            .unwrap();

        let response = handler
            .handle_request(request(Method::GET, "http://127.0.0.1:1/missing"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("x-cache").unwrap(), "HIT");

        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!(&body[..], b"cached body");
    }

    #[tokio::test]
    async fn test_post_never_reads_cache() {
        let (handler, cache) = handler_with_cache(vec![]);

        let entry =
            CachedResponse::new(StatusCode::OK, &hyper::HeaderMap::new(), b"cached".to_vec());
        cache
            .put(
                "POST:http://127.0.0.1:1/missing".to_string(),
                entry.to_blob().unwrap(),
            )
            .await
            .unwrap();

        // POST is not cacheable, so the seeded entry must be ignored and the
        // unreachable origin turns into a 502
        let response = handler
            .handle_request(request(Method::POST, "http://127.0.0.1:1/missing"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_undecodable_cache_entry_is_dropped() {
        let (handler, cache) = handler_with_cache(vec![]);

        cache
            .put(
                "GET:http://127.0.0.1:1/missing".to_string(),
                b"garbage".to_vec(),
            )
            .await
            .unwrap();

        // Decoding fails, the entry is evicted, and the miss path runs into
        // the unreachable origin
        let response = handler
            .handle_request(request(Method::GET, "http://127.0.0.1:1/missing"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(!cache.contains_key("GET:http://127.0.0.1:1/missing").await);
    }

    #[tokio::test]
    async fn test_unreachable_origin_is_502() {
        let (handler, _) = handler_with_cache(vec![]);

        let response = handler
            .handle_request(request(Method::GET, "http://127.0.0.1:1/down"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_key_prefix_applied() {
        let cache = Arc::new(InMemoryCache::new(CacheConfig {
            enabled: true,
            max_size: 1024,
            max_entry_size: None,
            default_ttl: 60,
            key_prefix: Some("edge1|".to_string()),
            metrics_enabled: true,
        }));
        let config = ProxyConfig {
            allowed_domains: vec![],
            timeout_secs: 5,
            http_client: None,
        };
        let handler = ProxyHandler::with_cache(config, cache, Some("edge1|".to_string()));

        let key = handler.build_key(&Method::GET, &"http://example.com/a".parse().unwrap());
        assert_eq!(key, "edge1|GET:http://example.com/a");
    }
}
