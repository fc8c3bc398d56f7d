//! Cacheability predicates and cache key derivation.
//!
//! These are pure functions over method/status/header inputs. The method set
//! eligible for caching is fixed to GET and HEAD and is deliberately not
//! configurable.

use hyper::header::{AUTHORIZATION, CACHE_CONTROL, SET_COOKIE};
use hyper::{HeaderMap, Method, StatusCode, Uri};

/// Whether a request may participate in the cache at all.
///
/// Only GET and HEAD qualify; a request carrying `Authorization` or a
/// `Cache-Control` value containing `no-store` opts itself out. Like the
/// common client libraries, only the first `Cache-Control` value is consulted.
pub fn is_cacheable(method: &Method, headers: &HeaderMap) -> bool {
    if method != Method::GET && method != Method::HEAD {
        return false;
    }

    if headers.contains_key(AUTHORIZATION) {
        return false;
    }

    let cache_control = headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    !cache_control.contains("no-store")
}

/// Whether an origin response is eligible for storage.
///
/// Only plain 200s without `Set-Cookie` and without `Cache-Control: no-store`
/// are stored.
pub fn is_response_cacheable(status: StatusCode, headers: &HeaderMap) -> bool {
    if status != StatusCode::OK {
        return false;
    }

    let cache_control = headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if cache_control.contains("no-store") {
        return false;
    }

    !headers.contains_key(SET_COOKIE)
}

/// Build the cache key for a request: `METHOD:exact-uri-text`.
///
/// The URI is used exactly as presented. Textually different but semantically
/// equivalent URIs (trailing slash, query order) intentionally map to
/// different keys.
pub fn cache_key(method: &Method, uri: &Uri) -> String {
    format!("{}:{}", method, uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn test_cacheable_methods() {
        let headers = HeaderMap::new();
        assert!(is_cacheable(&Method::GET, &headers));
        assert!(is_cacheable(&Method::HEAD, &headers));
        assert!(!is_cacheable(&Method::POST, &headers));
        assert!(!is_cacheable(&Method::PUT, &headers));
        assert!(!is_cacheable(&Method::DELETE, &headers));
    }

    #[test]
    fn test_authorization_blocks_caching() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer token".parse().unwrap());
        assert!(!is_cacheable(&Method::GET, &headers));
    }

    #[test]
    fn test_no_store_blocks_caching() {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, "no-store".parse().unwrap());
        assert!(!is_cacheable(&Method::GET, &headers));

        headers.insert(CACHE_CONTROL, "max-age=0, no-store".parse().unwrap());
        assert!(!is_cacheable(&Method::GET, &headers));

        // Other directives do not opt out
        headers.insert(CACHE_CONTROL, "no-cache".parse().unwrap());
        assert!(is_cacheable(&Method::GET, &headers));
    }

    #[test]
    fn test_response_cacheable_status() {
        let headers = HeaderMap::new();
        assert!(is_response_cacheable(StatusCode::OK, &headers));
        assert!(!is_response_cacheable(StatusCode::NOT_FOUND, &headers));
        assert!(!is_response_cacheable(StatusCode::MOVED_PERMANENTLY, &headers));
        assert!(!is_response_cacheable(StatusCode::INTERNAL_SERVER_ERROR, &headers));
    }

    #[test]
    fn test_response_set_cookie_blocks_caching() {
        let mut headers = HeaderMap::new();
        headers.insert(SET_COOKIE, "session=abc".parse().unwrap());
        assert!(!is_response_cacheable(StatusCode::OK, &headers));
    }

    #[test]
    fn test_response_no_store_blocks_caching() {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, "private, no-store".parse().unwrap());
        assert!(!is_response_cacheable(StatusCode::OK, &headers));
    }

    #[test]
    fn test_cache_key_is_deterministic() {
        let key1 = cache_key(&Method::GET, &uri("http://example.com/a?x=1"));
        let key2 = cache_key(&Method::GET, &uri("http://example.com/a?x=1"));
        assert_eq!(key1, key2);
        assert_eq!(key1, "GET:http://example.com/a?x=1");
    }

    #[test]
    fn test_cache_key_distinguishes_method_and_uri() {
        let get = cache_key(&Method::GET, &uri("http://example.com/a"));
        let head = cache_key(&Method::HEAD, &uri("http://example.com/a"));
        assert_ne!(get, head);

        let plain = cache_key(&Method::GET, &uri("http://example.com/a"));
        let slash = cache_key(&Method::GET, &uri("http://example.com/a/"));
        assert_ne!(plain, slash);

        // No query normalization: order matters
        let q1 = cache_key(&Method::GET, &uri("http://example.com/a?x=1&y=2"));
        let q2 = cache_key(&Method::GET, &uri("http://example.com/a?y=2&x=1"));
        assert_ne!(q1, q2);
    }
}
