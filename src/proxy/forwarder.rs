//! Outbound forwarding: request cloning, redirect policy, response relay.

use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, HOST, LOCATION};
use hyper::{Body, HeaderMap, Method, Request, Response, StatusCode, Uri};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::debug;

use crate::error::{PorticoError, PorticoResult};
use crate::proxy::http_client;

/// Redirect chains longer than this abort the forward
pub const MAX_REDIRECTS: usize = 10;

/// Identity header added to every relayed response
pub const PROXY_MARKER: &str = concat!("portico/", env!("CARGO_PKG_VERSION"));

/// Forwards client requests to their origin and relays responses back.
///
/// Bodies are always fully buffered in both directions; there is no
/// streaming relay.
#[derive(Clone)]
pub struct Forwarder {
    timeout: Duration,
}

impl Forwarder {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Forward a request to its origin.
    ///
    /// The inbound body is buffered, headers are cloned verbatim (with the
    /// forwarding headers overwritten and hop-by-hop `Connection` removed),
    /// and the outbound exchange — including up to [`MAX_REDIRECTS`] followed
    /// redirects — runs under one overall timeout.
    pub async fn forward(
        &self,
        req: Request<Body>,
        client_addr: SocketAddr,
    ) -> PorticoResult<Response<Body>> {
        let (parts, body) = req.into_parts();

        let body_bytes = hyper::body::to_bytes(body)
            .await
            .map_err(|e| PorticoError::forward(format!("failed to read request body: {}", e)))?;

        let original_host = parts
            .headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let headers = build_outbound_headers(&parts.headers, client_addr, original_host.as_deref());

        debug!("Forwarding {} {} for {}", parts.method, parts.uri, client_addr);

        let exchange = self.follow_redirects(parts.method, parts.uri, headers, body_bytes);
        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(PorticoError::timeout(self.timeout, "origin request")),
        }
    }

    /// Issue the outbound call, following redirects up to the cap.
    async fn follow_redirects(
        &self,
        mut method: Method,
        mut uri: Uri,
        mut headers: HeaderMap,
        body: Bytes,
    ) -> PorticoResult<Response<Body>> {
        let mut body = Some(body);
        let mut redirects = 0usize;

        loop {
            let mut outbound = Request::new(match &body {
                Some(bytes) => Body::from(bytes.clone()),
                None => Body::empty(),
            });
            *outbound.method_mut() = method.clone();
            *outbound.uri_mut() = uri.clone();
            *outbound.headers_mut() = headers.clone();

            let response = http_client::request(outbound).await?;

            if !is_redirect(response.status()) {
                return Ok(response);
            }

            let location = match response.headers().get(LOCATION).and_then(|v| v.to_str().ok()) {
                Some(loc) => loc.to_string(),
                // A redirect without Location is passed through as-is
                None => return Ok(response),
            };

            redirects += 1;
            if redirects > MAX_REDIRECTS {
                return Err(PorticoError::forward(format!(
                    "stopped after {} redirects",
                    MAX_REDIRECTS
                )));
            }

            let next = resolve_location(&uri, &location)?;
            debug!("Following redirect {} -> {}", uri, next);
            uri = next;

            // 301/302/303 rewrite everything but HEAD to a bodyless GET;
            // 307/308 replay the method and buffered body unchanged
            if rewrites_to_get(response.status()) && method != Method::HEAD {
                method = Method::GET;
                body = None;
                headers.remove(CONTENT_LENGTH);
                headers.remove(CONTENT_TYPE);
            }
        }
    }
}

/// Clone inbound headers for the outbound request.
///
/// Every key and every value is copied in order, duplicates included. The
/// forwarding headers are then overwritten: `X-Forwarded-For` gets the
/// observed client address, `X-Forwarded-Host` the original `Host` value.
/// `Connection` is hop-by-hop and is dropped; `Host` is dropped too so the
/// client derives it from the target URI on every redirect hop.
fn build_outbound_headers(
    inbound: &HeaderMap,
    client_addr: SocketAddr,
    original_host: Option<&str>,
) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound.iter() {
        headers.append(name.clone(), value.clone());
    }

    if let Ok(value) = HeaderValue::from_str(&client_addr.to_string()) {
        headers.insert("x-forwarded-for", value);
    }
    match original_host.and_then(|h| HeaderValue::from_str(h).ok()) {
        Some(value) => {
            headers.insert("x-forwarded-host", value);
        }
        None => {
            headers.remove("x-forwarded-host");
        }
    }

    headers.remove(CONNECTION);
    headers.remove(HOST);

    headers
}

/// Whether a status directs the client elsewhere
fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// Whether a redirect status rewrites the follow-up request to GET
fn rewrites_to_get(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER
    )
}

/// Resolve a `Location` value against the current request URI.
///
/// Absolute locations are taken as-is; absolute-path locations keep the
/// current scheme and authority.
fn resolve_location(current: &Uri, location: &str) -> PorticoResult<Uri> {
    let candidate: Uri = location
        .parse()
        .map_err(|e| PorticoError::forward(format!("invalid redirect location: {}", e)))?;

    if candidate.scheme().is_some() && candidate.authority().is_some() {
        return Ok(candidate);
    }

    let scheme = current.scheme_str().unwrap_or("http");
    let authority = current
        .authority()
        .ok_or_else(|| PorticoError::forward("redirect from URI without authority"))?;

    let path_and_query = if location.starts_with('/') {
        location.to_string()
    } else {
        format!("/{}", location)
    };

    format!("{}://{}{}", scheme, authority, path_and_query)
        .parse()
        .map_err(|e| PorticoError::forward(format!("invalid redirect location: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "10.1.2.3:4567".parse().unwrap()
    }

    #[test]
    fn test_outbound_headers_copied_verbatim() {
        let mut inbound = HeaderMap::new();
        inbound.insert("accept", "text/html".parse().unwrap());
        inbound.append("x-custom", "one".parse().unwrap());
        inbound.append("x-custom", "two".parse().unwrap());

        let outbound = build_outbound_headers(&inbound, addr(), None);

        assert_eq!(outbound.get("accept").unwrap(), "text/html");
        let customs: Vec<_> = outbound.get_all("x-custom").iter().collect();
        assert_eq!(customs, vec!["one", "two"]);
    }

    #[test]
    fn test_forwarding_headers_overwritten() {
        let mut inbound = HeaderMap::new();
        inbound.insert("x-forwarded-for", "1.1.1.1".parse().unwrap());
        inbound.insert("x-forwarded-host", "spoofed.example".parse().unwrap());
        inbound.insert(HOST, "origin.example".parse().unwrap());

        let outbound = build_outbound_headers(&inbound, addr(), Some("origin.example"));

        assert_eq!(outbound.get("x-forwarded-for").unwrap(), "10.1.2.3:4567");
        assert_eq!(outbound.get("x-forwarded-host").unwrap(), "origin.example");
    }

    #[test]
    fn test_hop_by_hop_headers_removed() {
        let mut inbound = HeaderMap::new();
        inbound.insert(CONNECTION, "keep-alive".parse().unwrap());
        inbound.insert(HOST, "origin.example".parse().unwrap());
        inbound.insert("accept", "*/*".parse().unwrap());

        let outbound = build_outbound_headers(&inbound, addr(), Some("origin.example"));

        assert!(outbound.get(CONNECTION).is_none());
        assert!(outbound.get(HOST).is_none());
        assert!(outbound.get("accept").is_some());
    }

    #[test]
    fn test_spoofed_forwarded_host_dropped_without_host_header() {
        let mut inbound = HeaderMap::new();
        inbound.insert("x-forwarded-host", "spoofed.example".parse().unwrap());

        let outbound = build_outbound_headers(&inbound, addr(), None);
        assert!(outbound.get("x-forwarded-host").is_none());
    }

    #[test]
    fn test_redirect_statuses() {
        assert!(is_redirect(StatusCode::MOVED_PERMANENTLY));
        assert!(is_redirect(StatusCode::FOUND));
        assert!(is_redirect(StatusCode::SEE_OTHER));
        assert!(is_redirect(StatusCode::TEMPORARY_REDIRECT));
        assert!(is_redirect(StatusCode::PERMANENT_REDIRECT));
        assert!(!is_redirect(StatusCode::OK));
        assert!(!is_redirect(StatusCode::NOT_MODIFIED));

        assert!(rewrites_to_get(StatusCode::SEE_OTHER));
        assert!(!rewrites_to_get(StatusCode::TEMPORARY_REDIRECT));
        assert!(!rewrites_to_get(StatusCode::PERMANENT_REDIRECT));
    }

    #[test]
    fn test_resolve_absolute_location() {
        let current: Uri = "http://example.com/a".parse().unwrap();
        let resolved = resolve_location(&current, "https://other.example/b").unwrap();
        assert_eq!(resolved.to_string(), "https://other.example/b");
    }

    #[test]
    fn test_resolve_relative_location() {
        let current: Uri = "http://example.com/a?q=1".parse().unwrap();
        let resolved = resolve_location(&current, "/b?r=2").unwrap();
        assert_eq!(resolved.to_string(), "http://example.com/b?r=2");
    }

    #[test]
    fn test_resolve_bad_location() {
        let current: Uri = "http://example.com/a".parse().unwrap();
        assert!(resolve_location(&current, "http://exa mple/b").is_err());
    }
}
