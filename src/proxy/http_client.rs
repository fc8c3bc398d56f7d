use hyper::client::HttpConnector;
use hyper::{Body, Client, Request, Response};
use once_cell::sync::Lazy;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::config::HttpClientConfig;
use crate::error::PorticoResult;

/// Shared hyper client with connection pooling (HTTP/HTTPS via rustls)
///
/// - Single client instance reused across requests to enable pooling
/// - Supports both http and https origins
static SHARED_CLIENT: Lazy<
    RwLock<Arc<Client<hyper_rustls::HttpsConnector<HttpConnector>, Body>>>,
> = Lazy::new(|| RwLock::new(Arc::new(build_client(None))));

/// Initialize or reinitialize the shared HTTP client with optional
/// configuration. Safe to call multiple times; later calls replace the client.
pub fn init(config: Option<&HttpClientConfig>) {
    let new_client = Arc::new(build_client(config));
    if let Ok(mut guard) = SHARED_CLIENT.write() {
        *guard = new_client;
    }
}

fn get_client() -> Arc<Client<hyper_rustls::HttpsConnector<HttpConnector>, Body>> {
    SHARED_CLIENT
        .read()
        .ok()
        .map(|g| Arc::clone(&g))
        .unwrap_or_else(|| Arc::new(build_client(None)))
}

fn build_client(
    config: Option<&HttpClientConfig>,
) -> Client<hyper_rustls::HttpsConnector<HttpConnector>, Body> {
    // Base TCP connector
    let mut http = HttpConnector::new();
    http.enforce_http(false); // allow https URIs through the connector
    http.set_nodelay(true);

    // Wrap with rustls HTTPS support and allow both https and http
    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .wrap_connector(http);

    let pool_idle_timeout = config
        .map(|c| c.get_pool_idle_timeout())
        .unwrap_or(Duration::from_secs(90));
    let pool_max_idle_per_host = config.map(|c| c.get_pool_max_idle_per_host()).unwrap_or(32);

    Client::builder()
        .pool_idle_timeout(pool_idle_timeout)
        .pool_max_idle_per_host(pool_max_idle_per_host)
        .build::<_, Body>(https)
}

/// Issue a single outbound request through the shared pooled client.
/// Redirect and timeout policy are the caller's concern.
pub async fn request(req: Request<Body>) -> PorticoResult<Response<Body>> {
    let client = get_client();
    Ok(client.request(req).await?)
}
