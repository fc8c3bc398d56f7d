use anyhow::Result;
use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Server};
use std::convert::Infallible;
use std::net::SocketAddr;
use tracing::{error, info};

use super::handler::ProxyHandler;
use crate::config::Config;
use crate::proxy::http_client;

/// The forward proxy server: owns the listener and hands every accepted
/// request to a cloned [`ProxyHandler`].
pub struct ProxyServer {
    config: Config,
    bind_addr: SocketAddr,
}

impl ProxyServer {
    /// Create a new proxy server
    pub fn new(config: Config, bind_addr: SocketAddr) -> Self {
        Self { config, bind_addr }
    }

    /// Run the server until it fails or the process is shut down
    pub async fn run(self) -> Result<()> {
        // Apply pool tuning to the shared outbound client before accepting
        http_client::init(self.config.proxy.http_client.as_ref());

        let handler = ProxyHandler::new(&self.config);

        info!("Starting HTTP forward proxy on {}", self.bind_addr);

        let make_service = make_service_fn(move |conn: &AddrStream| {
            let handler = handler.clone();
            let remote = conn.remote_addr();
            async move {
                Ok::<_, Infallible>(service_fn(move |mut req: Request<Body>| {
                    let handler = handler.clone();
                    // Attach the remote address so the forwarder can set
                    // X-Forwarded-For
                    req.extensions_mut().insert(remote);
                    async move { handler.handle_request(req).await }
                }))
            }
        });

        let server = Server::bind(&self.bind_addr).serve(make_service);

        if let Err(e) = server.await {
            error!("HTTP server error: {}", e);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_proxy_server_creation() {
        let bind_addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let server = ProxyServer::new(Config::default(), bind_addr);

        assert_eq!(server.bind_addr, bind_addr);
        assert!(server.config.proxy.allowed_domains.is_empty());
    }
}
