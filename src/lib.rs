//! # Portico - a caching forward HTTP proxy
//!
//! Portico accepts HTTP requests whose target is an absolute URI, optionally
//! filters them by destination domain suffix, optionally serves and saves
//! responses through a pluggable cache, and otherwise relays the request to
//! the origin server and the response back to the client.
//!
//! ## Core behavior
//!
//! - **Domain gatekeeping**: an allow-list of host suffixes, matched on label
//!   boundaries; an empty list allows every destination
//! - **Caching**: GET/HEAD responses without credentials or `no-store`
//!   markers are stored as opaque blobs and served back on later requests
//! - **Forwarding**: verbatim header relay with `X-Forwarded-For` /
//!   `X-Forwarded-Host`, a fixed redirect cap, and one overall timeout
//! - **Buffered bodies**: request and response bodies are fully materialized,
//!   never streamed
//!
//! ## Usage example
//!
//! ```rust,no_run
//! use portico::{config::Config, proxy::ProxyServer};
//! use std::net::SocketAddr;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file_with_env("config.toml").await?;
//!     let bind_addr: SocketAddr = "0.0.0.0:8080".parse()?;
//!     let server = ProxyServer::new(config, bind_addr);
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod proxy;

// Re-export commonly used types
pub use cache::{CacheMetrics, CacheStats, CachedResponse, InMemoryCache, ResponseCache};
pub use config::{CacheConfig, Config, ProxyConfig, ServerConfig};
pub use error::{PorticoError, PorticoResult};
pub use proxy::{ProxyHandler, ProxyServer};
