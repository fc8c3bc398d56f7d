//! The forward proxy core.
//!
//! Components, leaf first:
//!
//! - `policy`: pure cacheability predicates and cache key derivation
//! - `gatekeeper`: request-shape validation and the domain allow-list
//! - `http_client`: shared pooled hyper client for outbound calls
//! - `forwarder`: request cloning, redirect policy, timeout enforcement
//! - `handler`: the per-request pipeline tying the above together
//! - `server`: the listener feeding requests into the handler
//!
//! Control flow per request: gatekeeper → cache read (short-circuit on hit)
//! → forwarder → cache-write decision → response to client.

pub mod forwarder;
pub mod gatekeeper;
pub mod handler;
pub mod http_client;
pub mod policy;
pub mod server;

pub use handler::ProxyHandler;
pub use server::ProxyServer;
