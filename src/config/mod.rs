//! Configuration management for the portico proxy.
//!
//! Configuration is a TOML file with `${VAR}` / `${VAR:-default}` environment
//! variable expansion applied to the raw text before parsing. Sections:
//!
//! - `server`: listener settings (bind address)
//! - `proxy`: destination allow-list, outbound timeout, client pool tuning
//! - `cache`: optional response cache settings
//!
//! All sections validate themselves after load; the assembled [`Config`] is
//! immutable and shared read-only for the process lifetime.

pub mod cache;
pub mod proxy;
pub mod server;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use tracing::{info, warn};

pub use cache::CacheConfig;
pub use proxy::{HttpClientConfig, ProxyConfig};
pub use server::ServerConfig;

/// Portico proxy main configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Listener configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Forward-proxy behavior (allow-list, timeout, client pool)
    #[serde(default)]
    pub proxy: ProxyConfig,
    /// Response cache configuration (optional; omitted = no cache)
    pub cache: Option<CacheConfig>,
}

impl Config {
    /// Load configuration from file with environment variable expansion
    pub async fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;

        // Expand environment variables in the content
        let expanded_content = expand_env_vars(&content);

        let config: Config = toml::from_str(&expanded_content)?;
        config.validate()?;

        info!("Configuration loaded from {:?}", path.as_ref());
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        self.proxy.validate()?;

        if let Some(cache) = &self.cache {
            cache.validate()?;
        }

        if self.proxy.allowed_domains.is_empty() {
            warn!("No allowed domains configured - proxy will forward to any destination");
        }

        Ok(())
    }

    /// Check if caching is enabled
    pub fn is_cache_enabled(&self) -> bool {
        self.cache.as_ref().is_some_and(|c| c.enabled)
    }
}

/// Expand environment variables in configuration content
/// Supports ${VAR} and ${VAR:-default} syntax
fn expand_env_vars(content: &str) -> String {
    let mut result = content.to_string();

    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_expr = &result[start + 2..start + end];
            let replacement = if let Some(default_pos) = var_expr.find(":-") {
                let var_name = &var_expr[..default_pos];
                let default_value = &var_expr[default_pos + 2..];
                env::var(var_name).unwrap_or_else(|_| default_value.to_string())
            } else {
                env::var(var_expr).unwrap_or_else(|_| {
                    warn!(
                        "Environment variable '{}' not found, using empty string",
                        var_expr
                    );
                    String::new()
                })
            };

            result.replace_range(start..start + end + 1, &replacement);
        } else {
            break; // Malformed ${VAR expression
        }
    }

    result
}
