use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Forward proxy configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyConfig {
    /// Domain suffixes allowed as forwarding destinations.
    /// An empty list allows every destination.
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    /// Overall timeout for one outbound exchange, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Upstream HTTP client pool tuning (optional)
    pub http_client: Option<HttpClientConfig>,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            allowed_domains: Vec::new(),
            timeout_secs: default_timeout_secs(),
            http_client: None,
        }
    }
}

impl ProxyConfig {
    /// Validate proxy configuration
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "Proxy timeout_secs must be greater than 0"
            ));
        }

        for domain in &self.allowed_domains {
            if domain.is_empty() {
                return Err(anyhow::anyhow!(
                    "Allowed domain entries must not be empty"
                ));
            }
            if domain.contains('/') || domain.contains(' ') {
                return Err(anyhow::anyhow!("Invalid allowed domain: {}", domain));
            }
        }

        if let Some(http_client) = &self.http_client {
            http_client.validate()?;
        }

        Ok(())
    }

    /// Outbound exchange timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// HTTP client configuration for upstream requests
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpClientConfig {
    pub pool_max_idle_per_host: Option<usize>,
    pub pool_idle_timeout_secs: Option<u64>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            pool_max_idle_per_host: Some(32),
            pool_idle_timeout_secs: Some(90),
        }
    }
}

impl HttpClientConfig {
    /// Validate HTTP client configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(max_idle) = self.pool_max_idle_per_host {
            if max_idle == 0 {
                return Err(anyhow::anyhow!(
                    "HTTP client pool_max_idle_per_host must be greater than 0"
                ));
            }
        }

        if let Some(idle_timeout) = self.pool_idle_timeout_secs {
            if idle_timeout == 0 {
                return Err(anyhow::anyhow!(
                    "HTTP client pool_idle_timeout_secs must be greater than 0"
                ));
            }
        }

        Ok(())
    }

    /// Get pool max idle connections per host
    pub fn get_pool_max_idle_per_host(&self) -> usize {
        self.pool_max_idle_per_host.unwrap_or(32)
    }

    /// Get pool idle timeout
    pub fn get_pool_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_idle_timeout_secs.unwrap_or(90))
    }
}
