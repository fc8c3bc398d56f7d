use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Enable/disable caching
    pub enabled: bool,
    /// Maximum total cache size in bytes
    #[serde(default = "default_max_size")]
    pub max_size: u64,
    /// Maximum size of a single cached entry in bytes.
    /// Defaults to max_size / 8 when not set.
    pub max_entry_size: Option<u64>,
    /// Time to live for cached entries in seconds
    #[serde(default = "default_ttl")]
    pub default_ttl: u64,
    /// Optional prefix prepended to every cache key
    pub key_prefix: Option<String>,
    /// Enable cache metrics collection
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_max_size() -> u64 {
    100 * 1024 * 1024 // 100MB
}

fn default_ttl() -> u64 {
    3600 // 1 hour
}

fn default_true() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_size: default_max_size(),
            max_entry_size: None,
            default_ttl: default_ttl(),
            key_prefix: None,
            metrics_enabled: true,
        }
    }
}

impl CacheConfig {
    /// Validate cache configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(anyhow::anyhow!("Cache max_size must be greater than 0"));
        }

        if self.default_ttl == 0 {
            return Err(anyhow::anyhow!("Cache default_ttl must be greater than 0"));
        }

        if let Some(max_entry_size) = self.max_entry_size {
            if max_entry_size == 0 {
                return Err(anyhow::anyhow!(
                    "Cache max_entry_size must be greater than 0"
                ));
            }
            if max_entry_size > self.max_size {
                return Err(anyhow::anyhow!(
                    "Cache max_entry_size must not exceed max_size"
                ));
            }
        }

        Ok(())
    }

    /// Effective per-entry size cap
    pub fn entry_size_limit(&self) -> u64 {
        self.max_entry_size.unwrap_or(self.max_size / 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_config_default() {
        let config = CacheConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.max_size, 100 * 1024 * 1024);
        assert_eq!(config.default_ttl, 3600);
        assert!(config.key_prefix.is_none());
        assert!(config.metrics_enabled);
        assert_eq!(config.entry_size_limit(), 100 * 1024 * 1024 / 8);
    }

    #[test]
    fn test_cache_config_validation() {
        let mut config = CacheConfig::default();

        // Valid config should pass
        assert!(config.validate().is_ok());

        // Zero max_size should fail
        config.max_size = 0;
        assert!(config.validate().is_err());

        // Zero default_ttl should fail
        config.max_size = 1024;
        config.default_ttl = 0;
        assert!(config.validate().is_err());

        // max_entry_size above max_size should fail
        config.default_ttl = 60;
        config.max_entry_size = Some(2048);
        assert!(config.validate().is_err());

        config.max_entry_size = Some(512);
        assert!(config.validate().is_ok());
        assert_eq!(config.entry_size_limit(), 512);
    }
}
