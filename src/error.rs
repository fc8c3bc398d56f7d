use hyper::StatusCode;
use thiserror::Error;
use tokio::time::Duration;

/// Main error type for the portico proxy
#[derive(Error, Debug, Clone)]
pub enum PorticoError {
    /// Configuration related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Request target is not a well-formed absolute URI
    #[error("Invalid proxy request: {message}")]
    InvalidRequest { message: String },

    /// Destination host is not on the configured allow-list
    #[error("Domain not allowed: {host}")]
    DomainForbidden { host: String },

    /// Forwarding to the origin failed (transport error, redirect cap, ...)
    #[error("Forward error: {message}")]
    Forward { message: String },

    /// Timeout errors
    #[error("Operation timed out after {duration:?}: {operation}")]
    Timeout {
        duration: Duration,
        operation: String,
    },

    /// Cache storage errors
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// IO related errors
    #[error("IO error: {message}")]
    Io { message: String },

    /// Internal server errors
    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl PorticoError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid-request error
    pub fn invalid_request<S: Into<String>>(message: S) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create a domain-forbidden error
    pub fn domain_forbidden<S: Into<String>>(host: S) -> Self {
        Self::DomainForbidden { host: host.into() }
    }

    /// Create a forward error
    pub fn forward<S: Into<String>>(message: S) -> Self {
        Self::Forward {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(duration: Duration, operation: S) -> Self {
        Self::Timeout {
            duration,
            operation: operation.into(),
        }
    }

    /// Create a cache error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create an IO error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// HTTP status code surfaced to the client for this error.
    ///
    /// Invalid targets are a client problem (400), rejected domains are
    /// forbidden (403), anything that went wrong talking to the origin is a
    /// bad gateway (502).
    pub fn status_code(&self) -> StatusCode {
        match self {
            PorticoError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            PorticoError::DomainForbidden { .. } => StatusCode::FORBIDDEN,
            PorticoError::Forward { .. } | PorticoError::Timeout { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this error is surfaced to the client with a status code, as
    /// opposed to being a local condition that is only logged.
    pub fn is_client_visible(&self) -> bool {
        matches!(
            self,
            PorticoError::InvalidRequest { .. }
                | PorticoError::DomainForbidden { .. }
                | PorticoError::Forward { .. }
                | PorticoError::Timeout { .. }
        )
    }
}

/// Result type alias for portico operations
pub type PorticoResult<T> = Result<T, PorticoError>;

/// Convert from anyhow::Error to PorticoError
impl From<anyhow::Error> for PorticoError {
    fn from(err: anyhow::Error) -> Self {
        // Try to downcast to known error types first
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            return PorticoError::io(format!("IO error: {}", io_err));
        }

        if let Some(hyper_err) = err.downcast_ref::<hyper::Error>() {
            return PorticoError::forward(format!("HTTP error: {}", hyper_err));
        }

        PorticoError::internal(err.to_string())
    }
}

/// Convert from std::io::Error to PorticoError
impl From<std::io::Error> for PorticoError {
    fn from(err: std::io::Error) -> Self {
        PorticoError::io(format!("IO error: {}", err))
    }
}

/// Convert from hyper::Error to PorticoError
impl From<hyper::Error> for PorticoError {
    fn from(err: hyper::Error) -> Self {
        if err.is_timeout() {
            PorticoError::timeout(Duration::from_secs(30), "HTTP request")
        } else if err.is_connect() {
            PorticoError::forward(format!("Connection error: {}", err))
        } else {
            PorticoError::forward(format!("HTTP error: {}", err))
        }
    }
}

/// Convert from toml::de::Error to PorticoError
impl From<toml::de::Error> for PorticoError {
    fn from(err: toml::de::Error) -> Self {
        PorticoError::config(format!("TOML parsing error: {}", err))
    }
}

/// Convert from serde_json::Error to PorticoError
impl From<serde_json::Error> for PorticoError {
    fn from(err: serde_json::Error) -> Self {
        PorticoError::cache(format!("Blob serialization error: {}", err))
    }
}

/// Convert from hyper::http::uri::InvalidUri to PorticoError
impl From<hyper::http::uri::InvalidUri> for PorticoError {
    fn from(err: hyper::http::uri::InvalidUri) -> Self {
        PorticoError::invalid_request(format!("Invalid URI: {}", err))
    }
}

/// Convert from hyper::http::Error to PorticoError
impl From<hyper::http::Error> for PorticoError {
    fn from(err: hyper::http::Error) -> Self {
        PorticoError::internal(format!("HTTP error: {}", err))
    }
}

/// Convert from tokio::time::Elapsed to PorticoError
impl From<tokio::time::error::Elapsed> for PorticoError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        PorticoError::timeout(Duration::from_secs(30), "operation")
    }
}
