//! Request-shape validation and the destination domain allow-list.

use hyper::Uri;

use crate::error::{PorticoError, PorticoResult};

/// Check that the request target is a proper absolute URI.
///
/// A target without scheme or host is a request that hit the listener
/// directly instead of going through proxy configuration; it cannot be
/// forwarded anywhere.
pub fn validate_target(uri: &Uri) -> PorticoResult<()> {
    if uri.scheme().is_none() || uri.host().is_none() {
        return Err(PorticoError::invalid_request(
            "target URL must include scheme and host",
        ));
    }
    Ok(())
}

/// Check a destination host against the configured allow-list.
///
/// An empty allow-list permits every destination. Otherwise the host (with
/// any port stripped) must match one of the configured suffixes on a label
/// boundary: equal to the suffix, or ending with `.` + suffix. Plain
/// string-suffix matching would let `notexample.com` satisfy an
/// `example.com` entry, so it is not used. Comparison is case-sensitive.
pub fn is_domain_allowed(host: &str, allowed_domains: &[String]) -> bool {
    if allowed_domains.is_empty() {
        return true;
    }

    // Remove port from host if present
    let host = host.split(':').next().unwrap_or(host);

    allowed_domains
        .iter()
        .any(|suffix| host == suffix || host.ends_with(&format!(".{}", suffix)))
}

/// Allow-list check that fails with `DomainForbidden` for the pipeline
pub fn check_domain(host: &str, allowed_domains: &[String]) -> PorticoResult<()> {
    if is_domain_allowed(host, allowed_domains) {
        Ok(())
    } else {
        Err(PorticoError::domain_forbidden(host))
    }
}
