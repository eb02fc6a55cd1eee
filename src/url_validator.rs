//! Validation of the configured reasoning service endpoint.
//!
//! The API key travels in a request header, so the endpoint must be HTTPS.
//! Plain HTTP is accepted only for loopback hosts (local proxies and test
//! doubles).

use std::net::IpAddr;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlValidationError {
    /// URL is malformed or cannot be parsed
    InvalidUrl(String),
    /// Plain HTTP to a non-loopback host
    NotHttps(String),
    /// Scheme is neither http nor https
    UnsupportedScheme(String),
    /// URL has no host
    MissingHost,
}

impl std::fmt::Display for UrlValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UrlValidationError::InvalidUrl(msg) => write!(f, "Invalid URL: {}", msg),
            UrlValidationError::NotHttps(host) => {
                write!(f, "Only HTTPS is allowed for non-local host {}", host)
            }
            UrlValidationError::UnsupportedScheme(scheme) => {
                write!(f, "Unsupported URL scheme: {}", scheme)
            }
            UrlValidationError::MissingHost => write!(f, "URL has no host"),
        }
    }
}

impl std::error::Error for UrlValidationError {}

/// Check if a host names the local machine.
fn is_loopback_host(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    let host = host.trim_start_matches('[').trim_end_matches(']');
    match host.parse::<IpAddr>() {
        Ok(ip) => ip.is_loopback(),
        Err(_) => false,
    }
}

/// Validate the reasoning service URL.
pub fn validate_api_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str).map_err(|e| UrlValidationError::InvalidUrl(e.to_string()))?;
    let host = url
        .host_str()
        .ok_or(UrlValidationError::MissingHost)?
        .to_string();

    match url.scheme() {
        "https" => Ok(url),
        "http" if is_loopback_host(&host) => Ok(url),
        "http" => Err(UrlValidationError::NotHttps(host)),
        other => Err(UrlValidationError::UnsupportedScheme(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_https() {
        assert!(validate_api_url("https://api.anthropic.com/v1/messages").is_ok());
    }

    #[test]
    fn test_accepts_http_on_loopback() {
        assert!(validate_api_url("http://localhost:8080/v1/messages").is_ok());
        assert!(validate_api_url("http://127.0.0.1:9/v1/messages").is_ok());
        assert!(validate_api_url("http://[::1]:9/v1/messages").is_ok());
    }

    #[test]
    fn test_rejects_http_elsewhere() {
        assert!(matches!(
            validate_api_url("http://api.anthropic.com/v1/messages"),
            Err(UrlValidationError::NotHttps(_))
        ));
    }

    #[test]
    fn test_rejects_garbage_and_other_schemes() {
        assert!(matches!(
            validate_api_url("not a url"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
        assert!(matches!(
            validate_api_url("ftp://example.com/x"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
    }
}
