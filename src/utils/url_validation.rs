//! URL validation for configured endpoints.
//!
//! Endpoints for the mutation gateway and the agent assist webhook must be
//! absolute HTTPS URLs with a host. Plain HTTP is accepted only for loopback
//! hosts so local development servers keep working.

use thiserror::Error;
use tracing::warn;
use url::Url;

/// Errors that can occur during URL validation
#[derive(Debug, Error)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("URL scheme must be HTTPS, got: {0}")]
    HttpsRequired(String),

    #[error("URL must have a host")]
    MissingHost,
}

fn is_loopback(parsed: &Url) -> bool {
    match parsed.host() {
        Some(url::Host::Domain(domain)) => domain == "localhost",
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

/// Validates an endpoint URL.
///
/// # Example
/// ```
/// use call_event_processor::utils::validate_endpoint_url;
///
/// assert!(validate_endpoint_url("https://api.example.com/graphql").is_ok());
/// assert!(validate_endpoint_url("http://localhost:4000/graphql").is_ok());
/// assert!(validate_endpoint_url("http://api.example.com/graphql").is_err());
/// ```
pub fn validate_endpoint_url(url: &str) -> Result<Url, UrlValidationError> {
    let parsed = Url::parse(url)?;

    if parsed.host().is_none() {
        return Err(UrlValidationError::MissingHost);
    }

    match parsed.scheme() {
        "https" => Ok(parsed),
        "http" if is_loopback(&parsed) => Ok(parsed),
        scheme => {
            warn!(url = %url, "Endpoint URL rejected: insecure scheme");
            Err(UrlValidationError::HttpsRequired(scheme.to_string()))
        }
    }
}
