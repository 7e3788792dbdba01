use crate::annotation::LookupError;
use crate::EnrichmentError;
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use log::debug;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::Value;
use std::num::NonZeroU32;
use std::time::Duration;

/// A blocking HTTP client which admits at most a fixed number of requests per second and
/// returns JSON bodies.
pub(crate) struct RateLimitedClient {
    client: Client,
    limiter: DefaultDirectRateLimiter,
}

impl RateLimitedClient {
    pub(crate) fn new(
        timeout: Duration,
        requests_per_second: u32,
    ) -> Result<RateLimitedClient, EnrichmentError> {
        let rate = NonZeroU32::new(requests_per_second).ok_or_else(|| {
            EnrichmentError::Config("Request rate must be positive.".to_string())
        })?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EnrichmentError::Config(format!("Cannot create HTTP client: {}", e)))?;
        Ok(RateLimitedClient {
            client,
            limiter: RateLimiter::direct(Quota::per_second(rate)),
        })
    }

    /// Block until the rate limiter admits another request.
    fn wait_for_slot(&self) {
        let clock = DefaultClock::default();
        while let Err(not_until) = self.limiter.check() {
            std::thread::sleep(not_until.wait_time_from(clock.now()));
        }
    }

    /// `GET url?query` and parse the body as JSON.
    ///
    /// Transport failures and retryable statuses are `Transient`, every other failure is
    /// `Permanent`.
    pub(crate) fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, LookupError> {
        self.wait_for_slot();
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .map_err(|e| LookupError::Transient(e.to_string()))?;
        if let Some(error) = classify_status(response.status()) {
            return Err(error);
        }
        let body = response
            .text()
            .map_err(|e| LookupError::Transient(e.to_string()))?;
        serde_json::from_str(&body)
            .map_err(|e| LookupError::Permanent(format!("Malformed response: {}", e)))
    }
}

/// The lookup error implied by an HTTP status, or `None` for success.
///
/// Rate limiting (429) and server errors may go away on their own and are `Transient`.
pub(crate) fn classify_status(status: StatusCode) -> Option<LookupError> {
    if status.is_success() {
        None
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Some(LookupError::Transient(format!("HTTP status {}", status)))
    } else {
        Some(LookupError::Permanent(format!("HTTP status {}", status)))
    }
}

#[cfg(test)]
mod tests {
    use crate::annotation::_impl_web_client::{classify_status, RateLimitedClient};
    use crate::annotation::LookupError;
    use reqwest::StatusCode;
    use std::time::Duration;

    #[test]
    fn status_classification() {
        assert_eq!(None, classify_status(StatusCode::OK));
        assert_eq!(None, classify_status(StatusCode::NO_CONTENT));
        for status in [
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            assert!(
                matches!(classify_status(status), Some(LookupError::Transient(_))),
                "{}",
                status
            );
        }
        for status in [
            StatusCode::BAD_REQUEST,
            StatusCode::NOT_FOUND,
            StatusCode::FORBIDDEN,
            StatusCode::MOVED_PERMANENTLY,
        ] {
            assert!(
                matches!(classify_status(status), Some(LookupError::Permanent(_))),
                "{}",
                status
            );
        }
        assert_eq!(
            Some(LookupError::Transient("HTTP status 503 Service Unavailable".to_string())),
            classify_status(StatusCode::SERVICE_UNAVAILABLE)
        );
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert!(RateLimitedClient::new(Duration::from_secs(1), 0).is_err());
        assert!(RateLimitedClient::new(Duration::from_secs(1), 2).is_ok());
    }
}
