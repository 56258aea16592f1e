use std::time::Duration;

use common::error::UsecaseError;
use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::usecase::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
use crate::usecase::contracts::RideGate;

#[derive(Debug, Error)]
enum LookupError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(StatusCode),
}

/// Looks rides up over HTTP on the ride service.
#[derive(Clone)]
pub struct HttpRideGate {
    client: Client,
    base_url: String,
    breaker: CircuitBreaker,
}

impl HttpRideGate {
    pub fn new(
        base_url: String,
        timeout: Duration,
        breaker_config: CircuitBreakerConfig,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent("ride-hailing-rating/1.0")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            breaker: CircuitBreaker::new("ride_service", breaker_config),
        })
    }

    #[cfg(test)]
    fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// `Ok(false)` for a 404 so a missing ride does not count against the breaker.
    async fn lookup(&self, url: &str) -> Result<bool, LookupError> {
        let resp = self.client.get(url).send().await?;
        match resp.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(LookupError::Status(status)),
        }
    }
}

impl RideGate for HttpRideGate {
    #[tracing::instrument(skip(self))]
    async fn ensure_ride_exists(&self, ride_id: i64) -> Result<(), UsecaseError> {
        let url = format!("{}/api/v1/rides/{}", self.base_url, ride_id);

        match self.breaker.call(|| self.lookup(&url)).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                tracing::debug!("ride does not exist");
                Err(UsecaseError::NotFound("Ride".to_string()))
            }
            Err(CircuitBreakerError::Open) => {
                metrics::counter!("ride_gate_failures_total", "reason" => "circuit_open")
                    .increment(1);
                Err(UsecaseError::Unavailable(
                    "Ride service is unavailable".to_string(),
                ))
            }
            Err(CircuitBreakerError::Inner(e)) => {
                tracing::warn!(error = %e, "ride lookup failed");
                metrics::counter!("ride_gate_failures_total", "reason" => "lookup").increment(1);
                Err(UsecaseError::Unavailable(
                    "Ride service is unavailable".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::usecase::circuit_breaker::State;

    fn gate(server: &MockServer, failure_threshold: u32) -> HttpRideGate {
        HttpRideGate::new(
            server.uri(),
            Duration::from_millis(500),
            CircuitBreakerConfig {
                failure_threshold,
                cooldown: Duration::from_secs(60),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_existing_ride_passes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/rides/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 42})))
            .expect(1)
            .mount(&server)
            .await;

        let gate = gate(&server, 3);

        tokio_test::assert_ok!(gate.ensure_ride_exists(42).await);
    }

    #[tokio::test]
    async fn test_missing_ride_is_not_found_and_keeps_circuit_closed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/rides/9"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let gate = gate(&server, 1);

        for _ in 0..3 {
            let result = gate.ensure_ride_exists(9).await;
            assert!(matches!(result, Err(UsecaseError::NotFound(_))));
        }
        assert_eq!(gate.breaker().state().await, State::Closed);
    }

    #[tokio::test]
    async fn test_server_errors_open_circuit_and_stop_calls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let gate = gate(&server, 2);

        for _ in 0..2 {
            let result = gate.ensure_ride_exists(1).await;
            assert!(matches!(result, Err(UsecaseError::Unavailable(_))));
        }
        assert_eq!(gate.breaker().state().await, State::Open);

        // Rejected without reaching the server; the mock expects exactly two calls.
        let result = gate.ensure_ride_exists(1).await;
        assert!(matches!(result, Err(UsecaseError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_timeout_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let gate = gate(&server, 5);

        let result = gate.ensure_ride_exists(1).await;
        assert!(matches!(result, Err(UsecaseError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unavailable() {
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);

        let gate = HttpRideGate::new(
            uri,
            Duration::from_millis(500),
            CircuitBreakerConfig::default(),
        )
        .unwrap();

        let result = gate.ensure_ride_exists(1).await;
        assert!(matches!(result, Err(UsecaseError::Unavailable(_))));
    }
}
