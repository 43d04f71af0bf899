//! Events API client
//!
//! Posts event batches to `{base_url}/events/batch` with the bearer token from
//! the credential provider. A missing token fails the attempt before any
//! request is made.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mindhit_core::{CredentialProvider, EventSink};
use mindhit_domain::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT, EVENTS_BATCH_PATH, HEALTH_CHECK_TIMEOUT,
    HEALTH_PATH,
};
use mindhit_domain::{ApiConfig, BrowsingEvent, DeliveryError, MindhitError, SessionId};
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::errors::InfraError;

/// Configuration for the events API client
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL for API (e.g., "http://localhost:9000/v1")
    pub base_url: String,
    /// Timeout for batch deliveries
    pub timeout: Duration,
    /// Timeout for the health probe
    pub health_timeout: Duration,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            health_timeout: HEALTH_CHECK_TIMEOUT,
        }
    }
}

impl From<&ApiConfig> for ApiClientConfig {
    fn from(config: &ApiConfig) -> Self {
        Self { base_url: config.base_url.clone(), timeout: config.timeout(), ..Self::default() }
    }
}

#[derive(Serialize)]
struct BatchBody<'a> {
    session_id: &'a SessionId,
    events: &'a [BrowsingEvent],
}

/// HTTP client for the remote events API
pub struct EventsApiClient {
    http: reqwest::Client,
    credentials: Arc<dyn CredentialProvider>,
    config: ApiClientConfig,
}

impl EventsApiClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns `MindhitError::Config` if the HTTP client cannot be built.
    pub fn new(
        config: ApiClientConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, MindhitError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MindhitError::from(InfraError::from(e)))?;

        Ok(Self { http, credentials, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// POST one batch.
    ///
    /// # Errors
    ///
    /// `AuthMissing` without a token, `Timeout` after the configured timeout,
    /// and a status-specific variant for non-2xx responses.
    #[instrument(skip(self, events), fields(session_id = %session_id, count = events.len()))]
    pub async fn post_batch(
        &self,
        session_id: &SessionId,
        events: &[BrowsingEvent],
    ) -> Result<(), DeliveryError> {
        let token = match self.credentials.bearer_token().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("No bearer token; skipping request");
                return Err(DeliveryError::AuthMissing);
            }
            Err(err) => {
                warn!(error = %err, "Failed to read bearer token");
                return Err(DeliveryError::AuthMissing);
            }
        };

        let url = self.url(EVENTS_BATCH_PATH);
        let body = serde_json::to_vec(&BatchBody { session_id, events })
            .map_err(|e| DeliveryError::Serialization(e.to_string()))?;

        let request = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);

        let timeout = self.config.timeout;
        let response = match tokio::time::timeout(timeout, request.send()).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(err)) => return Err(Self::map_transport_error(&err, timeout)),
            Err(_) => return Err(DeliveryError::Timeout(timeout)),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::map_status_error(status, &url, &body));
        }

        debug!(status = %status, "Batch accepted");
        Ok(())
    }

    /// Probe `GET {base_url}/health` without authentication.
    ///
    /// # Returns
    ///
    /// `true` if the API answered with a 2xx status
    ///
    /// # Errors
    ///
    /// Returns error if the request times out or cannot be sent
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<bool, DeliveryError> {
        let url = self.url(HEALTH_PATH);
        let timeout = self.config.health_timeout;

        let response = tokio::time::timeout(timeout, self.http.get(&url).send())
            .await
            .map_err(|_| {
                warn!("Health check timeout");
                DeliveryError::Timeout(timeout)
            })?;

        match response {
            Ok(resp) if resp.status().is_success() => {
                debug!("API is healthy");
                Ok(true)
            }
            Ok(resp) => {
                info!(status = %resp.status(), "API returned non-success status");
                Ok(false)
            }
            Err(e) => {
                debug!(error = %e, "Health check failed");
                Err(Self::map_transport_error(&e, timeout))
            }
        }
    }

    fn map_transport_error(err: &reqwest::Error, timeout: Duration) -> DeliveryError {
        if err.is_timeout() {
            DeliveryError::Timeout(timeout)
        } else if err.is_builder() {
            DeliveryError::Serialization(err.to_string())
        } else {
            DeliveryError::Network(err.to_string())
        }
    }

    fn map_status_error(status: StatusCode, url: &str, body: &str) -> DeliveryError {
        let message = if body.is_empty() {
            format!("{url} returned status {status}")
        } else {
            format!("{url} returned status {status}: {body}")
        };

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            DeliveryError::Auth(message)
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            DeliveryError::RateLimit(message)
        } else if status.is_server_error() {
            DeliveryError::Server(message)
        } else if status.is_client_error() {
            DeliveryError::Client(message)
        } else {
            DeliveryError::Network(message)
        }
    }
}

#[async_trait]
impl EventSink for EventsApiClient {
    async fn deliver(
        &self,
        session_id: &SessionId,
        events: &[BrowsingEvent],
    ) -> Result<(), DeliveryError> {
        self.post_batch(session_id, events).await
    }
}

#[cfg(test)]
mod tests {
    use mindhit_domain::Result as DomainResult;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    struct StaticToken(Option<&'static str>);

    #[async_trait]
    impl CredentialProvider for StaticToken {
        async fn bearer_token(&self) -> DomainResult<Option<String>> {
            Ok(self.0.map(str::to_string))
        }
    }

    fn client(server: &MockServer, token: Option<&'static str>) -> EventsApiClient {
        let config = ApiClientConfig {
            base_url: format!("{}/v1", server.uri()),
            timeout: Duration::from_secs(2),
            health_timeout: Duration::from_secs(1),
        };
        EventsApiClient::new(config, Arc::new(StaticToken(token))).unwrap()
    }

    fn session() -> SessionId {
        SessionId::new("s1").unwrap()
    }

    #[tokio::test]
    async fn posts_batch_with_bearer_token() {
        let server = MockServer::start().await;
        let events = vec![BrowsingEvent::scroll(1, "https://example.com", 0.5)];

        Mock::given(method("POST"))
            .and(path("/v1/events/batch"))
            .and(header("Authorization", "Bearer tok"))
            .and(body_json(json!({
                "session_id": "s1",
                "events": [{"type": "scroll", "timestamp": 1, "url": "https://example.com", "scroll_depth": 0.5}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server, Some("tok")).post_batch(&session(), &events).await.unwrap();
    }

    #[tokio::test]
    async fn missing_token_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let result = client(&server, None).post_batch(&session(), &[]).await;
        assert_eq!(result, Err(DeliveryError::AuthMissing));
    }

    #[tokio::test]
    async fn maps_status_codes() {
        let cases = [
            (401, "auth"),
            (403, "auth"),
            (429, "rate_limit"),
            (503, "server"),
            (422, "client"),
        ];

        for (status, label) in cases {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v1/events/batch"))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;

            let err = client(&server, Some("tok")).post_batch(&session(), &[]).await.unwrap_err();
            assert_eq!(err.label(), label, "status {status}");
        }
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let err = client(&server, Some("tok")).post_batch(&session(), &[]).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Timeout(_)), "unexpected error {err:?}");
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        let config = ApiClientConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_secs(2),
            ..ApiClientConfig::default()
        };
        let client = EventsApiClient::new(config, Arc::new(StaticToken(Some("tok")))).unwrap();

        let err = client.post_batch(&session(), &[]).await.unwrap_err();
        assert!(
            matches!(err, DeliveryError::Network(_) | DeliveryError::Timeout(_)),
            "unexpected error {err:?}"
        );
    }

    #[tokio::test]
    async fn health_check_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        assert!(client(&server, None).health_check().await.unwrap());

        let unhealthy = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&unhealthy)
            .await;
        assert!(!client(&unhealthy, None).health_check().await.unwrap());
    }
}
