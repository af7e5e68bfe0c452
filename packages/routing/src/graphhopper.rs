//! `GraphHopper` Directions API client.
//!
//! See <https://docs.graphhopper.com/>. Both endpoints are plain `GET`s
//! authenticated with a `key` query parameter.

use std::time::Duration;

use crate::config::RoutingService;
use crate::{IsochroneRequest, RouteRequest, RoutingError, RoutingProvider};

/// Isochrone responses are drawn as a single area.
const ISOCHRONE_BUCKETS: u32 = 1;

/// HTTP client for the `GraphHopper` route and isochrone endpoints.
#[derive(Debug, Clone)]
pub struct GraphHopperClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GraphHopperClient {
    /// Creates a client for `base_url` whose calls fail after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Config`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RoutingError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RoutingError::Config {
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        let api_key = api_key.filter(|k| !k.is_empty());
        if api_key.is_none() {
            log::warn!("No routing API key configured; route and isochrone calls will fail");
        }

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Creates a client from a service definition, with optional overrides
    /// for the base URL and timeout.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Config`] if the HTTP client cannot be built.
    pub fn from_service(
        service: &RoutingService,
        api_key: Option<String>,
        base_url: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Self, RoutingError> {
        let client = Self::new(
            base_url.unwrap_or(&service.base_url),
            api_key,
            timeout.unwrap_or_else(|| service.timeout()),
        )?;
        log::info!("Using {} at {}", service.name, client.base_url);
        Ok(client)
    }

    fn key(&self) -> Result<&str, RoutingError> {
        self.api_key.as_deref().ok_or_else(|| RoutingError::Upstream {
            status: None,
            message: "Routing provider API key is not configured".to_string(),
            payload: None,
        })
    }

    async fn get_json(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, RoutingError> {
        let url = format!("{}/{endpoint}", self.base_url);
        log::debug!("GET {url}");

        let resp = self.client.get(&url).query(query).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        parse_response(status, &body)
    }
}

/// Interprets a provider response, keeping the JSON error body on failure.
fn parse_response(
    status: reqwest::StatusCode,
    body: &str,
) -> Result<serde_json::Value, RoutingError> {
    let json = serde_json::from_str::<serde_json::Value>(body).ok();

    if !status.is_success() {
        let message = json
            .as_ref()
            .and_then(|v| v["message"].as_str())
            .map_or_else(|| format!("HTTP {status}"), |m| format!("HTTP {status}: {m}"));
        log::error!("Routing provider error: {message}");
        return Err(RoutingError::Upstream {
            status: Some(status.as_u16()),
            message,
            payload: json,
        });
    }

    json.ok_or_else(|| RoutingError::Upstream {
        status: Some(status.as_u16()),
        message: "Routing provider returned a non-JSON body".to_string(),
        payload: None,
    })
}

#[async_trait::async_trait]
impl RoutingProvider for GraphHopperClient {
    async fn route(&self, request: &RouteRequest) -> Result<serde_json::Value, RoutingError> {
        let key = self.key()?;
        self.get_json(
            "route",
            &[
                ("point", request.start.to_string()),
                ("point", request.end.to_string()),
                ("profile", request.profile.to_string()),
                ("instructions", "true".to_string()),
                ("calc_points", "true".to_string()),
                ("key", key.to_string()),
            ],
        )
        .await
    }

    async fn isochrone(
        &self,
        request: &IsochroneRequest,
    ) -> Result<serde_json::Value, RoutingError> {
        let key = self.key()?;
        self.get_json(
            "isochrone",
            &[
                ("point", request.center.to_string()),
                ("time_limit", request.time_limit_secs.to_string()),
                ("profile", request.profile.to_string()),
                ("buckets", ISOCHRONE_BUCKETS.to_string()),
                ("key", key.to_string()),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::{IsochroneConfig, Profile};

    fn client(server: &MockServer) -> GraphHopperClient {
        GraphHopperClient::new(
            &server.uri(),
            Some("test-key".to_string()),
            Duration::from_millis(500),
        )
        .unwrap()
    }

    fn route_request() -> RouteRequest {
        RouteRequest::from_raw(
            Some("40.7128"),
            Some("-74.006"),
            Some("40.758"),
            Some("-73.9855"),
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn route_passes_payload_through() {
        let server = MockServer::start().await;
        let payload = json!({ "paths": [{ "distance": 5012.3, "time": 3_600_000, "points": "_p~iF~ps|U" }] });

        Mock::given(method("GET"))
            .and(path("/route"))
            .and(query_param("profile", "foot"))
            .and(query_param("instructions", "true"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(payload.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let body = client(&server).route(&route_request()).await.unwrap();
        assert_eq!(body, payload);
    }

    #[tokio::test]
    async fn isochrone_sends_time_limit_and_buckets() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/isochrone"))
            .and(query_param("point", "52.5,13.4"))
            .and(query_param("time_limit", "300"))
            .and(query_param("profile", "bike"))
            .and(query_param("buckets", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "polygons": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let request = IsochroneRequest::from_raw(
            Some("52.5"),
            Some("13.4"),
            Some("300"),
            Some("bike"),
            &IsochroneConfig::default(),
        )
        .unwrap();
        assert_eq!(request.profile, Profile::Bike);

        let body = client(&server).isochrone(&request).await.unwrap();
        assert_eq!(body, json!({ "polygons": [] }));
    }

    #[tokio::test]
    async fn provider_error_body_is_preserved() {
        let server = MockServer::start().await;
        let error_body = json!({ "message": "Cannot find point 0: 40.7128,-74.006", "hints": [] });

        Mock::given(method("GET"))
            .and(path("/route"))
            .respond_with(ResponseTemplate::new(400).set_body_json(error_body.clone()))
            .mount(&server)
            .await;

        let err = client(&server).route(&route_request()).await.unwrap_err();
        match err {
            RoutingError::Upstream {
                status,
                message,
                payload,
            } => {
                assert_eq!(status, Some(400));
                assert!(message.contains("Cannot find point"));
                assert_eq!(payload, Some(error_body));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/route"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "paths": [] }))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let err = client(&server).route(&route_request()).await.unwrap_err();
        assert!(matches!(err, RoutingError::Upstream { status: None, .. }));
    }

    #[tokio::test]
    async fn non_json_success_is_an_upstream_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/route"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client(&server).route(&route_request()).await.unwrap_err();
        assert!(matches!(
            err,
            RoutingError::Upstream {
                status: Some(200),
                payload: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn missing_key_fails_without_calling_provider() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = GraphHopperClient::new(&server.uri(), None, Duration::from_secs(1)).unwrap();
        let err = client.route(&route_request()).await.unwrap_err();
        assert!(matches!(err, RoutingError::Upstream { status: None, .. }));
    }

    #[tokio::test]
    async fn invalid_route_request_never_reaches_provider() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let result = RouteRequest::from_raw(Some("40.7"), Some("-74.0"), None, None, None);
        assert!(matches!(result, Err(RoutingError::Validation { .. })));

        let _ = client(&server);
    }

    #[test]
    fn from_service_applies_overrides() {
        let service = crate::config::graphhopper_service().unwrap();
        let client = GraphHopperClient::from_service(
            &service,
            Some("k".to_string()),
            Some("http://localhost:8989/"),
            None,
        )
        .unwrap();
        assert_eq!(client.base_url, "http://localhost:8989");
    }
}
