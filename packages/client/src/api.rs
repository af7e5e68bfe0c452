//! HTTP client for the safe route REST API.

use std::time::Duration;

use safe_route_database_models::{EmergencyContact, ReactionKind};
use safe_route_geo::GeoPoint;
use safe_route_routing::response::{IsochroneResponse, RouteResponse};
use safe_route_routing::{IsochroneRequest, RouteRequest};
use safe_route_server_models::{
    ApiHealth, ApiMessage, ApiNearbyReview, ApiReactionCounts, ApiReview, ApiUser, AuthResponse,
    CreateReviewRequest, EmergencyContactsRequest, LoginRequest, ProfileUpdateRequest,
    RegisterRequest, SosRequest, SosResponse, UpdateReviewRequest, UserIdRequest,
};
use serde::de::DeserializeOwned;

use crate::ClientError;
use crate::overlay::MapDataSource;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Typed access to every `/api` endpoint.
///
/// Every call fails with [`ClientError::Http`] when the request cannot be
/// sent and [`ClientError::Api`] when the server answers with an error
/// status.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

#[allow(clippy::missing_errors_doc)]
impl ApiClient {
    /// Creates a client for the API rooted at `base_url`
    /// (e.g. `http://localhost:5000/api`).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Same as [`ApiClient::new`] with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the HTTP client cannot be built.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// `GET /health`.
    pub async fn health(&self) -> Result<ApiHealth, ClientError> {
        decode(self.client.get(self.url("health")).send().await?).await
    }

    /// Creates an account. The response carries the new user's id.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ClientError> {
        let body = RegisterRequest {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        };
        decode(
            self.client
                .post(self.url("users/register"))
                .json(&body)
                .send()
                .await?,
        )
        .await
    }

    /// Checks credentials. A wrong email or password is a 400 with
    /// `Invalid credentials`.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let body = LoginRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        };
        decode(
            self.client
                .post(self.url("users/login"))
                .json(&body)
                .send()
                .await?,
        )
        .await
    }

    /// Profile and emergency contacts of `user_id`.
    pub async fn get_user(&self, user_id: i64) -> Result<ApiUser, ClientError> {
        decode(
            self.client
                .get(self.url(&format!("users/{user_id}")))
                .send()
                .await?,
        )
        .await
    }

    /// Changes the provided profile fields of `user_id`.
    pub async fn update_profile(
        &self,
        user_id: i64,
        update: &ProfileUpdateRequest,
    ) -> Result<ApiUser, ClientError> {
        decode(
            self.client
                .put(self.url(&format!("users/{user_id}")))
                .json(update)
                .send()
                .await?,
        )
        .await
    }

    /// Replaces the whole emergency contact list of `user_id`.
    pub async fn replace_emergency_contacts(
        &self,
        user_id: i64,
        contacts: Vec<EmergencyContact>,
    ) -> Result<ApiUser, ClientError> {
        let body = EmergencyContactsRequest {
            emergency_contacts: contacts,
        };
        decode(
            self.client
                .put(self.url(&format!("users/{user_id}/emergency-contacts")))
                .json(&body)
                .send()
                .await?,
        )
        .await
    }

    /// Asks the server to email every emergency contact of `user_id`.
    pub async fn send_sos(
        &self,
        user_id: i64,
        location: GeoPoint,
    ) -> Result<SosResponse, ClientError> {
        let body = SosRequest {
            location: Some(location),
        };
        decode(
            self.client
                .post(self.url(&format!("users/{user_id}/sos")))
                .json(&body)
                .send()
                .await?,
        )
        .await
    }

    /// All reviews, newest first.
    pub async fn list_reviews(&self) -> Result<Vec<ApiReview>, ClientError> {
        decode(self.client.get(self.url("reviews")).send().await?).await
    }

    /// Reviews within `max_distance_m` of `center`, nearest first.
    pub async fn nearby_reviews(
        &self,
        center: GeoPoint,
        max_distance_m: Option<f64>,
    ) -> Result<Vec<ApiNearbyReview>, ClientError> {
        let mut query = vec![
            ("lng", center.longitude.to_string()),
            ("lat", center.latitude.to_string()),
        ];
        if let Some(distance) = max_distance_m {
            query.push(("maxDistance", distance.to_string()));
        }
        decode(
            self.client
                .get(self.url("reviews/near"))
                .query(&query)
                .send()
                .await?,
        )
        .await
    }

    /// A single review.
    pub async fn get_review(&self, id: i64) -> Result<ApiReview, ClientError> {
        decode(
            self.client
                .get(self.url(&format!("reviews/{id}")))
                .send()
                .await?,
        )
        .await
    }

    /// Posts a review. Reactions start empty.
    pub async fn create_review(
        &self,
        review: &CreateReviewRequest,
    ) -> Result<ApiReview, ClientError> {
        decode(
            self.client
                .post(self.url("reviews"))
                .json(review)
                .send()
                .await?,
        )
        .await
    }

    /// Edits a review. Only its author may do this.
    pub async fn update_review(
        &self,
        id: i64,
        update: &UpdateReviewRequest,
    ) -> Result<ApiReview, ClientError> {
        decode(
            self.client
                .put(self.url(&format!("reviews/{id}")))
                .json(update)
                .send()
                .await?,
        )
        .await
    }

    /// Deletes a review on behalf of its author `user_id`.
    pub async fn delete_review(&self, id: i64, user_id: i64) -> Result<ApiMessage, ClientError> {
        decode(
            self.client
                .delete(self.url(&format!("reviews/{id}")))
                .json(&UserIdRequest {
                    user_id: Some(user_id),
                })
                .send()
                .await?,
        )
        .await
    }

    /// Toggles `kind` on review `id` for `user_id` and returns the
    /// server's counters.
    pub async fn react(
        &self,
        id: i64,
        user_id: i64,
        kind: ReactionKind,
    ) -> Result<ApiReactionCounts, ClientError> {
        let segment = match kind {
            ReactionKind::Like => "like",
            ReactionKind::Dislike => "dislike",
        };
        decode(
            self.client
                .put(self.url(&format!("reviews/{segment}/{id}")))
                .json(&UserIdRequest {
                    user_id: Some(user_id),
                })
                .send()
                .await?,
        )
        .await
    }

    /// Route between two points through the server's provider.
    pub async fn route(&self, request: &RouteRequest) -> Result<RouteResponse, ClientError> {
        let query = [
            ("start_lat", request.start.latitude.to_string()),
            ("start_lng", request.start.longitude.to_string()),
            ("end_lat", request.end.latitude.to_string()),
            ("end_lng", request.end.longitude.to_string()),
            ("profile", request.profile.to_string()),
        ];
        decode(
            self.client
                .get(self.url("maps/route"))
                .query(&query)
                .send()
                .await?,
        )
        .await
    }

    /// Area reachable from a point within the request's time limit.
    pub async fn isochrone(
        &self,
        request: &IsochroneRequest,
    ) -> Result<IsochroneResponse, ClientError> {
        let query = [
            ("lat", request.center.latitude.to_string()),
            ("lng", request.center.longitude.to_string()),
            ("time_limit", request.time_limit_secs.to_string()),
            ("profile", request.profile.to_string()),
        ];
        decode(
            self.client
                .get(self.url("maps/isochrone"))
                .query(&query)
                .send()
                .await?,
        )
        .await
    }
}

/// Deserializes a success body, or turns an error body into
/// [`ClientError::Api`].
async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await?);
    }

    let body = resp.text().await?;
    let (message, error) = match serde_json::from_str::<ApiMessage>(&body) {
        Ok(msg) => (msg.msg, msg.error),
        Err(_) => (format!("HTTP {status}"), None),
    };
    log::debug!("API error {status}: {message}");

    Err(ClientError::Api {
        status: status.as_u16(),
        message,
        error,
    })
}

#[async_trait::async_trait]
impl MapDataSource for ApiClient {
    async fn route(&self, request: &RouteRequest) -> Result<RouteResponse, ClientError> {
        Self::route(self, request).await
    }

    async fn isochrone(
        &self,
        request: &IsochroneRequest,
    ) -> Result<IsochroneResponse, ClientError> {
        Self::isochrone(self, request).await
    }

    async fn nearby(
        &self,
        center: GeoPoint,
        max_distance_m: f64,
    ) -> Result<Vec<ApiNearbyReview>, ClientError> {
        self.nearby_reviews(center, Some(max_distance_m)).await
    }
}
