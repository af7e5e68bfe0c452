#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the safe route server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the store's entity types to allow independent evolution of the API
//! contract. Request bodies keep every field optional so that a missing
//! field is reported as a validation failure rather than a deserialization
//! error.

use chrono::{DateTime, Utc};
use safe_route_database_models::{
    EmergencyContact, NearbyReview, ReactionCounts, Review, SafetyTier, User,
};
use safe_route_geo::{GeoError, GeoPoint};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
}

/// Error and status message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMessage {
    /// Human readable message.
    pub msg: String,
    /// Upstream provider error body, when one was received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}

/// `GeoJSON` point as stored on reviews.
///
/// `coordinates` is `[longitude, latitude]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ApiLocation {
    /// Always `"Point"`.
    #[serde(rename = "type")]
    pub kind: ApiGeometryType,
    /// `[longitude, latitude]`.
    pub coordinates: [f64; 2],
}

/// `GeoJSON` geometry type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiGeometryType {
    /// A single position.
    Point,
}

impl From<GeoPoint> for ApiLocation {
    fn from(point: GeoPoint) -> Self {
        Self {
            kind: ApiGeometryType::Point,
            coordinates: point.to_lng_lat(),
        }
    }
}

impl TryFrom<ApiLocation> for GeoPoint {
    type Error = GeoError;

    fn try_from(location: ApiLocation) -> Result<Self, Self::Error> {
        Self::from_lng_lat(location.coordinates)
    }
}

/// A review as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiReview {
    /// Review id.
    pub id: i64,
    /// Owning user id.
    pub user_id: i64,
    /// Display name of the owner.
    pub author_name: Option<String>,
    /// Location label.
    pub route_name: String,
    /// Review body.
    pub content: String,
    /// Star rating, 1-5.
    pub rating: u8,
    /// Tier derived from the rating.
    pub safety_tier: SafetyTier,
    /// Where the review applies.
    pub location: ApiLocation,
    /// Number of likes.
    pub likes: u32,
    /// Number of dislikes.
    pub dislikes: u32,
    /// Users who liked the review.
    pub liked_by: Vec<i64>,
    /// Users who disliked the review.
    pub disliked_by: Vec<i64>,
    /// Creation time (ISO 8601).
    pub created_at: DateTime<Utc>,
}

impl From<Review> for ApiReview {
    fn from(review: Review) -> Self {
        let counts = review.counts();
        Self {
            id: review.id,
            user_id: review.user_id,
            author_name: review.author_name,
            route_name: review.route_name,
            content: review.content,
            rating: review.rating.value(),
            safety_tier: review.rating.tier(),
            location: review.location.into(),
            likes: counts.likes,
            dislikes: counts.dislikes,
            liked_by: review.reactions.liked_by().iter().copied().collect(),
            disliked_by: review.reactions.disliked_by().iter().copied().collect(),
            created_at: review.created_at,
        }
    }
}

impl ApiReview {
    /// Review location as a point.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the coordinates are out of range.
    pub fn point(&self) -> Result<GeoPoint, GeoError> {
        GeoPoint::try_from(self.location)
    }
}

/// A nearby query result: the review plus its distance from the centre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiNearbyReview {
    /// The review.
    #[serde(flatten)]
    pub review: ApiReview,
    /// Great-circle distance to the query centre, in metres.
    pub distance_meters: f64,
}

impl From<NearbyReview> for ApiNearbyReview {
    fn from(nearby: NearbyReview) -> Self {
        Self {
            review: nearby.review.into(),
            distance_meters: nearby.distance_meters,
        }
    }
}

/// Like/dislike totals after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiReactionCounts {
    /// Number of likes.
    pub likes: u32,
    /// Number of dislikes.
    pub dislikes: u32,
}

impl From<ReactionCounts> for ApiReactionCounts {
    fn from(counts: ReactionCounts) -> Self {
        Self {
            likes: counts.likes,
            dislikes: counts.dislikes,
        }
    }
}

/// A user as returned by the API. Never carries credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUser {
    /// User id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: String,
    /// Contacts alerted on SOS.
    pub emergency_contacts: Vec<EmergencyContact>,
    /// Registration time (ISO 8601).
    pub created_at: DateTime<Utc>,
}

impl From<User> for ApiUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            emergency_contacts: user.emergency_contacts,
            created_at: user.created_at,
        }
    }
}

/// Registration and login response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// Always `true` on success.
    pub success: bool,
    /// The user's id.
    pub user_id: i64,
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: String,
}

impl From<User> for AuthResponse {
    fn from(user: User) -> Self {
        Self {
            success: true,
            user_id: user.id,
            name: user.name,
            email: user.email,
        }
    }
}

/// SOS response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SosResponse {
    /// Always `true` on success.
    pub success: bool,
    /// Status message.
    pub msg: String,
    /// Number of contacts alerted.
    pub contacts_notified: usize,
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// `POST /api/users/register` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Display name.
    pub name: Option<String>,
    /// Login email.
    pub email: Option<String>,
    /// Plain-text password.
    pub password: Option<String>,
}

/// `POST /api/users/login` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Login email.
    pub email: Option<String>,
    /// Plain-text password.
    pub password: Option<String>,
}

/// `PUT /api/users/{id}` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateRequest {
    /// New display name.
    pub name: Option<String>,
    /// New login email.
    pub email: Option<String>,
}

/// `PUT /api/users/{id}/emergency-contacts` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContactsRequest {
    /// The full replacement list.
    #[serde(default)]
    pub emergency_contacts: Vec<EmergencyContact>,
}

/// `POST /api/users/{id}/sos` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SosRequest {
    /// Where the user is.
    pub location: Option<GeoPoint>,
}

/// `POST /api/reviews` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    /// Author.
    pub user_id: Option<i64>,
    /// Location label.
    pub route_name: Option<String>,
    /// Review body.
    pub content: Option<String>,
    /// Star rating, 1-5.
    pub rating: Option<i64>,
    /// Where the review applies.
    pub location: Option<GeoPoint>,
}

/// `PUT /api/reviews/{id}` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReviewRequest {
    /// Caller, who must own the review.
    pub user_id: Option<i64>,
    /// New location label.
    pub route_name: Option<String>,
    /// New body.
    pub content: Option<String>,
    /// New star rating.
    pub rating: Option<i64>,
}

/// Body carrying only the caller id (delete, like, dislike).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdRequest {
    /// Caller.
    pub user_id: Option<i64>,
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// Query parameters for `GET /api/reviews/near`.
///
/// Kept as strings so malformed numbers surface as validation errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyQueryParams {
    /// Centre longitude.
    pub lng: Option<String>,
    /// Centre latitude.
    pub lat: Option<String>,
    /// Radius in metres.
    pub max_distance: Option<String>,
}

/// Query parameters for `GET /api/maps/route`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteQueryParams {
    /// Start latitude.
    pub start_lat: Option<String>,
    /// Start longitude.
    pub start_lng: Option<String>,
    /// End latitude.
    pub end_lat: Option<String>,
    /// End longitude.
    pub end_lng: Option<String>,
    /// Travel profile (`foot`, `bike`, `car`).
    pub profile: Option<String>,
}

/// Query parameters for `GET /api/maps/isochrone`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IsochroneQueryParams {
    /// Centre latitude.
    pub lat: Option<String>,
    /// Centre longitude.
    pub lng: Option<String>,
    /// Travel time budget in seconds.
    pub time_limit: Option<String>,
    /// Travel profile (`foot`, `bike`, `car`).
    pub profile: Option<String>,
}
