#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Stored entity types for the safe route document store.
//!
//! Reviews and users are modelled here independently of the storage
//! backend. Validation that only depends on the values themselves (rating
//! range, blank fields, nearby radius bounds) lives on these types so the
//! store and the HTTP layer reject the same inputs.

pub mod reactions;

use chrono::{DateTime, Utc};
use safe_route_geo::GeoPoint;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use reactions::{ReactionConflictError, ReactionCounts, ReactionKind, Reactions};

/// Radius used by the nearby query when the caller gives none, in metres.
pub const DEFAULT_NEARBY_DISTANCE_M: f64 = 5_000.0;

/// Default upper bound on the nearby radius, in metres.
pub const MAX_NEARBY_DISTANCE_M: f64 = 50_000.0;

/// A star rating from 1 (avoid) to 5 (safe).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    /// Creates a rating, rejecting values outside 1-5.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRatingError`] if `value` is not in `1..=5`.
    pub fn new(value: u8) -> Result<Self, InvalidRatingError> {
        match value {
            1..=5 => Ok(Self(value)),
            _ => Err(InvalidRatingError {
                value: i64::from(value),
            }),
        }
    }

    /// Creates a rating from a wider integer, as read from storage or JSON.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRatingError`] if `value` is not in `1..=5`.
    pub fn from_i64(value: i64) -> Result<Self, InvalidRatingError> {
        u8::try_from(value)
            .map_err(|_| InvalidRatingError { value })
            .and_then(Self::new)
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// The safety tier this rating falls into.
    #[must_use]
    pub const fn tier(self) -> SafetyTier {
        SafetyTier::from_rating(self)
    }
}

impl TryFrom<u8> for Rating {
    type Error = InvalidRatingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(value: Rating) -> Self {
        value.0
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when a rating is outside 1-5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidRatingError {
    /// The rejected value.
    pub value: i64,
}

impl std::fmt::Display for InvalidRatingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid rating {}: expected 1-5", self.value)
    }
}

impl std::error::Error for InvalidRatingError {}

/// Coarse safety classification derived from a rating.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SafetyTier {
    /// Rated 5.
    Safe,
    /// Rated 3 or 4.
    Caution,
    /// Rated 1 or 2.
    Avoid,
}

impl SafetyTier {
    /// Maps a rating to its tier.
    #[must_use]
    pub const fn from_rating(rating: Rating) -> Self {
        match rating.value() {
            5 => Self::Safe,
            3 | 4 => Self::Caution,
            _ => Self::Avoid,
        }
    }

    /// Marker colour used for this tier on the map.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Safe => "#10B981",
            Self::Caution => "#F59E0B",
            Self::Avoid => "#EF4444",
        }
    }
}

/// A request field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidFieldError {
    /// API name of the field.
    pub field: &'static str,
    /// What is wrong with it.
    pub reason: String,
}

impl InvalidFieldError {
    /// Creates a new error for `field`.
    #[must_use]
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for InvalidFieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.field, self.reason)
    }
}

impl std::error::Error for InvalidFieldError {}

fn require_text(field: &'static str, value: &str) -> Result<(), InvalidFieldError> {
    if value.trim().is_empty() {
        Err(InvalidFieldError::new(field, "is required"))
    } else {
        Ok(())
    }
}

fn require_email(field: &'static str, value: &str) -> Result<(), InvalidFieldError> {
    require_text(field, value)?;
    let value = value.trim();
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(InvalidFieldError::new(field, "is not an email address")),
    }
}

/// A safety review anchored at a geographic point.
#[derive(Debug, Clone, PartialEq)]
pub struct Review {
    /// Review id.
    pub id: i64,
    /// Owning user.
    pub user_id: i64,
    /// Display name of the owner, when the owner still exists.
    pub author_name: Option<String>,
    /// Free-text location label.
    pub route_name: String,
    /// Review body.
    pub content: String,
    /// Star rating.
    pub rating: Rating,
    /// Where the review applies.
    pub location: GeoPoint,
    /// Like/dislike membership.
    pub reactions: Reactions,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Review {
    /// Current like and dislike totals.
    #[must_use]
    pub fn counts(&self) -> ReactionCounts {
        self.reactions.counts()
    }

    /// Safety tier of the review's rating.
    #[must_use]
    pub const fn safety_tier(&self) -> SafetyTier {
        self.rating.tier()
    }

    /// Whether `user_id` owns this review.
    #[must_use]
    pub const fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }
}

/// Fields required to create a review.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    /// Owning user.
    pub user_id: i64,
    /// Free-text location label.
    pub route_name: String,
    /// Review body.
    pub content: String,
    /// Star rating.
    pub rating: Rating,
    /// Where the review applies.
    pub location: GeoPoint,
}

impl NewReview {
    /// Checks that the text fields are not blank and the location is a
    /// real coordinate. `location` has public fields, so a struct literal
    /// can bypass [`GeoPoint::new`].
    ///
    /// # Errors
    ///
    /// Returns [`InvalidFieldError`] naming the first invalid field.
    pub fn validate(&self) -> Result<(), InvalidFieldError> {
        require_text("routeName", &self.route_name)?;
        require_text("content", &self.content)?;
        GeoPoint::new(self.location.latitude, self.location.longitude)
            .map(|_| ())
            .map_err(|e| InvalidFieldError::new("location", e.to_string()))
    }
}

/// Writable review fields. `None` leaves the stored value unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewUpdate {
    /// New location label.
    pub route_name: Option<String>,
    /// New body.
    pub content: Option<String>,
    /// New rating.
    pub rating: Option<Rating>,
}

impl ReviewUpdate {
    /// Checks that provided text fields are not blank.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidFieldError`] naming the first blank field.
    pub fn validate(&self) -> Result<(), InvalidFieldError> {
        if let Some(route_name) = &self.route_name {
            require_text("routeName", route_name)?;
        }
        if let Some(content) = &self.content {
            require_text("content", content)?;
        }
        Ok(())
    }
}

/// Parameters of a nearby-reviews query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyQuery {
    /// Query centre.
    pub center: GeoPoint,
    /// Inclusive search radius in metres.
    pub max_distance_m: f64,
}

impl NearbyQuery {
    /// Builds a query, applying the default radius and rejecting radii that
    /// are negative, non-finite or above `cap_m`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidFieldError`] for `maxDistance` when out of bounds.
    pub fn new(
        center: GeoPoint,
        max_distance_m: Option<f64>,
        cap_m: f64,
    ) -> Result<Self, InvalidFieldError> {
        let max_distance_m = max_distance_m.unwrap_or(DEFAULT_NEARBY_DISTANCE_M);

        if !max_distance_m.is_finite() || max_distance_m < 0.0 {
            return Err(InvalidFieldError::new(
                "maxDistance",
                "must be a non-negative number of metres",
            ));
        }
        if max_distance_m > cap_m {
            return Err(InvalidFieldError::new(
                "maxDistance",
                format!("must not exceed {cap_m} metres"),
            ));
        }

        Ok(Self {
            center,
            max_distance_m,
        })
    }
}

/// A review returned by the nearby query with its distance to the centre.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyReview {
    /// The review.
    pub review: Review,
    /// Great-circle distance to the query centre, in metres.
    pub distance_meters: f64,
}

/// Someone to alert when the user triggers an SOS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    /// Contact name.
    pub name: String,
    /// Phone number, free form.
    #[serde(default)]
    pub phone: String,
    /// Address alerts are sent to.
    pub email: String,
    /// Relation to the user ("sister", "friend", ...).
    #[serde(default)]
    pub relation: String,
}

impl EmergencyContact {
    /// Checks that the contact can receive an alert.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidFieldError`] if the name is blank or the email is
    /// not an address.
    pub fn validate(&self) -> Result<(), InvalidFieldError> {
        require_text("name", &self.name)?;
        require_email("email", &self.email)
    }
}

/// A registered user, without credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// User id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Login email, unique across users.
    pub email: String,
    /// Contacts alerted on SOS, in the order the user listed them.
    pub emergency_contacts: Vec<EmergencyContact>,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

/// Fields required to register a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: String,
    /// Plain-text password, hashed before storage.
    pub password: String,
}

impl NewUser {
    /// Checks that every field is present and the email is an address.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidFieldError`] naming the first invalid field.
    pub fn validate(&self) -> Result<(), InvalidFieldError> {
        require_text("name", &self.name)?;
        require_email("email", &self.email)?;
        if self.password.is_empty() {
            return Err(InvalidFieldError::new("password", "is required"));
        }
        Ok(())
    }
}

/// Profile fields a user may change. `None` leaves the value unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    /// New display name.
    pub name: Option<String>,
    /// New login email.
    pub email: Option<String>,
}

impl ProfileUpdate {
    /// Checks the provided fields.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidFieldError`] naming the first invalid field.
    pub fn validate(&self) -> Result<(), InvalidFieldError> {
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        if let Some(email) = &self.email {
            require_email("email", email)?;
        }
        Ok(())
    }
}

/// Normalizes an email for storage and lookup.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
