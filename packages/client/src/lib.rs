#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![warn(missing_docs)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Client-side state for the safe route map.
//!
//! [`api::ApiClient`] talks to the REST server. [`overlay::OverlayController`]
//! keeps exactly one route or isochrone overlay on a [`overlay::MapSurface`],
//! tearing the previous one down before installing the next.
//! [`reactions::ReactionView`] applies like/dislike toggles optimistically
//! and reconciles them with the server, [`session::Session`] carries the
//! signed-in user and current location, and [`filter`] narrows review lists
//! for display.

pub mod api;
pub mod filter;
pub mod overlay;
pub mod reactions;
pub mod session;

use safe_route_geo::GeoError;
use thiserror::Error;

/// Errors from client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request could not be sent or the response could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an error status.
    #[error("Server returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// The server's `msg`.
        message: String,
        /// Upstream error body forwarded by the server.
        error: Option<serde_json::Value>,
    },

    /// A geometry in a response could not be decoded.
    #[error(transparent)]
    Geometry(#[from] GeoError),

    /// The provider found no path between the points.
    #[error("No route found")]
    NoRoute,

    /// The provider returned no reachable area.
    #[error("No isochrone polygon returned")]
    NoIsochrone,

    /// The operation needs a signed-in user.
    #[error("Not logged in")]
    NotLoggedIn,
}
