//! API error taxonomy and its JSON rendering.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use safe_route_alert::AlertError;
use safe_route_database::DbError;
use safe_route_routing::RoutingError;
use safe_route_server_models::ApiMessage;
use thiserror::Error;

/// Errors returned by handlers. Every variant renders as
/// `{"msg": ..., "error"?: ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed input (400).
    #[error("{0}")]
    Validation(String),

    /// The caller may not change the resource (401).
    #[error("{0}")]
    Authorization(String),

    /// The addressed resource does not exist (404).
    #[error("{0}")]
    NotFound(String),

    /// An external provider failed (500). `detail` is the provider's error
    /// body, or a description when there was none.
    #[error("{message}")]
    Upstream {
        /// Message shown to the caller.
        message: String,
        /// Provider error body.
        detail: serde_json::Value,
    },

    /// Anything else (500).
    #[error("{0}")]
    Server(String),
}

impl ApiError {
    /// Wraps a routing failure, using `failure` as the message for provider
    /// errors.
    pub fn routing(error: RoutingError, failure: &str) -> Self {
        match error {
            RoutingError::Validation { message } => Self::Validation(message),
            RoutingError::Upstream {
                message, payload, ..
            } => {
                log::error!("{failure}: {message}");
                Self::Upstream {
                    message: failure.to_string(),
                    detail: payload.unwrap_or(serde_json::Value::String(message)),
                }
            }
            RoutingError::Config { message } => {
                log::error!("{failure}: {message}");
                Self::Server("Server error".to_string())
            }
        }
    }

    /// Wraps a store failure from a review update or delete, naming the
    /// action in the ownership error.
    pub fn review_write(error: DbError, action: &str) -> Self {
        match error {
            DbError::NotOwner { .. } => {
                Self::Authorization(format!("Not authorized to {action} this review"))
            }
            other => other.into(),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(error: DbError) -> Self {
        match error {
            DbError::Validation(message) | DbError::Conflict(message) => Self::Validation(message),
            DbError::NotFound { entity, .. } => Self::NotFound(match entity {
                "review" => "Review not found".to_string(),
                "user" => "User not found".to_string(),
                other => format!("{other} not found"),
            }),
            DbError::NotOwner { .. } => {
                Self::Authorization("Not authorized to modify this review".to_string())
            }
            other => {
                log::error!("Store error: {other}");
                Self::Server("Server error".to_string())
            }
        }
    }
}

impl From<AlertError> for ApiError {
    fn from(error: AlertError) -> Self {
        match error {
            AlertError::NoContacts => Self::Validation(error.to_string()),
            other => {
                log::error!("SOS delivery failed: {other}");
                Self::Upstream {
                    message: "Failed to send SOS alerts".to_string(),
                    detail: serde_json::Value::String(other.to_string()),
                }
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Authorization(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream { .. } | Self::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = match self {
            Self::Upstream { detail, .. } => Some(detail.clone()),
            _ => None,
        };
        HttpResponse::build(self.status_code()).json(ApiMessage {
            msg: self.to_string(),
            error,
        })
    }
}

#[cfg(test)]
mod tests {
    use actix_web::body::to_bytes;
    use serde_json::json;

    use super::*;

    async fn body_of(error: &ApiError) -> serde_json::Value {
        let bytes = to_bytes(error.error_response().into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[actix_web::test]
    async fn statuses_follow_the_taxonomy() {
        assert_eq!(
            ApiError::Validation(String::new()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Authorization(String::new()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::NotFound(String::new()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Server(String::new()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[actix_web::test]
    async fn upstream_body_carries_provider_payload() {
        let error = ApiError::routing(
            RoutingError::Upstream {
                status: Some(400),
                message: "HTTP 400".to_string(),
                payload: Some(json!({ "message": "Cannot find point" })),
            },
            "Failed to get route information",
        );
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_of(&error).await,
            json!({
                "msg": "Failed to get route information",
                "error": { "message": "Cannot find point" }
            })
        );
    }

    #[actix_web::test]
    async fn upstream_without_payload_uses_message() {
        let error = ApiError::routing(
            RoutingError::Upstream {
                status: None,
                message: "request timed out".to_string(),
                payload: None,
            },
            "Failed to get isochrone information",
        );
        assert_eq!(body_of(&error).await["error"], "request timed out");
    }

    #[actix_web::test]
    async fn store_errors_map_to_messages() {
        let not_found = ApiError::from(DbError::NotFound {
            entity: "review",
            id: 4,
        });
        assert_eq!(body_of(&not_found).await, json!({ "msg": "Review not found" }));

        let not_owner = ApiError::review_write(
            DbError::NotOwner {
                review_id: 4,
                user_id: 9,
            },
            "delete",
        );
        assert_eq!(not_owner.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(not_owner.to_string(), "Not authorized to delete this review");

        let io = ApiError::from(DbError::Open("locked".to_string()));
        assert_eq!(body_of(&io).await, json!({ "msg": "Server error" }));
    }
}
