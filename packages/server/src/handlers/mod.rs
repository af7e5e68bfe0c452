//! HTTP handler functions for the safe route API.

pub mod maps;
pub mod reviews;
pub mod users;

use actix_web::HttpResponse;
use safe_route_server_models::ApiHealth;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
