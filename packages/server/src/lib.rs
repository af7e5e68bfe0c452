#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the safe route application.
//!
//! Serves the REST API for safety reviews, users and SOS alerts from a
//! `SQLite` document store with an R-tree location index, and proxies route
//! and isochrone lookups to the configured routing provider.

pub mod config;
pub mod error;
mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use safe_route_alert::{AlertError, EmailSender, http::HttpEmailSender};
use safe_route_database::DbError;
use safe_route_routing::graphhopper::GraphHopperClient;
use safe_route_routing::{IsochroneConfig, RoutingError, RoutingProvider, config as routing_config};
use switchy_database::Database;
use thiserror::Error;

pub use config::ServerConfig;
pub use error::ApiError;

/// Shared application state.
pub struct AppState {
    /// Document store.
    pub db: Arc<dyn Database>,
    /// Route and isochrone provider.
    pub routing: Arc<dyn RoutingProvider>,
    /// Bounds applied to isochrone requests.
    pub isochrone_limits: IsochroneConfig,
    /// SOS email delivery. `None` when no provider is configured.
    pub alerts: Option<Arc<dyn EmailSender>>,
    /// Largest accepted nearby radius, in metres.
    pub max_nearby_distance_m: f64,
}

/// Errors that prevent the server from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The document store could not be opened.
    #[error(transparent)]
    Database(#[from] DbError),

    /// The routing provider could not be configured.
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// The email provider could not be configured.
    #[error(transparent)]
    Alert(#[from] AlertError),
}

/// Opens the store and builds the provider clients described by `config`.
///
/// # Errors
///
/// Returns [`StartupError`] if the store cannot be opened or a provider
/// client cannot be built.
pub async fn build_state(config: &ServerConfig) -> Result<AppState, StartupError> {
    log::info!("Opening document store...");
    let db = safe_route_database::open_db(&config.database_path).await?;

    let service = routing_config::graphhopper_service()?;
    let isochrone_limits = service.isochrone;
    let routing = GraphHopperClient::from_service(
        &service,
        config.routing_api_key.clone(),
        config.routing_base_url.as_deref(),
        config.routing_timeout,
    )?;

    let alerts: Option<Arc<dyn EmailSender>> = match &config.email {
        Some(email) => Some(Arc::new(HttpEmailSender::new(
            &email.api_url,
            &email.api_key,
            &email.from,
        )?)),
        None => {
            log::warn!("No email provider configured; SOS alerts will fail");
            None
        }
    };

    Ok(AppState {
        db: Arc::from(db),
        routing: Arc::new(routing),
        isochrone_limits,
        alerts,
        max_nearby_distance_m: config.max_nearby_distance_m,
    })
}

/// Registers the `/api` routes and the JSON/query error handlers.
///
/// `/reviews/near` is registered before `/reviews/{id}` so the literal
/// segment wins.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::Validation(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::Validation(err.to_string()).into()),
    )
    .service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/users/register", web::post().to(handlers::users::register))
            .route("/users/login", web::post().to(handlers::users::login))
            .route("/users/{id}", web::get().to(handlers::users::get))
            .route("/users/{id}", web::put().to(handlers::users::update_profile))
            .route(
                "/users/{id}/emergency-contacts",
                web::put().to(handlers::users::replace_emergency_contacts),
            )
            .route("/users/{id}/sos", web::post().to(handlers::users::sos))
            .route("/reviews", web::get().to(handlers::reviews::list))
            .route("/reviews", web::post().to(handlers::reviews::create))
            .route("/reviews/near", web::get().to(handlers::reviews::near))
            .route("/reviews/like/{id}", web::put().to(handlers::reviews::like))
            .route(
                "/reviews/dislike/{id}",
                web::put().to(handlers::reviews::dislike),
            )
            .route("/reviews/{id}", web::get().to(handlers::reviews::get))
            .route("/reviews/{id}", web::put().to(handlers::reviews::update))
            .route("/reviews/{id}", web::delete().to(handlers::reviews::delete))
            .route("/maps/route", web::get().to(handlers::maps::route))
            .route("/maps/isochrone", web::get().to(handlers::maps::isochrone)),
    );
}

/// Starts the safe route API server.
///
/// This is a regular async function; the caller is responsible for
/// providing the async runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if startup fails, the HTTP server
/// fails to bind, or it encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server(config: ServerConfig) -> std::io::Result<()> {
    let state = web::Data::new(build_state(&config).await.map_err(std::io::Error::other)?);

    log::info!("Starting server on {}:{}", config.bind_addr, config.port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await
}
