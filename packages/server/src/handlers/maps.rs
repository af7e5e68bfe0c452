//! Route and isochrone pass-through handlers.

use actix_web::{HttpResponse, web};
use safe_route_routing::{IsochroneRequest, RouteRequest};
use safe_route_server_models::{IsochroneQueryParams, RouteQueryParams};

use crate::{ApiError, AppState};

/// `GET /api/maps/route?start_lat=&start_lng=&end_lat=&end_lng=&profile=`
///
/// Returns the provider's route payload unchanged.
pub async fn route(
    state: web::Data<AppState>,
    params: web::Query<RouteQueryParams>,
) -> Result<HttpResponse, ApiError> {
    let request = RouteRequest::from_raw(
        params.start_lat.as_deref(),
        params.start_lng.as_deref(),
        params.end_lat.as_deref(),
        params.end_lng.as_deref(),
        params.profile.as_deref(),
    )
    .map_err(|e| ApiError::routing(e, "Failed to get route information"))?;

    let payload = state
        .routing
        .route(&request)
        .await
        .map_err(|e| ApiError::routing(e, "Failed to get route information"))?;

    Ok(HttpResponse::Ok().json(payload))
}

/// `GET /api/maps/isochrone?lat=&lng=&time_limit=&profile=`
///
/// Returns the provider's isochrone payload unchanged.
pub async fn isochrone(
    state: web::Data<AppState>,
    params: web::Query<IsochroneQueryParams>,
) -> Result<HttpResponse, ApiError> {
    let request = IsochroneRequest::from_raw(
        params.lat.as_deref(),
        params.lng.as_deref(),
        params.time_limit.as_deref(),
        params.profile.as_deref(),
        &state.isochrone_limits,
    )
    .map_err(|e| ApiError::routing(e, "Failed to get isochrone information"))?;

    let payload = state
        .routing
        .isochrone(&request)
        .await
        .map_err(|e| ApiError::routing(e, "Failed to get isochrone information"))?;

    Ok(HttpResponse::Ok().json(payload))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use actix_web::http::StatusCode;
    use actix_web::test;
    use serde_json::{Value, json};

    use crate::test_support::{FakeRouting, TestContext, test_app};

    #[actix_web::test]
    async fn route_passes_provider_payload_through() {
        let ctx = TestContext::new().await;
        let app = test_app!(ctx.state.clone());

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/maps/route?start_lat=40.7128&start_lng=-74.006&end_lat=40.758&end_lng=-73.9855&profile=bike")
                .to_request(),
        )
        .await;
        assert_eq!(body["paths"][0]["points"], "_p~iF~ps|U_ulLnnqC");
        assert_eq!(body["paths"][0]["profile"], "bike");
        assert_eq!(ctx.routing.route_calls.load(Ordering::SeqCst), 1);
    }

    #[actix_web::test]
    async fn route_missing_end_never_calls_provider() {
        let ctx = TestContext::new().await;
        let app = test_app!(ctx.state.clone());

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/maps/route?start_lat=40.7128&start_lng=-74.006")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["msg"], "Start and end coordinates are required");
        assert_eq!(ctx.routing.calls(), 0);
    }

    #[actix_web::test]
    async fn unknown_profile_is_rejected() {
        let ctx = TestContext::new().await;
        let app = test_app!(ctx.state.clone());

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/maps/route?start_lat=1&start_lng=2&end_lat=3&end_lng=4&profile=jetpack")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ctx.routing.calls(), 0);
    }

    #[actix_web::test]
    async fn provider_failure_is_upstream_error_with_body() {
        let ctx = TestContext::with_routing(FakeRouting::failing()).await;
        let app = test_app!(ctx.state.clone());

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/maps/route?start_lat=1&start_lng=2&end_lat=3&end_lng=4")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(
            body,
            json!({
                "msg": "Failed to get route information",
                "error": { "message": "Cannot find point 0" }
            })
        );
    }

    #[actix_web::test]
    async fn isochrone_uses_default_time_limit() {
        let ctx = TestContext::new().await;
        let app = test_app!(ctx.state.clone());

        let body: Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get()
                .uri("/api/maps/isochrone?lat=52.5&lng=13.4")
                .to_request(),
        )
        .await;
        assert_eq!(body["polygons"][0]["properties"]["timeLimit"], 600);
        assert_eq!(ctx.routing.isochrone_calls.load(Ordering::SeqCst), 1);
    }

    #[actix_web::test]
    async fn isochrone_failure_and_validation() {
        let ctx = TestContext::with_routing(FakeRouting::failing()).await;
        let app = test_app!(ctx.state.clone());

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/maps/isochrone?lng=13.4")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ctx.routing.calls(), 0);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/maps/isochrone?lat=52.5&lng=13.4&time_limit=300")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["msg"], "Failed to get isochrone information");
    }
}
