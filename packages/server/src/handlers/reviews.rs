//! Review CRUD, reaction and nearby handlers.

use actix_web::{HttpResponse, web};
use safe_route_database::{DbError, reviews};
use safe_route_database_models::{NearbyQuery, NewReview, Rating, ReviewUpdate};
use safe_route_geo::GeoPoint;
use safe_route_server_models::{
    ApiMessage, ApiNearbyReview, ApiReactionCounts, ApiReview, CreateReviewRequest,
    NearbyQueryParams, UpdateReviewRequest, UserIdRequest,
};

use crate::{ApiError, AppState};

fn rating(value: i64) -> Result<Rating, ApiError> {
    Rating::from_i64(value).map_err(|e| ApiError::Validation(e.to_string()))
}

fn caller(user_id: Option<i64>) -> Result<i64, ApiError> {
    user_id.ok_or_else(|| ApiError::Validation("userId is required".to_string()))
}

fn number(name: &str, value: &str) -> Result<f64, ApiError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ApiError::Validation(format!("{name} is not a number: {value:?}")))
}

/// `GET /api/reviews`
///
/// Every review, newest first.
pub async fn list(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let reviews: Vec<ApiReview> = reviews::list_reviews(state.db.as_ref())
        .await?
        .into_iter()
        .map(ApiReview::from)
        .collect();

    Ok(HttpResponse::Ok().json(reviews))
}

/// `GET /api/reviews/near?lng=&lat=&maxDistance=`
///
/// Reviews within `maxDistance` metres (default 5000), nearest first.
pub async fn near(
    state: web::Data<AppState>,
    params: web::Query<NearbyQueryParams>,
) -> Result<HttpResponse, ApiError> {
    let (Some(lng), Some(lat)) = (params.lng.as_deref(), params.lat.as_deref()) else {
        return Err(ApiError::Validation(
            "Location coordinates required".to_string(),
        ));
    };

    let center = GeoPoint::new(number("lat", lat)?, number("lng", lng)?)
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    let max_distance = params
        .max_distance
        .as_deref()
        .map(|v| number("maxDistance", v))
        .transpose()?;

    let query = NearbyQuery::new(center, max_distance, state.max_nearby_distance_m)
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let results: Vec<ApiNearbyReview> = reviews::find_near(state.db.as_ref(), &query)
        .await?
        .into_iter()
        .map(ApiNearbyReview::from)
        .collect();

    Ok(HttpResponse::Ok().json(results))
}

/// `GET /api/reviews/{id}`
pub async fn get(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let review = reviews::get_review(state.db.as_ref(), path.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("Review not found".to_string()))?;

    Ok(HttpResponse::Ok().json(ApiReview::from(review)))
}

/// `POST /api/reviews`
pub async fn create(
    state: web::Data<AppState>,
    body: web::Json<CreateReviewRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let (Some(user_id), Some(route_name), Some(content), Some(raw_rating), Some(location)) = (
        body.user_id,
        body.route_name,
        body.content,
        body.rating,
        body.location,
    ) else {
        return Err(ApiError::Validation("All fields are required".to_string()));
    };

    let review = reviews::create_review(
        state.db.as_ref(),
        &NewReview {
            user_id,
            route_name,
            content,
            rating: rating(raw_rating)?,
            location,
        },
    )
    .await?;

    Ok(HttpResponse::Created().json(ApiReview::from(review)))
}

/// `PUT /api/reviews/{id}`
///
/// Only the owner may edit. Absent fields are left unchanged.
pub async fn update(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<UpdateReviewRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let user_id = caller(body.user_id)?;
    let update = ReviewUpdate {
        route_name: body.route_name,
        content: body.content,
        rating: body.rating.map(rating).transpose()?,
    };

    let review = reviews::update_review(state.db.as_ref(), path.into_inner(), user_id, &update)
        .await
        .map_err(|e| ApiError::review_write(e, "update"))?;

    Ok(HttpResponse::Ok().json(ApiReview::from(review)))
}

/// `DELETE /api/reviews/{id}`
pub async fn delete(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<UserIdRequest>,
) -> Result<HttpResponse, ApiError> {
    let user_id = caller(body.user_id)?;

    reviews::delete_review(state.db.as_ref(), path.into_inner(), user_id)
        .await
        .map_err(|e| ApiError::review_write(e, "delete"))?;

    Ok(HttpResponse::Ok().json(ApiMessage {
        msg: "Review removed".to_string(),
        error: None,
    }))
}

fn reaction_error(error: DbError) -> ApiError {
    match error {
        DbError::Conflict(message) => {
            log::error!("Reaction toggle gave up: {message}");
            ApiError::Server("Server error".to_string())
        }
        other => other.into(),
    }
}

/// `PUT /api/reviews/like/{id}`
///
/// Toggles the caller's like and returns the new totals.
pub async fn like(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<UserIdRequest>,
) -> Result<HttpResponse, ApiError> {
    let user_id = caller(body.user_id)?;
    let counts = reviews::toggle_like(state.db.as_ref(), path.into_inner(), user_id)
        .await
        .map_err(reaction_error)?;

    Ok(HttpResponse::Ok().json(ApiReactionCounts::from(counts)))
}

/// `PUT /api/reviews/dislike/{id}`
pub async fn dislike(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<UserIdRequest>,
) -> Result<HttpResponse, ApiError> {
    let user_id = caller(body.user_id)?;
    let counts = reviews::toggle_dislike(state.db.as_ref(), path.into_inner(), user_id)
        .await
        .map_err(reaction_error)?;

    Ok(HttpResponse::Ok().json(ApiReactionCounts::from(counts)))
}
