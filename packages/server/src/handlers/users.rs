//! User registration, profile, emergency contact and SOS handlers.

use actix_web::{HttpResponse, web};
use safe_route_database::users;
use safe_route_database_models::{NewUser, ProfileUpdate};
use safe_route_server_models::{
    ApiUser, AuthResponse, EmergencyContactsRequest, LoginRequest, ProfileUpdateRequest,
    RegisterRequest, SosRequest, SosResponse,
};

use crate::{ApiError, AppState};

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// `POST /api/users/register`
pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let (Some(name), Some(email), Some(password)) = (
        present(body.name.as_deref()),
        present(body.email.as_deref()),
        body.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::Validation("All fields are required".to_string()));
    };

    let user = users::register_user(
        state.db.as_ref(),
        &NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        },
    )
    .await?;

    Ok(HttpResponse::Created().json(AuthResponse::from(user)))
}

/// `POST /api/users/login`
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let invalid = || ApiError::Validation("Invalid credentials".to_string());

    let (Some(email), Some(password)) = (present(body.email.as_deref()), body.password.as_deref())
    else {
        return Err(invalid());
    };

    let user = users::authenticate(state.db.as_ref(), email, password)
        .await?
        .ok_or_else(invalid)?;

    Ok(HttpResponse::Ok().json(AuthResponse::from(user)))
}

/// `GET /api/users/{id}`
pub async fn get(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let user = users::get_user(state.db.as_ref(), path.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(HttpResponse::Ok().json(ApiUser::from(user)))
}

/// `PUT /api/users/{id}`
pub async fn update_profile(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<ProfileUpdateRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let user = users::update_profile(
        state.db.as_ref(),
        path.into_inner(),
        &ProfileUpdate {
            name: body.name,
            email: body.email,
        },
    )
    .await?;

    Ok(HttpResponse::Ok().json(ApiUser::from(user)))
}

/// `PUT /api/users/{id}/emergency-contacts`
pub async fn replace_emergency_contacts(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<EmergencyContactsRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = users::replace_emergency_contacts(
        state.db.as_ref(),
        path.into_inner(),
        &body.emergency_contacts,
    )
    .await?;

    Ok(HttpResponse::Ok().json(ApiUser::from(user)))
}

/// `POST /api/users/{id}/sos`
///
/// Emails every emergency contact a map link to the given location.
pub async fn sos(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<SosRequest>,
) -> Result<HttpResponse, ApiError> {
    let location = body
        .location
        .ok_or_else(|| ApiError::Validation("Location coordinates required".to_string()))?;

    let user = users::get_user(state.db.as_ref(), path.into_inner())
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if user.emergency_contacts.is_empty() {
        return Err(safe_route_alert::AlertError::NoContacts.into());
    }

    let Some(sender) = &state.alerts else {
        return Err(safe_route_alert::AlertError::NotConfigured {
            message: "no email provider".to_string(),
        }
        .into());
    };

    let notified = safe_route_alert::send_sos(
        sender.as_ref(),
        &user.name,
        location,
        &user.emergency_contacts,
    )
    .await?;

    Ok(HttpResponse::Ok().json(SosResponse {
        success: true,
        msg: "SOS alerts sent successfully".to_string(),
        contacts_notified: notified,
    }))
}
