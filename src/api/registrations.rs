use actix_web::{web, HttpRequest, HttpResponse};

use crate::api::current_claims;
use crate::models::{EnrollRequest, EnrollmentResponse};
use crate::services::enrollment_service;
use crate::state::AppState;
use crate::utils::{AppError, Envelope};

#[utoipa::path(
    post,
    path = "/api/v1/registrations",
    tag = "Registrations",
    request_body = EnrollRequest,
    responses(
        (status = 201, description = "Enrollment created, payment pending", body = EnrollmentResponse),
        (status = 200, description = "Already registered; existing enrollment returned", body = EnrollmentResponse),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Event not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_registration(
    state: web::Data<AppState>,
    req: HttpRequest,
    request: web::Json<EnrollRequest>,
) -> Result<HttpResponse, AppError> {
    let claims = current_claims(&req)?;
    log::info!("📝 POST /registrations - {} -> event {}", claims.participant_id, request.event_id);

    let store = state.store.as_ref();
    let outcome = enrollment_service::enroll(store, &claims.user_object_id()?, &request).await?;
    let created = outcome.is_created();

    let mut responses = enrollment_service::hydrate(store, vec![outcome.into_enrollment()], false).await?;
    let response = responses
        .pop()
        .ok_or_else(|| AppError::DatabaseError("enrollment vanished after write".to_string()))?;

    if created {
        Ok(Envelope::ok(response).with_message("Registration submitted").into_created())
    } else {
        Ok(Envelope::ok(response).with_message("Already registered").into_ok())
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/registrations/me",
    tag = "Registrations",
    responses(
        (status = 200, description = "Every enrollment of the current user", body = [EnrollmentResponse])
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn my_registrations(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, AppError> {
    let claims = current_claims(&req)?;
    log::info!("📋 GET /registrations/me - {}", claims.participant_id);

    let enrollments =
        enrollment_service::list_user_enrollments(state.store.as_ref(), &claims.user_object_id()?).await?;
    Ok(Envelope::ok(enrollments).into_ok())
}
