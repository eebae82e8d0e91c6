use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::api::current_claims;
use crate::models::{EnrollmentResponse, EventCategory, EventResponse};
use crate::services::enrollment_service::{self, parse_object_id};
use crate::state::AppState;
use crate::utils::{AppError, Envelope};

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventQuery {
    /// technical | non-technical | special | workshop
    pub category: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/events",
    tag = "Events",
    params(EventQuery),
    responses(
        (status = 200, description = "Active events", body = [EventResponse]),
        (status = 400, description = "Unknown category")
    )
)]
pub async fn list_events(
    state: web::Data<AppState>,
    query: web::Query<EventQuery>,
) -> Result<HttpResponse, AppError> {
    let category = match query.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(raw) => Some(
            EventCategory::parse_loose(raw)
                .ok_or_else(|| AppError::InvalidRequest(format!("Unknown category: {}", raw)))?,
        ),
        None => None,
    };

    let events: Vec<EventResponse> = state
        .store
        .list_events(category, true)
        .await?
        .into_iter()
        .map(EventResponse::from)
        .collect();

    log::info!("📅 GET /events - {} events", events.len());
    Ok(Envelope::ok(events).into_ok())
}

#[utoipa::path(
    get,
    path = "/api/v1/events/{id}",
    tag = "Events",
    params(("id" = String, Path, description = "Event ObjectId")),
    responses(
        (status = 200, description = "Event", body = EventResponse),
        (status = 404, description = "Event not found")
    )
)]
pub async fn get_event(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&path, "event")?;
    let event = state
        .store
        .find_event(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    Ok(Envelope::ok(EventResponse::from(event)).into_ok())
}

#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/registrations",
    tag = "Events",
    params(("id" = String, Path, description = "Event ObjectId")),
    responses(
        (status = 200, description = "Enrollments of the event", body = [EnrollmentResponse]),
        (status = 403, description = "Not an admin or coordinator of this event")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_event_registrations(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let claims = current_claims(&req)?;
    log::info!("📋 GET /events/{}/registrations - {}", path, claims.participant_id);

    let enrollments = enrollment_service::list_event_enrollments(state.store.as_ref(), &claims, &path).await?;
    Ok(Envelope::ok(enrollments).into_ok())
}
