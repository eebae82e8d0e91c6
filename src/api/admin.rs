use actix_web::{web, HttpRequest, HttpResponse};

use crate::api::current_claims;
use crate::models::{EnrollmentResponse, PaymentStats, RejectPaymentRequest, UserPatch, UserResponse};
use crate::services::maintenance_service::{self, NormalizeReport, ReconcileReport};
use crate::services::payment_service::{self, PaymentDecision};
use crate::services::user_service;
use crate::state::AppState;
use crate::utils::{AppError, Envelope};

fn decision_response(decision: PaymentDecision) -> HttpResponse {
    let message = if decision.changed {
        format!("Payment {}", decision.enrollment.payment_status)
    } else {
        format!("Payment already {}", decision.enrollment.payment_status)
    };
    Envelope::ok(EnrollmentResponse::from(decision.enrollment))
        .with_message(message)
        .into_ok()
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/payments/pending",
    tag = "Admin",
    responses(
        (status = 200, description = "Pending payments, oldest first", body = [EnrollmentResponse])
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn pending_payments(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let pending = payment_service::pending_payments(state.store.as_ref()).await?;
    log::info!("💳 GET /admin/payments/pending - {} pending", pending.len());
    Ok(Envelope::ok(pending).into_ok())
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/payments/stats",
    tag = "Admin",
    responses(
        (status = 200, description = "Payment counters and verified revenue", body = PaymentStats)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn payment_stats(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let stats = payment_service::payment_stats(state.store.as_ref()).await?;
    Ok(Envelope::ok(stats).into_ok())
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/payments/{id}/verify",
    tag = "Admin",
    params(("id" = String, Path, description = "Enrollment ObjectId")),
    responses(
        (status = 200, description = "Payment verified (or already verified)", body = EnrollmentResponse),
        (status = 404, description = "Registration not found"),
        (status = 409, description = "Payment already rejected")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn verify_payment(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let claims = current_claims(&req)?;
    log::info!("✔️  POST /admin/payments/{}/verify - {}", path, claims.participant_id);

    let decision = payment_service::verify_payment(
        state.store.as_ref(),
        state.notifier.clone(),
        &path,
        claims.user_object_id().ok(),
    )
    .await?;
    Ok(decision_response(decision))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/payments/{id}/reject",
    tag = "Admin",
    params(("id" = String, Path, description = "Enrollment ObjectId")),
    request_body(content = RejectPaymentRequest, description = "Optional rejection reason"),
    responses(
        (status = 200, description = "Payment rejected (or already rejected)", body = EnrollmentResponse),
        (status = 404, description = "Registration not found"),
        (status = 409, description = "Payment already verified")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn reject_payment(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    body: Option<web::Json<RejectPaymentRequest>>,
) -> Result<HttpResponse, AppError> {
    let claims = current_claims(&req)?;
    log::info!("✖️  POST /admin/payments/{}/reject - {}", path, claims.participant_id);

    let reason = body.and_then(|b| b.into_inner().reason);
    let decision =
        payment_service::reject_payment(state.store.as_ref(), &path, claims.user_object_id().ok(), reason).await?;
    Ok(decision_response(decision))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/maintenance/reconcile-enrollments",
    tag = "Admin",
    responses(
        (status = 200, description = "Legacy registrations merged into enrollments", body = ReconcileReport)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn reconcile_enrollments(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    log::info!("🔄 POST /admin/maintenance/reconcile-enrollments");
    let report = maintenance_service::reconcile_enrollments(state.store.as_ref()).await?;
    Ok(Envelope::ok(report).into_ok())
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/maintenance/normalize-events",
    tag = "Admin",
    responses(
        (status = 200, description = "Event documents rewritten to the canonical shape", body = NormalizeReport)
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn normalize_events(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    log::info!("🧹 POST /admin/maintenance/normalize-events");
    let report = maintenance_service::normalize_event_schema(state.store.as_ref()).await?;
    Ok(Envelope::ok(report).into_ok())
}

#[utoipa::path(
    patch,
    path = "/api/v1/admin/users/{participant_id}",
    tag = "Admin",
    params(("participant_id" = String, Path, description = "Participant ID, e.g. SHWK001")),
    request_body = UserPatch,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 404, description = "User not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_user(
    state: web::Data<AppState>,
    path: web::Path<String>,
    patch: web::Json<UserPatch>,
) -> Result<HttpResponse, AppError> {
    log::info!("✏️  PATCH /admin/users/{}", path);
    let user = user_service::update_user(state.store.as_ref(), &path, &patch).await?;
    Ok(Envelope::ok(user).with_message("User updated").into_ok())
}
