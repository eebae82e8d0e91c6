use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Symposium Registration API",
        version = "1.0.0",
        description = "Registration and payment backend for the symposium.\n\n**Authentication:** JWT Bearer access token from `/api/v1/auth/login`.\n\n**Envelope:** every response is `{ success, message?, data?, token?, refreshToken? }`."
    ),
    paths(
        // Auth
        crate::api::auth::login,
        crate::api::auth::register,
        crate::api::auth::refresh_token,
        crate::api::auth::get_me,

        // Health
        crate::api::health::health_check,

        // Events
        crate::api::events::list_events,
        crate::api::events::get_event,
        crate::api::events::get_event_registrations,

        // Registrations
        crate::api::registrations::create_registration,
        crate::api::registrations::my_registrations,

        // Admin
        crate::api::admin::pending_payments,
        crate::api::admin::payment_stats,
        crate::api::admin::verify_payment,
        crate::api::admin::reject_payment,
        crate::api::admin::reconcile_enrollments,
        crate::api::admin::normalize_events,
        crate::api::admin::update_user,
    ),
    components(
        schemas(
            crate::services::auth_service::LoginRequest,
            crate::services::auth_service::RegisterRequest,
            crate::services::auth_service::RefreshTokenRequest,
            crate::models::UserResponse,
            crate::models::UserPatch,
            crate::models::Role,
            crate::models::EventResponse,
            crate::models::EventCategory,
            crate::models::TeamSize,
            crate::models::EventSummary,
            crate::models::EnrollRequest,
            crate::models::EnrollmentResponse,
            crate::models::EnrollmentKind,
            crate::models::PaymentStatus,
            crate::models::ParticipantSummary,
            crate::models::PaymentStats,
            crate::models::RejectPaymentRequest,
            crate::services::maintenance_service::ReconcileReport,
            crate::services::maintenance_service::NormalizeReport,
            crate::api::health::HealthResponse,
        )
    ),
    tags(
        (name = "Auth", description = "Registration, login, token refresh and current user."),
        (name = "Health", description = "Liveness and database reachability."),
        (name = "Events", description = "Event catalog and per-event registration lists."),
        (name = "Registrations", description = "Enrollment in workshops and events."),
        (name = "Admin", description = "Payment review, maintenance commands and user edits. Admin role required."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Access token from /api/v1/auth/login"))
                        .build(),
                ),
            );
        }
    }
}
