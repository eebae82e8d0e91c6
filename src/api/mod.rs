pub mod admin;
pub mod auth;
pub mod events;
pub mod extractor_config;
pub mod health;
pub mod registrations;
pub mod swagger;

use actix_web::{web, HttpMessage, HttpRequest};

use crate::middleware::AuthMiddleware;
use crate::services::auth_service::Claims;
use crate::utils::AppError;

/// Claims stored by `AuthMiddleware` for the current request.
pub(crate) fn current_claims(req: &HttpRequest) -> Result<Claims, AppError> {
    req.extensions()
        .get::<Claims>()
        .cloned()
        .ok_or_else(|| AppError::Unauthorized("Missing authorization token".to_string()))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        // Erros de extração também saem no envelope
        .app_data(extractor_config::json_config())
        .app_data(extractor_config::query_config())
        // Health check
        .route("/health", web::get().to(health::health_check))
        // Auth endpoints
        .service(
            web::scope("/api/v1/auth")
                .route("/login", web::post().to(auth::login))
                .route("/register", web::post().to(auth::register))
                .route("/refresh", web::post().to(auth::refresh_token))
                .service(
                    web::resource("/me")
                        .wrap(AuthMiddleware::authenticated())
                        .route(web::get().to(auth::get_me)),
                ),
        )
        // Catálogo de eventos (público, exceto lista de inscritos)
        .service(
            web::scope("/api/v1/events")
                .route("", web::get().to(events::list_events))
                .service(
                    web::resource("/{id}/registrations")
                        .wrap(AuthMiddleware::authenticated())
                        .route(web::get().to(events::get_event_registrations)),
                )
                .route("/{id}", web::get().to(events::get_event)),
        )
        .service(
            web::scope("/api/v1/registrations")
                .wrap(AuthMiddleware::authenticated())
                .route("", web::post().to(registrations::create_registration))
                .route("/me", web::get().to(registrations::my_registrations)),
        )
        // ==================== ADMIN ====================
        .service(
            web::scope("/api/v1/admin")
                .wrap(AuthMiddleware::admin_only())
                .route("/payments/pending", web::get().to(admin::pending_payments))
                .route("/payments/stats", web::get().to(admin::payment_stats))
                .route("/payments/{id}/verify", web::post().to(admin::verify_payment))
                .route("/payments/{id}/reject", web::post().to(admin::reject_payment))
                .route(
                    "/maintenance/reconcile-enrollments",
                    web::post().to(admin::reconcile_enrollments),
                )
                .route("/maintenance/normalize-events", web::post().to(admin::normalize_events))
                .route("/users/{participant_id}", web::patch().to(admin::update_user)),
        );
}
