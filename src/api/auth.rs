use actix_web::{web, HttpRequest, HttpResponse};

use crate::api::current_claims;
use crate::models::UserResponse;
use crate::services::auth_service::{self, AuthGrant, LoginRequest, RefreshTokenRequest, RegisterRequest};
use crate::state::AppState;
use crate::utils::{AppError, Envelope};

fn grant_envelope(grant: AuthGrant) -> Envelope<UserResponse> {
    Envelope::ok(grant.user).with_tokens(grant.token, Some(grant.refresh_token))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful; token pair and user"),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account is inactive")
    )
)]
pub async fn login(
    state: web::Data<AppState>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("🔐 POST /auth/login - email: {}", request.email);

    match auth_service::login(state.store.as_ref(), &state.config.jwt, &request).await {
        Ok(grant) => {
            log::info!("✅ Login successful: {}", grant.user.participant_id);
            Ok(grant_envelope(grant).with_message("Login successful").into_ok())
        }
        Err(e) => {
            log::warn!("❌ Login failed: {} - {}", request.email, e);
            Err(e)
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created with a new participant ID"),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "User already exists")
    )
)]
pub async fn register(
    state: web::Data<AppState>,
    request: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("📝 POST /auth/register - email: {}", request.email);

    let grant = auth_service::register(
        state.store.as_ref(),
        &state.config.jwt,
        &state.config.participant_id_prefix,
        &request,
    )
    .await
    .map_err(|e| {
        log::warn!("❌ Registration failed: {} - {}", request.email, e);
        e
    })?;

    Ok(grant_envelope(grant).with_message("Registration successful").into_created())
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "Auth",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New token pair"),
        (status = 401, description = "Invalid or expired refresh token")
    )
)]
pub async fn refresh_token(
    state: web::Data<AppState>,
    request: web::Json<RefreshTokenRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("🔄 POST /auth/refresh");

    let grant = auth_service::refresh_token(state.store.as_ref(), &state.config.jwt, &request).await?;
    Ok(grant_envelope(grant).into_ok())
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_me(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, AppError> {
    let claims = current_claims(&req)?;
    log::info!("👤 GET /auth/me - {}", claims.participant_id);

    let user = auth_service::get_current_user(state.store.as_ref(), &claims).await?;
    Ok(Envelope::ok(user).into_ok())
}
