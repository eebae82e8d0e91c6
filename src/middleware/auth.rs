use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    web, Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};

use crate::services::auth_service::{verify_token, Claims, TokenType};
use crate::session::guard::{check_route, RouteDecision, RouteRequirement};
use crate::state::AppState;
use crate::utils::AppError;

/// What a valid access token must additionally grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Any active account with a valid access token.
    Authenticated,
    /// Same role rule as the client's `AdminOnly` routes.
    Admin,
}

/// Verifies the bearer access token and stores its `Claims` in the request
/// extensions. `admin_only()` additionally requires the admin role.
#[derive(Clone, Copy)]
pub struct AuthMiddleware {
    access: Access,
}

impl AuthMiddleware {
    pub fn authenticated() -> Self {
        Self { access: Access::Authenticated }
    }

    pub fn admin_only() -> Self {
        Self { access: Access::Admin }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service,
            access: self.access,
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
    access: Access,
}

fn bearer_token(req: &ServiceRequest) -> Result<String, AppError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Missing authorization token".to_string()))?;

    header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid token format".to_string()))
}

fn authorize(req: &ServiceRequest, access: Access) -> Result<Claims, AppError> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| AppError::ConfigError("application state not registered".to_string()))?;

    let token = bearer_token(req)?;
    let claims = verify_token(&state.config.jwt, &token, TokenType::Access)?;

    if access == Access::Authenticated {
        return Ok(claims);
    }
    match check_route(true, Some(claims.role), RouteRequirement::AdminOnly) {
        RouteDecision::Allow => Ok(claims),
        _ => {
            log::warn!("🚫 {} denied on {} ({})", claims.participant_id, req.path(), claims.role);
            Err(AppError::Forbidden("Admin access required".to_string()))
        }
    }
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        match authorize(&req, self.access) {
            Ok(claims) => {
                req.extensions_mut().insert(claims);
                let fut = self.service.call(req);
                Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
            }
            // Responde com o envelope de erro sem chamar o handler
            Err(e) => {
                let response = req.error_response(e).map_into_right_body();
                Box::pin(async move { Ok(response) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, User};
    use crate::services::auth_service::issue_token_pair;
    use crate::state::testing::test_state;
    use actix_web::{http::StatusCode, test, App, HttpResponse};
    use mongodb::bson::oid::ObjectId;

    fn user(role: Role) -> User {
        User {
            id: Some(ObjectId::new()),
            participant_id: "SHWK007".into(),
            name: "Kiran".into(),
            email: "kiran@example.com".into(),
            phone: String::new(),
            password: String::new(),
            role,
            is_active: true,
            created_at: None,
            updated_at: None,
        }
    }

    async fn whoami(req: actix_web::HttpRequest) -> HttpResponse {
        let participant = req
            .extensions()
            .get::<Claims>()
            .map(|c| c.participant_id.clone())
            .unwrap_or_default();
        HttpResponse::Ok().body(participant)
    }

    #[actix_web::test]
    async fn test_missing_and_refresh_tokens_are_rejected() {
        let (state, _, _) = test_state();
        let (_, refresh) = issue_token_pair(&state.config.jwt, &user(Role::User)).unwrap();
        let app = test::init_service(
            App::new().app_data(web::Data::new(state)).service(
                web::scope("/p")
                    .wrap(AuthMiddleware::authenticated())
                    .route("", web::get().to(whoami)),
            ),
        )
        .await;

        let missing = test::TestRequest::get().uri("/p").to_request();
        let resp = test::call_service(&app, missing).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Missing authorization token");

        let wrong_type = test::TestRequest::get()
            .uri("/p")
            .insert_header((AUTHORIZATION, format!("Bearer {}", refresh)))
            .to_request();
        let resp = test::call_service(&app, wrong_type).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_authenticated_scope_admits_every_role() {
        let (state, _, _) = test_state();
        let tokens: Vec<String> = [Role::User, Role::Coordinator, Role::Admin]
            .into_iter()
            .map(|role| issue_token_pair(&state.config.jwt, &user(role)).unwrap().0)
            .collect();
        let app = test::init_service(
            App::new().app_data(web::Data::new(state)).service(
                web::scope("/p")
                    .wrap(AuthMiddleware::authenticated())
                    .route("", web::get().to(whoami)),
            ),
        )
        .await;

        for token in tokens {
            let req = test::TestRequest::get()
                .uri("/p")
                .insert_header((AUTHORIZATION, format!("Bearer {}", token)))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }
    }

    #[actix_web::test]
    async fn test_admin_scope_checks_role() {
        let (state, _, _) = test_state();
        let (user_token, _) = issue_token_pair(&state.config.jwt, &user(Role::User)).unwrap();
        let (admin_token, _) = issue_token_pair(&state.config.jwt, &user(Role::Admin)).unwrap();
        let app = test::init_service(
            App::new().app_data(web::Data::new(state)).service(
                web::scope("/admin")
                    .wrap(AuthMiddleware::admin_only())
                    .route("", web::get().to(whoami)),
            ),
        )
        .await;

        let as_user = test::TestRequest::get()
            .uri("/admin")
            .insert_header((AUTHORIZATION, format!("Bearer {}", user_token)))
            .to_request();
        let resp = test::call_service(&app, as_user).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let as_admin = test::TestRequest::get()
            .uri("/admin")
            .insert_header((AUTHORIZATION, format!("Bearer {}", admin_token)))
            .to_request();
        let resp = test::call_service(&app, as_admin).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(test::read_body(resp).await, "SHWK007");
    }
}
