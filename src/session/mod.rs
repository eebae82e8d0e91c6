//! Client-side session: caches the token pair and the current user, resolves
//! a cached token against `GET /auth/me`, and decides route access.

pub mod client;
pub mod guard;
pub mod storage;

use crate::models::{Role, UserResponse};
use client::{AuthApi, SessionError};
use guard::{check_route, RouteDecision, RouteRequirement};
use storage::{TokenStorage, REFRESH_TOKEN_KEY, TOKEN_KEY, USER_KEY};

pub use client::{HttpAuthApi, LoginGrant};
pub use storage::MemoryStorage;

pub struct Session<A, S> {
    api: A,
    storage: S,
    user: Option<UserResponse>,
}

impl<A: AuthApi, S: TokenStorage> Session<A, S> {
    /// Starts anonymous; the cached user is only trusted after `restore()`.
    pub fn new(api: A, storage: S) -> Self {
        Self { api, storage, user: None }
    }

    pub fn token(&self) -> Option<String> {
        self.storage.get(TOKEN_KEY)
    }

    pub fn user(&self) -> Option<&UserResponse> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.token().is_some()
    }

    pub fn role(&self) -> Option<Role> {
        self.user.as_ref().map(|u| u.role)
    }

    pub fn check(&self, requirement: RouteRequirement) -> RouteDecision {
        check_route(self.is_authenticated(), self.role(), requirement)
    }

    /// Resolves the cached token. Any failure ends anonymous with every
    /// cached credential removed.
    pub async fn restore(&mut self) -> Option<&UserResponse> {
        let token = match self.token() {
            Some(token) => token,
            None => {
                self.clear();
                return None;
            }
        };

        match self.api.me(&token).await {
            Ok(user) => {
                self.cache_user(&user);
                self.user = Some(user);
            }
            Err(e) => {
                log::warn!("⚠️  Session restore failed, clearing credentials: {}", e);
                self.clear();
            }
        }
        self.user.as_ref()
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<&UserResponse, SessionError> {
        match self.api.login(email, password).await {
            Ok(grant) => {
                self.storage.set(TOKEN_KEY, grant.token);
                match grant.refresh_token {
                    Some(refresh) => self.storage.set(REFRESH_TOKEN_KEY, refresh),
                    None => self.storage.remove(REFRESH_TOKEN_KEY),
                }
                self.cache_user(&grant.user);
                Ok(self.user.insert(grant.user))
            }
            Err(e) => {
                self.clear();
                Err(e)
            }
        }
    }

    pub fn logout(&mut self) {
        self.clear();
    }

    fn cache_user(&self, user: &UserResponse) {
        match serde_json::to_string(user) {
            Ok(json) => self.storage.set(USER_KEY, json),
            Err(e) => log::warn!("⚠️  Could not cache user: {}", e),
        }
    }

    fn clear(&mut self) {
        self.storage.remove(TOKEN_KEY);
        self.storage.remove(REFRESH_TOKEN_KEY);
        self.storage.remove(USER_KEY);
        self.user = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FakeApi;

    fn meera() -> UserResponse {
        UserResponse {
            id: "6650f0c2a1b2c3d4e5f60718".into(),
            participant_id: "SHWK001".into(),
            name: "Meera".into(),
            email: "meera@example.com".into(),
            phone: "98765".into(),
            role: Role::Admin,
        }
    }

    #[async_trait]
    impl AuthApi for FakeApi {
        async fn login(&self, email: &str, password: &str) -> Result<LoginGrant, SessionError> {
            if email == "meera@example.com" && password == "hunter2" {
                Ok(LoginGrant {
                    token: "good".into(),
                    refresh_token: Some("refresh".into()),
                    user: meera(),
                })
            } else {
                Err(SessionError::Unauthorized("Invalid credentials".into()))
            }
        }

        async fn me(&self, token: &str) -> Result<UserResponse, SessionError> {
            match token {
                "good" => Ok(meera()),
                "offline" => Err(SessionError::Transport("connection refused".into())),
                _ => Err(SessionError::Unauthorized("Invalid token".into())),
            }
        }
    }

    fn session_with(token: Option<&str>) -> Session<FakeApi, MemoryStorage> {
        let storage = MemoryStorage::new();
        if let Some(token) = token {
            storage.set(TOKEN_KEY, token.to_string());
            storage.set(REFRESH_TOKEN_KEY, "refresh".into());
            storage.set(USER_KEY, "{\"stale\":true}".into());
        }
        Session::new(FakeApi, storage)
    }

    #[tokio::test]
    async fn test_restore_with_invalid_token_ends_anonymous() {
        let mut session = session_with(Some("expired"));

        assert!(session.restore().await.is_none());
        assert!(!session.is_authenticated());
        assert!(session.storage.get(TOKEN_KEY).is_none());
        assert!(session.storage.get(REFRESH_TOKEN_KEY).is_none());
        assert!(session.storage.get(USER_KEY).is_none());
        assert_eq!(session.check(RouteRequirement::UserOnly), RouteDecision::RedirectToLogin);
    }

    #[tokio::test]
    async fn test_restore_clears_on_transport_failure_too() {
        let mut session = session_with(Some("offline"));
        assert!(session.restore().await.is_none());
        assert!(session.token().is_none());
    }

    #[tokio::test]
    async fn test_restore_with_valid_token_resolves_user() {
        let mut session = session_with(Some("good"));

        let user = session.restore().await.cloned().unwrap();
        assert_eq!(user.participant_id, "SHWK001");
        assert!(session.is_authenticated());
        assert_eq!(session.check(RouteRequirement::AdminOnly), RouteDecision::Allow);

        let cached: UserResponse = serde_json::from_str(&session.storage.get(USER_KEY).unwrap()).unwrap();
        assert_eq!(cached, meera());
    }

    #[tokio::test]
    async fn test_login_failure_clears_previous_credentials() {
        let mut session = session_with(Some("good"));
        session.restore().await;

        let result = session.login("meera@example.com", "wrong").await;
        assert!(matches!(result, Err(SessionError::Unauthorized(_))));
        assert!(!session.is_authenticated());
        assert!(session.token().is_none());
    }

    #[tokio::test]
    async fn test_login_then_logout() {
        let mut session = session_with(None);

        session.login("meera@example.com", "hunter2").await.unwrap();
        assert_eq!(session.token().as_deref(), Some("good"));
        assert_eq!(session.storage.get(REFRESH_TOKEN_KEY).as_deref(), Some("refresh"));
        assert_eq!(session.role(), Some(Role::Admin));

        session.logout();
        assert!(session.user().is_none());
        assert!(session.token().is_none());
        assert_eq!(session.check(RouteRequirement::Public), RouteDecision::Allow);
    }
}
