use async_trait::async_trait;
use std::fmt;

use crate::models::UserResponse;
use crate::utils::Envelope;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    Unauthorized(String),
    Transport(String),
    InvalidResponse(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            SessionError::Transport(msg) => write!(f, "Request failed: {}", msg),
            SessionError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
        }
    }
}

impl std::error::Error for SessionError {}

#[derive(Debug, Clone, PartialEq)]
pub struct LoginGrant {
    pub token: String,
    pub refresh_token: Option<String>,
    pub user: UserResponse,
}

/// The two server calls a session depends on.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<LoginGrant, SessionError>;
    async fn me(&self, token: &str) -> Result<UserResponse, SessionError>;
}

pub struct HttpAuthApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAuthApi {
    /// `base_url` is the server root, e.g. `http://localhost:3002`.
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/auth{}", self.base_url, path)
    }

    async fn read_envelope(response: reqwest::Response) -> Result<(u16, Envelope<UserResponse>), SessionError> {
        let status = response.status().as_u16();
        let envelope = response
            .json::<Envelope<UserResponse>>()
            .await
            .map_err(|e| SessionError::InvalidResponse(format!("HTTP {}: {}", status, e)))?;
        Ok((status, envelope))
    }
}

fn user_from_envelope(status: u16, envelope: Envelope<UserResponse>) -> Result<Envelope<UserResponse>, SessionError> {
    if status == 401 || status == 403 || !envelope.success {
        let message = envelope.message.unwrap_or_else(|| format!("HTTP {}", status));
        return Err(if (400..500).contains(&status) {
            SessionError::Unauthorized(message)
        } else {
            SessionError::InvalidResponse(message)
        });
    }
    if envelope.data.is_none() {
        return Err(SessionError::InvalidResponse("missing user data".to_string()));
    }
    Ok(envelope)
}

fn grant_from_envelope(status: u16, envelope: Envelope<UserResponse>) -> Result<LoginGrant, SessionError> {
    let envelope = user_from_envelope(status, envelope)?;
    match (envelope.token, envelope.data) {
        (Some(token), Some(user)) => Ok(LoginGrant {
            token,
            refresh_token: envelope.refresh_token,
            user,
        }),
        _ => Err(SessionError::InvalidResponse("missing token".to_string())),
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, email: &str, password: &str) -> Result<LoginGrant, SessionError> {
        let response = self
            .client
            .post(self.url("/login"))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?;

        let (status, envelope) = Self::read_envelope(response).await?;
        grant_from_envelope(status, envelope)
    }

    async fn me(&self, token: &str) -> Result<UserResponse, SessionError> {
        let response = self
            .client
            .get(self.url("/me"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))?;

        let (status, envelope) = Self::read_envelope(response).await?;
        user_from_envelope(status, envelope)?
            .data
            .ok_or_else(|| SessionError::InvalidResponse("missing user data".to_string()))
    }
}
