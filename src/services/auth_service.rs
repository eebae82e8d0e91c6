use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtSettings;
use crate::models::{format_participant_id, participant_seq, Role, User, UserResponse};
use crate::services::store::Store;
use crate::utils::AppError;

const PARTICIPANT_SEQUENCE: &str = "participant";
const PARTICIPANT_ID_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

// JWT Claims
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: String, // _id do usuário (hex)
    pub participant_id: String,
    pub role: Role,
    pub token_type: TokenType,
    pub iat: usize,
    pub exp: usize,
    pub jti: String,
    pub aud: String,
    pub iss: String,
}

impl Claims {
    pub fn user_object_id(&self) -> Result<ObjectId, AppError> {
        ObjectId::parse_str(&self.sub).map_err(|_| AppError::Unauthorized("Invalid token subject".to_string()))
    }
}

// Request/Response structures
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Par de tokens + usuário, devolvido por login/register/refresh
#[derive(Debug)]
pub struct AuthGrant {
    pub token: String,
    pub refresh_token: String,
    pub user: UserResponse,
}

fn issue_token(settings: &JwtSettings, user: &User, token_type: TokenType) -> Result<String, AppError> {
    let now = Utc::now();
    let ttl = match token_type {
        TokenType::Access => Duration::hours(settings.access_ttl_hours),
        TokenType::Refresh => Duration::days(settings.refresh_ttl_days),
    };

    let claims = Claims {
        sub: user.id.map(|id| id.to_hex()).unwrap_or_default(),
        participant_id: user.participant_id.clone(),
        role: user.role,
        token_type,
        iat: now.timestamp() as usize,
        exp: (now + ttl).timestamp() as usize,
        jti: Uuid::new_v4().to_string(),
        aud: settings.audience.clone(),
        iss: settings.issuer.clone(),
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(settings.secret.as_ref()))
        .map_err(|e| AppError::ConfigError(format!("Failed to generate token: {}", e)))
}

pub fn issue_token_pair(settings: &JwtSettings, user: &User) -> Result<(String, String), AppError> {
    Ok((
        issue_token(settings, user, TokenType::Access)?,
        issue_token(settings, user, TokenType::Refresh)?,
    ))
}

// Verify JWT token
pub fn verify_token(settings: &JwtSettings, token: &str, expected: TokenType) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[settings.audience.as_str()]);
    validation.set_issuer(&[settings.issuer.as_str()]);

    let claims = decode::<Claims>(token, &DecodingKey::from_secret(settings.secret.as_ref()), &validation)
        .map(|data| data.claims)
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

    if claims.token_type != expected {
        return Err(AppError::Unauthorized("Invalid token type".to_string()));
    }
    Ok(claims)
}

fn grant_for(settings: &JwtSettings, user: &User) -> Result<AuthGrant, AppError> {
    let (token, refresh_token) = issue_token_pair(settings, user)?;
    Ok(AuthGrant {
        token,
        refresh_token,
        user: UserResponse::from(user),
    })
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// User login
pub async fn login(store: &dyn Store, settings: &JwtSettings, request: &LoginRequest) -> Result<AuthGrant, AppError> {
    let invalid = || AppError::Unauthorized("Invalid credentials".to_string());

    let user = store
        .find_user_by_email(&normalize_email(&request.email))
        .await?
        .ok_or_else(invalid)?;

    let valid = verify(&request.password, &user.password).map_err(|e| {
        log::warn!("⚠️  Unreadable password hash for {}: {}", user.participant_id, e);
        invalid()
    })?;

    if !valid {
        return Err(invalid());
    }

    if !user.is_active {
        return Err(AppError::Forbidden("Account is inactive".to_string()));
    }

    grant_for(settings, &user)
}

// User registration
pub async fn register(
    store: &dyn Store,
    settings: &JwtSettings,
    participant_prefix: &str,
    request: &RegisterRequest,
) -> Result<AuthGrant, AppError> {
    let email = normalize_email(&request.email);
    let name = request.name.trim();

    if name.is_empty() {
        return Err(AppError::InvalidRequest("Name is required".to_string()));
    }
    if !email.contains('@') {
        return Err(AppError::InvalidRequest("A valid email is required".to_string()));
    }
    if request.password.is_empty() {
        return Err(AppError::InvalidRequest("Password is required".to_string()));
    }

    if store.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("User already exists".to_string()));
    }

    let hashed_password = hash(&request.password, DEFAULT_COST)
        .map_err(|e| AppError::InvalidRequest(format!("Failed to hash password: {}", e)))?;

    let now = BsonDateTime::now();
    let mut new_user = User {
        id: None,
        participant_id: String::new(),
        name: name.to_string(),
        email,
        phone: request.phone.trim().to_string(),
        password: hashed_password,
        role: Role::User,
        is_active: true,
        created_at: Some(now),
        updated_at: Some(now),
    };

    let mut attempt = 0;
    let user = loop {
        attempt += 1;
        let seq = store.next_sequence(PARTICIPANT_SEQUENCE).await?;
        new_user.participant_id = format_participant_id(participant_prefix, seq);

        match store.insert_user(new_user.clone()).await {
            Ok(user) => break user,
            Err(AppError::Conflict(reason)) if attempt < PARTICIPANT_ID_ATTEMPTS => {
                if store.find_user_by_email(&new_user.email).await?.is_some() {
                    return Err(AppError::Conflict(reason));
                }
                log::warn!("⚠️  Participant ID {} already taken", new_user.participant_id);
                skip_taken_participant_ids(store, participant_prefix).await?;
            }
            Err(e) => return Err(e),
        }
    };

    log::info!("✅ User registered: {} ({})", user.email, user.participant_id);

    grant_for(settings, &user)
}

// Usuários criados fora do contador (importação, seed manual) ocupam IDs
async fn skip_taken_participant_ids(store: &dyn Store, prefix: &str) -> Result<(), AppError> {
    let highest = store
        .participant_ids_with_prefix(prefix)
        .await?
        .iter()
        .filter_map(|id| participant_seq(prefix, id))
        .max();
    if let Some(highest) = highest {
        store.raise_sequence(PARTICIPANT_SEQUENCE, highest).await?;
    }
    Ok(())
}

// Refresh token
pub async fn refresh_token(
    store: &dyn Store,
    settings: &JwtSettings,
    request: &RefreshTokenRequest,
) -> Result<AuthGrant, AppError> {
    let claims = verify_token(settings, &request.refresh_token, TokenType::Refresh)?;

    let user = store
        .find_user_by_id(&claims.user_object_id()?)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;

    if !user.is_active {
        return Err(AppError::Forbidden("Account is inactive".to_string()));
    }

    grant_for(settings, &user)
}

// Get current user
pub async fn get_current_user(store: &dyn Store, claims: &Claims) -> Result<UserResponse, AppError> {
    let user = store
        .find_user_by_id(&claims.user_object_id()?)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;

    Ok(UserResponse::from(&user))
}
