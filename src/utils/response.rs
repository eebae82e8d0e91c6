use actix_web::HttpResponse;
use serde::{Deserialize, Serialize};

/// Uniform JSON wrapper returned by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            token: None,
            refresh_token: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_tokens(mut self, token: String, refresh_token: Option<String>) -> Self {
        self.token = Some(token);
        self.refresh_token = refresh_token;
        self
    }

    pub fn into_ok(self) -> HttpResponse {
        HttpResponse::Ok().json(self)
    }

    pub fn into_created(self) -> HttpResponse {
        HttpResponse::Created().json(self)
    }
}

impl Envelope<()> {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
            token: None,
            refresh_token: None,
        }
    }
}
