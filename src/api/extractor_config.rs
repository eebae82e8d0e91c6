use actix_web::web::{JsonConfig, QueryConfig};

use crate::utils::AppError;

/// Body errors (malformed JSON, missing fields) rendered as the failure envelope.
pub fn json_config() -> JsonConfig {
    JsonConfig::default().error_handler(|err, _req| {
        log::warn!("⚠️  Rejected request body: {}", err);
        AppError::InvalidRequest(format!("Invalid request body: {}", err)).into()
    })
}

pub fn query_config() -> QueryConfig {
    QueryConfig::default().error_handler(|err, _req| {
        AppError::InvalidRequest(format!("Invalid query string: {}", err)).into()
    })
}
