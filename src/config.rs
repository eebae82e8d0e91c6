use std::env;

use crate::utils::AppError;

/// Variáveis obrigatórias: ausência de qualquer uma é fatal no startup.
const REQUIRED_VARS: [&str; 6] = [
    "DATABASE_URL",
    "SMTP_HOST",
    "SMTP_USERNAME",
    "SMTP_PASSWORD",
    "MAIL_FROM",
    "JWT_SECRET",
];

#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_hours: i64,
    pub refresh_ttl_days: i64,
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub frontend_url: String,
    pub participant_id_prefix: String,
    pub jwt: JwtSettings,
    pub smtp: SmtpSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, reporting every missing
    /// required variable at once.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let missing: Vec<&str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|key| lookup(key).map_or(true, |v| v.trim().is_empty()))
            .collect();

        if !missing.is_empty() {
            return Err(AppError::ConfigError(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let required = |key: &str| lookup(key).unwrap_or_default().trim().to_string();
        let optional = |key: &str, default: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let port = optional("PORT", "3002")
            .parse::<u16>()
            .map_err(|e| AppError::ConfigError(format!("invalid PORT: {}", e)))?;

        Ok(Self {
            host: optional("HOST", "0.0.0.0"),
            port,
            database_url: required("DATABASE_URL"),
            frontend_url: optional("FRONTEND_URL", "http://localhost:3000"),
            participant_id_prefix: optional("PARTICIPANT_ID_PREFIX", "SYM").to_uppercase(),
            jwt: JwtSettings {
                secret: required("JWT_SECRET"),
                issuer: optional("JWT_ISSUER", "symposium-service"),
                audience: optional("JWT_AUDIENCE", "symposium-api"),
                access_ttl_hours: 24,
                refresh_ttl_days: 30,
            },
            smtp: SmtpSettings {
                host: required("SMTP_HOST"),
                username: required("SMTP_USERNAME"),
                password: required("SMTP_PASSWORD"),
                from: required("MAIL_FROM"),
            },
        })
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig::from_lookup(|key| match key {
        "DATABASE_URL" => Some("mongodb://localhost:27017/symposium".into()),
        "SMTP_HOST" => Some("smtp.example.com".into()),
        "SMTP_USERNAME" => Some("mailer".into()),
        "SMTP_PASSWORD" => Some("secret".into()),
        "MAIL_FROM" => Some("Symposium <noreply@example.com>".into()),
        "JWT_SECRET" => Some("test-secret".into()),
        "PARTICIPANT_ID_PREFIX" => Some("shwk".into()),
        _ => None,
    })
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_variables_are_all_reported() {
        let vars: HashMap<&str, &str> = [("DATABASE_URL", "mongodb://db/x"), ("SMTP_HOST", "  ")]
            .into_iter()
            .collect();

        let err = AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap_err();

        match err {
            AppError::ConfigError(msg) => {
                assert!(msg.contains("SMTP_HOST"));
                assert!(msg.contains("JWT_SECRET"));
                assert!(!msg.contains("DATABASE_URL"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_defaults_applied() {
        let config = test_config();
        assert_eq!(config.port, 3002);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.participant_id_prefix, "SHWK");
        assert_eq!(config.jwt.issuer, "symposium-service");
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let result = AppConfig::from_lookup(|key| match key {
            "PORT" => Some("http".into()),
            _ => Some("value".into()),
        });
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }
}
