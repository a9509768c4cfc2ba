use std::env;

use thiserror::Error;

/// Placeholder secret used when JWT_SECRET is unset. Only acceptable in
/// development; startup refuses it anywhere else.
pub const DEV_JWT_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set to a non-default value when APP_ENV is '{0}'")]
    InsecureSecret(String),
    #[error("invalid PORT value '{0}'")]
    InvalidPort(String),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub environment: String,
    pub jwt_secret: String,
    pub smtp: SmtpConfig,
}

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub from: String,
    /// Recipient used when a location has no email configured.
    pub fallback_location_email: String,
    /// Optional extra recipient copied on location notifications.
    pub copy_to: Option<String>,
}

impl SmtpConfig {
    pub fn enabled(&self) -> bool {
        !(self.username.trim().is_empty() || self.password.trim().is_empty())
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| DEV_JWT_SECRET.to_string());
        if jwt_secret == DEV_JWT_SECRET || jwt_secret.trim().is_empty() {
            if environment != "development" {
                return Err(ConfigError::InsecureSecret(environment));
            }
            log::warn!("JWT_SECRET not set. Using the development placeholder; set JWT_SECRET in production.");
        }

        let port = match env::var("PORT") {
            Ok(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidPort(value))?,
            Err(_) => 8080,
        };

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./data/dermbook.db".to_string());

        let smtp = SmtpConfig {
            host: env::var("EMAIL_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string()),
            username: env::var("EMAIL_USER").unwrap_or_default(),
            password: env::var("EMAIL_PASSWORD").unwrap_or_default(),
            from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "Appointment System <noreply@example.com>".to_string()),
            fallback_location_email: env::var("EMAIL_FALLBACK_LOCATION")
                .unwrap_or_else(|_| "frontdesk@example.com".to_string()),
            copy_to: env::var("EMAIL_COPY_TO").ok().filter(|v| !v.trim().is_empty()),
        };

        Ok(Config {
            database_url,
            port,
            environment,
            jwt_secret,
            smtp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_smtp() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".into(),
            username: String::new(),
            password: String::new(),
            from: "x <x@example.com>".into(),
            fallback_location_email: "fallback@example.com".into(),
            copy_to: None,
        }
    }

    #[test]
    fn smtp_disabled_without_credentials() {
        assert!(!base_smtp().enabled());
        let mut smtp = base_smtp();
        smtp.username = "mailer".into();
        smtp.password = "hunter2".into();
        assert!(smtp.enabled());
    }
}
