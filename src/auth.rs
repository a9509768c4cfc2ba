use actix_web::{
    dev::ServiceRequest,
    error::{ErrorForbidden, ErrorUnauthorized},
    web, Error, HttpMessage, HttpRequest,
};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{UserRow, ROLE_ADMIN},
    state::AppState,
};

const TOKEN_VALIDITY_DAYS: i64 = 7;

/// Claims carried by every issued bearer token. Inserted into request
/// extensions by the auth validators so handlers can read them via
/// `web::ReqData<TokenClaims>`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub user_id: String,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn issue_token(user: &UserRow, secret: &str) -> Result<String, ApiError> {
    issue_token_with_validity(user, secret, Duration::days(TOKEN_VALIDITY_DAYS))
}

fn issue_token_with_validity(
    user: &UserRow,
    secret: &str,
    validity: Duration,
) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = TokenClaims {
        user_id: user.id.clone(),
        email: user.email.clone(),
        role: user.role.clone(),
        iat: now.timestamp(),
        exp: (now + validity).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|err| ApiError::Internal(format!("token signing failed: {err}")))
}

/// Fails closed: any signature, expiry, or parse problem yields `None`.
pub fn verify_token(token: &str, secret: &str) -> Option<TokenClaims> {
    decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

pub async fn fetch_user_by_email(
    pool: &SqlitePool,
    email: &str,
) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        r#"SELECT id, email, password_hash, name, role, created_at, updated_at
           FROM users
           WHERE email = ?
           LIMIT 1"#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub async fn fetch_user_by_id(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        r#"SELECT id, email, password_hash, name, role, created_at, updated_at
           FROM users
           WHERE id = ?
           LIMIT 1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn create_user(
    pool: &SqlitePool,
    email: &str,
    password: &str,
    name: Option<&str>,
    role: &str,
) -> Result<UserRow, ApiError> {
    let password_hash = hash_password(password)
        .map_err(|err| ApiError::Internal(format!("password hash failed: {err}")))?;
    let now = now_rfc3339();
    let user = UserRow {
        id: new_id(),
        email: email.to_string(),
        password_hash,
        name: name.map(str::to_string),
        role: role.to_string(),
        created_at: now.clone(),
        updated_at: now,
    };

    sqlx::query(
        r#"INSERT INTO users (id, email, password_hash, name, role, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.name)
    .bind(&user.role)
    .bind(&user.created_at)
    .bind(&user.updated_at)
    .execute(pool)
    .await?;

    Ok(user)
}

fn claims_from_service_request(req: &ServiceRequest, token: &str) -> Result<TokenClaims, Error> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| ErrorUnauthorized("Unauthorized"))?;
    verify_token(token, &state.config.jwt_secret).ok_or_else(|| ErrorUnauthorized("Invalid token"))
}

/// Validator for endpoints that require any authenticated identity.
pub async fn bearer_validator(
    req: ServiceRequest,
    credentials: BearerAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    match claims_from_service_request(&req, credentials.token()) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            Ok(req)
        }
        Err(err) => Err((err, req)),
    }
}

/// Validator for admin-only endpoints: valid token AND admin role.
pub async fn admin_validator(
    req: ServiceRequest,
    credentials: BearerAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    match claims_from_service_request(&req, credentials.token()) {
        Ok(claims) => {
            if claims.role != ROLE_ADMIN {
                return Err((
                    ErrorForbidden("Access denied. Admin role required."),
                    req,
                ));
            }
            req.extensions_mut().insert(claims);
            Ok(req)
        }
        Err(err) => Err((err, req)),
    }
}

/// Token extraction for the one read endpoint that also accepts a
/// query-string token (`GET /admin/bookings?token=...`).
pub fn claims_from_header(req: &HttpRequest, secret: &str) -> Result<TokenClaims, ApiError> {
    let header = req
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("No token provided".to_string()))?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("No token provided".to_string()))?;
    verify_token(token, secret).ok_or_else(|| ApiError::Unauthorized("Invalid token".to_string()))
}

pub fn claims_from_query_or_header(
    req: &HttpRequest,
    query_token: Option<&str>,
    secret: &str,
) -> Result<TokenClaims, ApiError> {
    if let Some(token) = query_token.filter(|t| !t.trim().is_empty()) {
        return verify_token(token, secret)
            .ok_or_else(|| ApiError::Unauthorized("Invalid token".to_string()));
    }
    claims_from_header(req, secret)
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> UserRow {
        UserRow {
            id: "user-1".into(),
            email: "pat@example.com".into(),
            password_hash: String::new(),
            name: Some("Pat".into()),
            role: "admin".into(),
            created_at: now_rfc3339(),
            updated_at: now_rfc3339(),
        }
    }

    #[test]
    fn password_roundtrip() {
        let hash = hash_password("letmein").unwrap();
        assert!(verify_password("letmein", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn verify_rejects_garbage_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn token_roundtrip_preserves_claims() {
        let user = sample_user();
        let token = issue_token(&user, "secret").unwrap();
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.role, user.role);
    }

    #[test]
    fn token_rejected_with_wrong_secret() {
        let token = issue_token(&sample_user(), "secret").unwrap();
        assert!(verify_token(&token, "other-secret").is_none());
    }

    #[test]
    fn tampered_token_rejected() {
        let token = issue_token(&sample_user(), "secret").unwrap();
        let mut tampered = token.clone();
        // Flip a character in the signature segment.
        let sig_start = token.rfind('.').unwrap() + 1;
        let replacement = if &token[sig_start..=sig_start] == "A" { "B" } else { "A" };
        tampered.replace_range(sig_start..=sig_start, replacement);
        assert!(verify_token(&tampered, "secret").is_none());
    }

    #[test]
    fn expired_token_rejected() {
        let token =
            issue_token_with_validity(&sample_user(), "secret", Duration::hours(-2)).unwrap();
        assert!(verify_token(&token, "secret").is_none());
    }
}
