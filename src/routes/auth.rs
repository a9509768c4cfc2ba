use actix_web::{web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::{
        bearer_validator, create_user, fetch_user_by_email, fetch_user_by_id, issue_token,
        verify_password, TokenClaims,
    },
    error::ApiError,
    models::ROLE_USER,
    state::AppState,
};

#[derive(Deserialize)]
struct RegisterRequest {
    email: Option<String>,
    password: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(web::resource("/register").route(web::post().to(register)))
            .service(web::resource("/login").route(web::post().to(login)))
            .service(
                web::scope("/me")
                    .wrap(HttpAuthentication::bearer(bearer_validator))
                    .service(web::resource("").route(web::get().to(me))),
            ),
    );
}

async fn register(
    state: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let email = payload.email.unwrap_or_default();
    let password = payload.password.unwrap_or_default();

    if email.trim().is_empty() || password.is_empty() {
        return Err(ApiError::Validation(
            "Email and password are required".to_string(),
        ));
    }
    if password.len() < 6 {
        return Err(ApiError::Validation(
            "Password must be at least 6 characters long".to_string(),
        ));
    }

    if fetch_user_by_email(&state.db, &email).await?.is_some() {
        return Err(ApiError::Conflict(
            "User already exists with this email".to_string(),
        ));
    }

    let user = create_user(
        &state.db,
        &email,
        &password,
        payload.name.as_deref(),
        ROLE_USER,
    )
    .await?;
    let token = issue_token(&user, &state.config.jwt_secret)?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "token": token,
        "user": user.to_view(),
    })))
}

async fn login(
    state: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let email = payload.email.unwrap_or_default();
    let password = payload.password.unwrap_or_default();

    if email.trim().is_empty() || password.is_empty() {
        return Err(ApiError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    // Identical response for unknown email and bad password so the endpoint
    // cannot be used to enumerate accounts.
    let user = fetch_user_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))?;
    if !verify_password(&password, &user.password_hash) {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    let token = issue_token(&user, &state.config.jwt_secret)?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "token": token,
        "user": user.to_view(),
    })))
}

async fn me(
    state: web::Data<AppState>,
    claims: web::ReqData<TokenClaims>,
) -> Result<HttpResponse, ApiError> {
    let user = fetch_user_by_id(&state.db, &claims.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(HttpResponse::Ok().json(json!({ "user": user.to_view() })))
}
