use std::sync::OnceLock;

use actix_web::{web, HttpResponse};
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::{new_id, now_rfc3339},
    error::ApiError,
    models::LocationSummary,
    state::AppState,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContactRequest {
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    phone_number: Option<String>,
    store_info: Option<bool>,
    patient_date_of_birth: Option<String>,
    insurance_info: Option<String>,
    description: Option<String>,
    location_id: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/contact").route(web::post().to(contact)))
        .service(web::resource("/locations").route(web::get().to(active_locations)))
        .service(web::resource("/health").route(web::get().to(health)));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

fn email_regex() -> &'static Regex {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid")
    })
}

async fn contact(
    state: web::Data<AppState>,
    payload: web::Json<ContactRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();

    let required = [
        &payload.first_name,
        &payload.last_name,
        &payload.email,
        &payload.phone_number,
        &payload.patient_date_of_birth,
        &payload.insurance_info,
        &payload.description,
        &payload.location_id,
    ];
    if required
        .iter()
        .any(|field| field.as_deref().map_or(true, |v| v.trim().is_empty()))
    {
        return Err(ApiError::Validation(
            "All required fields must be filled including preferred location".to_string(),
        ));
    }

    let email = payload.email.unwrap_or_default();
    if !email_regex().is_match(&email) {
        return Err(ApiError::Validation("Invalid email format".to_string()));
    }

    let id = new_id();
    sqlx::query(
        r#"INSERT INTO contact_forms
           (id, first_name, last_name, email, phone_number, store_info,
            patient_date_of_birth, insurance_info, description, location_id,
            date, time_slot, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL, ?)"#,
    )
    .bind(&id)
    .bind(payload.first_name)
    .bind(payload.last_name)
    .bind(&email)
    .bind(payload.phone_number)
    .bind(payload.store_info.unwrap_or(false))
    .bind(payload.patient_date_of_birth)
    .bind(payload.insurance_info)
    .bind(payload.description)
    .bind(payload.location_id)
    .bind(now_rfc3339())
    .execute(&state.db)
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Thank you for your submission! We will get back to you soon.",
        "id": id,
    })))
}

async fn active_locations(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let locations: Vec<LocationSummary> = sqlx::query_as(
        "SELECT id, name, address FROM locations WHERE is_active = 1 ORDER BY name ASC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "locations": locations })))
}
