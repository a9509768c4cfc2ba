use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use serde::Deserialize;
use serde_json::json;
use sqlx::{QueryBuilder, Sqlite};

use crate::{
    auth::{
        admin_validator, bearer_validator, claims_from_header, claims_from_query_or_header,
        create_user, fetch_user_by_email, fetch_user_by_id, new_id, now_rfc3339, TokenClaims,
    },
    db::count_contact_forms_for_location,
    error::ApiError,
    models::{BookingRow, LocationRow, UserView, ROLE_ADMIN, ROLE_USER},
    state::AppState,
};

/// Typed filter for the admin booking list; translated to SQL here rather
/// than letting callers assemble where-clauses.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookingListQuery {
    token: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    location_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteBookingRequest {
    booking_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationPayload {
    name: Option<String>,
    address: Option<String>,
    email: Option<String>,
    is_active: Option<bool>,
}

#[derive(Deserialize)]
struct CreateUserRequest {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            // Bookings do their own token extraction: the GET endpoint also
            // accepts ?token= for dashboard export links.
            .service(
                web::resource("/bookings")
                    .route(web::get().to(list_bookings))
                    .route(web::delete().to(delete_booking)),
            )
            .service(
                web::scope("/locations")
                    .wrap(HttpAuthentication::bearer(bearer_validator))
                    .service(
                        web::resource("")
                            .route(web::get().to(list_locations))
                            .route(web::post().to(create_location)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(update_location))
                            .route(web::delete().to(delete_location)),
                    ),
            )
            .service(
                web::scope("")
                    .wrap(HttpAuthentication::bearer(admin_validator))
                    .service(web::resource("/users").route(web::get().to(list_users)))
                    .service(web::resource("/users/{id}").route(web::delete().to(delete_user)))
                    .service(web::resource("/create-user").route(web::post().to(create_user_as_admin))),
            ),
    );
}

async fn list_bookings(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<BookingListQuery>,
) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner();
    claims_from_query_or_header(&req, query.token.as_deref(), &state.config.jwt_secret)?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT cf.id, cf.first_name, cf.last_name, cf.email, cf.phone_number, \
         cf.patient_date_of_birth, cf.insurance_info, cf.description, cf.location_id, \
         cf.date, cf.time_slot, cf.created_at, \
         l.name AS location_name, l.address AS location_address \
         FROM contact_forms cf \
         JOIN locations l ON cf.location_id = l.id \
         WHERE 1 = 1",
    );
    if let Some(start) = query.start_date.filter(|v| !v.trim().is_empty()) {
        qb.push(" AND cf.created_at >= ");
        qb.push_bind(format!("{start}T00:00:00Z"));
    }
    if let Some(end) = query.end_date.filter(|v| !v.trim().is_empty()) {
        qb.push(" AND cf.created_at <= ");
        qb.push_bind(format!("{end}T23:59:59Z"));
    }
    if let Some(location_id) = query.location_id.filter(|v| !v.trim().is_empty()) {
        qb.push(" AND cf.location_id = ");
        qb.push_bind(location_id);
    }
    qb.push(" ORDER BY cf.created_at DESC");

    let rows: Vec<BookingRow> = qb.build_query_as().fetch_all(&state.db).await?;

    let count = rows.len();
    let bookings: Vec<_> = rows
        .into_iter()
        .map(|row| {
            json!({
                "id": row.id,
                "firstName": row.first_name,
                "lastName": row.last_name,
                "email": row.email,
                "phoneNumber": row.phone_number,
                "patientDateOfBirth": row.patient_date_of_birth,
                "insuranceInfo": row.insurance_info,
                "description": row.description,
                "date": row.date,
                "timeSlot": row.time_slot,
                "createdAt": row.created_at,
                "location": {
                    "id": row.location_id,
                    "name": row.location_name,
                    "address": row.location_address,
                },
            })
        })
        .collect();

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "bookings": bookings,
        "count": count,
    })))
}

async fn delete_booking(
    req: HttpRequest,
    state: web::Data<AppState>,
    payload: web::Json<DeleteBookingRequest>,
) -> Result<HttpResponse, ApiError> {
    claims_from_header(&req, &state.config.jwt_secret)?;

    let booking_id = payload
        .into_inner()
        .booking_id
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Booking ID is required".to_string()))?;

    let booking: Option<(String, Option<String>, Option<String>)> = sqlx::query_as(
        "SELECT location_id, date, time_slot FROM contact_forms WHERE id = ? LIMIT 1",
    )
    .bind(&booking_id)
    .fetch_optional(&state.db)
    .await?;

    let Some((location_id, date, time_slot)) = booking else {
        return Err(ApiError::NotFound("Booking not found".to_string()));
    };

    // Free the slot lock together with the human record so the slot can be
    // rebooked immediately.
    let mut tx = state.db.begin().await?;
    sqlx::query("DELETE FROM contact_forms WHERE id = ?")
        .bind(&booking_id)
        .execute(&mut *tx)
        .await?;
    if let (Some(date), Some(time_slot)) = (date, time_slot) {
        sqlx::query(
            "UPDATE appointments SET is_booked = 0 WHERE location_id = ? AND date = ? AND time_slot = ?",
        )
        .bind(&location_id)
        .bind(date)
        .bind(time_slot)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Booking deleted successfully",
    })))
}

async fn list_locations(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let locations: Vec<LocationRow> = sqlx::query_as(
        "SELECT id, name, address, email, is_active, created_at FROM locations ORDER BY created_at DESC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "locations": locations })))
}

async fn create_location(
    state: web::Data<AppState>,
    payload: web::Json<LocationPayload>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let name = payload
        .name
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Location name is required".to_string()))?;

    let duplicate: Option<(String,)> =
        sqlx::query_as("SELECT id FROM locations WHERE name = ? LIMIT 1")
            .bind(&name)
            .fetch_optional(&state.db)
            .await?;
    if duplicate.is_some() {
        return Err(ApiError::Conflict(
            "Location with this name already exists".to_string(),
        ));
    }

    let location = LocationRow {
        id: new_id(),
        name,
        address: payload.address.filter(|v| !v.trim().is_empty()),
        email: payload.email.filter(|v| !v.trim().is_empty()),
        is_active: true,
        created_at: now_rfc3339(),
    };
    sqlx::query(
        r#"INSERT INTO locations (id, name, address, email, is_active, created_at)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&location.id)
    .bind(&location.name)
    .bind(&location.address)
    .bind(&location.email)
    .bind(location.is_active)
    .bind(&location.created_at)
    .execute(&state.db)
    .await?;

    let message = format!("Location \"{}\" created successfully", location.name);
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "location": location,
        "message": message,
    })))
}

async fn update_location(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<LocationPayload>,
) -> Result<HttpResponse, ApiError> {
    let location_id = path.into_inner();
    let payload = payload.into_inner();
    let name = payload
        .name
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Location name is required".to_string()))?;

    let existing: Option<(String,)> =
        sqlx::query_as("SELECT id FROM locations WHERE id = ? LIMIT 1")
            .bind(&location_id)
            .fetch_optional(&state.db)
            .await?;
    if existing.is_none() {
        return Err(ApiError::NotFound("Location not found".to_string()));
    }

    let duplicate: Option<(String,)> =
        sqlx::query_as("SELECT id FROM locations WHERE name = ? AND id != ? LIMIT 1")
            .bind(&name)
            .bind(&location_id)
            .fetch_optional(&state.db)
            .await?;
    if duplicate.is_some() {
        return Err(ApiError::Conflict(
            "Location with this name already exists".to_string(),
        ));
    }

    sqlx::query(
        r#"UPDATE locations SET name = ?, address = ?, email = ?, is_active = ? WHERE id = ?"#,
    )
    .bind(&name)
    .bind(payload.address.as_ref().filter(|v| !v.trim().is_empty()))
    .bind(payload.email.as_ref().filter(|v| !v.trim().is_empty()))
    .bind(payload.is_active.unwrap_or(true))
    .bind(&location_id)
    .execute(&state.db)
    .await?;

    let location: LocationRow = sqlx::query_as(
        "SELECT id, name, address, email, is_active, created_at FROM locations WHERE id = ?",
    )
    .bind(&location_id)
    .fetch_one(&state.db)
    .await?;

    let message = format!("Location \"{}\" updated successfully", location.name);
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "location": location,
        "message": message,
    })))
}

async fn delete_location(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let location_id = path.into_inner();

    let location: Option<(String,)> =
        sqlx::query_as("SELECT name FROM locations WHERE id = ? LIMIT 1")
            .bind(&location_id)
            .fetch_optional(&state.db)
            .await?;
    let Some((name,)) = location else {
        return Err(ApiError::NotFound("Location not found".to_string()));
    };

    let dependents = count_contact_forms_for_location(&state.db, &location_id).await?;
    if dependents > 0 {
        return Err(ApiError::Validation(format!(
            "Cannot delete location \"{name}\" because it has {dependents} associated contact form(s). \
             Please reassign or delete the contact forms first."
        )));
    }

    sqlx::query("DELETE FROM locations WHERE id = ?")
        .bind(&location_id)
        .execute(&state.db)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!("Location \"{name}\" has been deleted successfully"),
    })))
}

async fn list_users(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let users: Vec<UserView> = sqlx::query_as(
        "SELECT id, email, name, role, created_at, updated_at FROM users ORDER BY created_at DESC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "users": users })))
}

async fn create_user_as_admin(
    state: web::Data<AppState>,
    payload: web::Json<CreateUserRequest>,
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

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "user": {
            "id": user.id,
            "email": user.email,
            "name": user.name,
        },
    })))
}

async fn delete_user(
    state: web::Data<AppState>,
    claims: web::ReqData<TokenClaims>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user_id = path.into_inner();

    if user_id == claims.user_id {
        return Err(ApiError::Validation(
            "Cannot delete your own account".to_string(),
        ));
    }

    let target = fetch_user_by_id(&state.db, &user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    if target.role == ROLE_ADMIN {
        return Err(ApiError::Forbidden("Cannot delete admin users".to_string()));
    }

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(&user_id)
        .execute(&state.db)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!("User {} has been deleted successfully", target.email),
    })))
}
