use actix_web::{web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::bearer_validator,
    booking::{self, BookingRequest},
    error::ApiError,
    models::BookingRow,
    slots,
    state::AppState,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SlotsQuery {
    location_id: Option<String>,
    date: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/appointments")
            .service(web::resource("/book").route(web::post().to(book)))
            .service(web::resource("/slots").route(web::get().to(list_slots)))
            .service(
                web::scope("")
                    .wrap(HttpAuthentication::bearer(bearer_validator))
                    .service(web::resource("/date/{date}").route(web::get().to(by_date)))
                    .service(web::resource("/{id}").route(web::get().to(detail))),
            ),
    );
}

async fn book(
    state: web::Data<AppState>,
    payload: web::Json<BookingRequest>,
) -> Result<HttpResponse, ApiError> {
    let outcome = booking::book(&state.db, &payload).await?;
    let form = outcome.contact_form;

    // Notifications are best-effort and must not delay or fail the booking.
    if state.mailer.enabled() {
        let mailer = state.mailer.clone();
        let pool = state.db.clone();
        let mail_form = form.clone();
        actix_web::rt::spawn(async move {
            let (booker_sent, location_sent) = tokio::join!(
                mailer.notify_booker(&mail_form),
                mailer.notify_location(&pool, &mail_form)
            );
            if !booker_sent || !location_sent {
                log::warn!(
                    "Booking {} confirmed but not all notification emails were sent",
                    mail_form.id
                );
            }
        });
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "appointmentId": outcome.appointment_id,
        "contactFormId": form.id,
        "message": "Appointment booked successfully!",
    })))
}

async fn list_slots(
    state: web::Data<AppState>,
    query: web::Query<SlotsQuery>,
) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner();
    let (Some(location_id), Some(date)) = (
        query.location_id.filter(|v| !v.trim().is_empty()),
        query.date.filter(|v| !v.trim().is_empty()),
    ) else {
        return Err(ApiError::Validation(
            "Location ID and date are required".to_string(),
        ));
    };

    let slots = slots::list_slots(&state.db, &location_id, &date).await?;
    Ok(HttpResponse::Ok().json(json!({ "slots": slots })))
}

const BOOKING_COLUMNS: &str =
    "cf.id, cf.first_name, cf.last_name, cf.email, cf.phone_number, \
     cf.patient_date_of_birth, cf.insurance_info, cf.description, cf.location_id, \
     cf.date, cf.time_slot, cf.created_at, \
     l.name AS location_name, l.address AS location_address";

async fn detail(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let row: Option<BookingRow> = sqlx::query_as(&format!(
        r#"SELECT {BOOKING_COLUMNS}
           FROM contact_forms cf
           JOIN locations l ON cf.location_id = l.id
           WHERE cf.id = ?
           LIMIT 1"#
    ))
    .bind(&id)
    .fetch_optional(&state.db)
    .await?;

    let row = row.ok_or_else(|| ApiError::NotFound("Appointment not found".to_string()))?;

    Ok(HttpResponse::Ok().json(json!({
        "appointment": {
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
            "locationId": row.location_id,
            "locationName": row.location_name,
            "createdAt": row.created_at,
        }
    })))
}

async fn by_date(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let date = path.into_inner();
    let rows: Vec<BookingRow> = sqlx::query_as(&format!(
        r#"SELECT {BOOKING_COLUMNS}
           FROM contact_forms cf
           JOIN locations l ON cf.location_id = l.id
           WHERE cf.date = ?
           ORDER BY cf.time_slot ASC"#
    ))
    .bind(&date)
    .fetch_all(&state.db)
    .await?;

    let appointments: Vec<_> = rows
        .into_iter()
        .map(|row| {
            json!({
                "id": row.id,
                "firstName": row.first_name,
                "lastName": row.last_name,
                "date": row.date,
                "timeSlot": row.time_slot,
                "locationId": row.location_id,
                "locationName": row.location_name,
            })
        })
        .collect();

    Ok(HttpResponse::Ok().json(json!({ "appointments": appointments })))
}
