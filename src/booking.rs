use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{
    auth::{new_id, now_rfc3339},
    error::ApiError,
    models::ContactFormRow,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub location_id: String,
    pub date: String,
    pub time_slot: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub patient_date_of_birth: String,
    pub insurance_info: String,
    pub description: String,
}

#[derive(Debug)]
pub struct BookingOutcome {
    pub appointment_id: String,
    pub contact_form: ContactFormRow,
}

/// Reserves a slot and records the contact submission in one transaction.
///
/// The UNIQUE(location_id, date, time_slot) constraint is the sole arbiter
/// of slot ownership: the upsert only flips `is_booked` on rows that are not
/// already booked, so two racing requests cannot both win. There is no
/// separate pre-read to go stale.
pub async fn book(pool: &SqlitePool, request: &BookingRequest) -> Result<BookingOutcome, ApiError> {
    validate(request)?;

    let mut tx = pool.begin().await?;

    let reserved: Option<(String,)> = sqlx::query_as(
        r#"INSERT INTO appointments (id, location_id, date, time_slot, is_booked)
           VALUES (?, ?, ?, ?, 1)
           ON CONFLICT (location_id, date, time_slot)
           DO UPDATE SET is_booked = 1 WHERE is_booked = 0
           RETURNING id"#,
    )
    .bind(new_id())
    .bind(&request.location_id)
    .bind(&request.date)
    .bind(&request.time_slot)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((appointment_id,)) = reserved else {
        return Err(ApiError::Conflict(
            "This time slot is no longer available".to_string(),
        ));
    };

    let contact_form = ContactFormRow {
        id: new_id(),
        first_name: request.first_name.clone(),
        last_name: request.last_name.clone(),
        email: request.email.clone(),
        phone_number: request.phone_number.clone(),
        store_info: false,
        patient_date_of_birth: request.patient_date_of_birth.clone(),
        insurance_info: request.insurance_info.clone(),
        description: request.description.clone(),
        location_id: request.location_id.clone(),
        date: Some(request.date.clone()),
        time_slot: Some(request.time_slot.clone()),
        created_at: now_rfc3339(),
    };

    sqlx::query(
        r#"INSERT INTO contact_forms
           (id, first_name, last_name, email, phone_number, store_info,
            patient_date_of_birth, insurance_info, description, location_id,
            date, time_slot, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&contact_form.id)
    .bind(&contact_form.first_name)
    .bind(&contact_form.last_name)
    .bind(&contact_form.email)
    .bind(&contact_form.phone_number)
    .bind(contact_form.store_info)
    .bind(&contact_form.patient_date_of_birth)
    .bind(&contact_form.insurance_info)
    .bind(&contact_form.description)
    .bind(&contact_form.location_id)
    .bind(&contact_form.date)
    .bind(&contact_form.time_slot)
    .bind(&contact_form.created_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(BookingOutcome {
        appointment_id,
        contact_form,
    })
}

fn validate(request: &BookingRequest) -> Result<(), ApiError> {
    let required = [
        &request.location_id,
        &request.date,
        &request.time_slot,
        &request.first_name,
        &request.last_name,
        &request.email,
        &request.phone_number,
        &request.patient_date_of_birth,
        &request.insurance_info,
        &request.description,
    ];
    if required.iter().any(|field| field.trim().is_empty()) {
        return Err(ApiError::Validation(
            "All required fields must be provided".to_string(),
        ));
    }
    NaiveDate::parse_from_str(&request.date, "%Y-%m-%d")
        .map_err(|_| ApiError::Validation("Invalid date format, expected YYYY-MM-DD".to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> BookingRequest {
        BookingRequest {
            location_id: "loc1".into(),
            date: "2025-03-10".into(),
            time_slot: "09:00".into(),
            first_name: "Jamie".into(),
            last_name: "Rivera".into(),
            email: "jamie@example.com".into(),
            phone_number: "555-0100".into(),
            patient_date_of_birth: "1990-01-15".into(),
            insurance_info: "Acme Health".into(),
            description: "Mole check".into(),
        }
    }

    #[test]
    fn complete_request_passes_validation() {
        assert!(validate(&sample_request()).is_ok());
    }

    #[test]
    fn blank_field_fails_validation() {
        let mut request = sample_request();
        request.phone_number = "   ".into();
        assert!(matches!(
            validate(&request),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn malformed_date_fails_validation() {
        let mut request = sample_request();
        request.date = "10/03/2025".into();
        assert!(matches!(
            validate(&request),
            Err(ApiError::Validation(_))
        ));
    }
}
