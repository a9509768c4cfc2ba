use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::ApiError;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub time: String,
    pub display: String,
    pub is_available: bool,
    pub is_booked: bool,
}

/// The weekly schedule grid, 30-minute steps, ascending.
/// Mon-Fri: 09:00-11:30 and 13:00-16:30. Saturday: 09:00-17:00.
/// Sunday: 09:00-12:00.
pub fn slot_template(weekday: Weekday) -> Vec<String> {
    match weekday {
        Weekday::Sat => half_hours(9, 0, 17, 0),
        Weekday::Sun => half_hours(9, 0, 12, 0),
        _ => {
            let mut slots = half_hours(9, 0, 11, 30);
            slots.extend(half_hours(13, 0, 16, 30));
            slots
        }
    }
}

fn half_hours(start_hour: u32, start_min: u32, end_hour: u32, end_min: u32) -> Vec<String> {
    let mut slots = Vec::new();
    let mut current = start_hour * 60 + start_min;
    let end = end_hour * 60 + end_min;
    while current <= end {
        slots.push(format!("{:02}:{:02}", current / 60, current % 60));
        current += 30;
    }
    slots
}

/// Renders 24-hour `HH:MM` as `H:MM AM/PM` for the booking widget.
pub fn format_display(time24: &str) -> String {
    let (hours, minutes) = match time24.split_once(':') {
        Some(parts) => parts,
        None => return time24.to_string(),
    };
    let hour: u32 = match hours.parse() {
        Ok(hour) => hour,
        Err(_) => return time24.to_string(),
    };
    let ampm = if hour >= 12 { "PM" } else { "AM" };
    let display_hour = match hour {
        0 => 12,
        h if h > 12 => h - 12,
        h => h,
    };
    format!("{display_hour}:{minutes} {ampm}")
}

/// Computes the slot grid for a location/date. A slot counts as booked only
/// when a contact form exists for it: appointment rows left behind by
/// abandoned reservation attempts must not block the grid.
pub async fn list_slots(
    pool: &SqlitePool,
    location_id: &str,
    date: &str,
) -> Result<Vec<Slot>, ApiError> {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| ApiError::Validation("Invalid date format, expected YYYY-MM-DD".to_string()))?;

    let booked_rows: Vec<(String,)> = sqlx::query_as(
        r#"SELECT time_slot FROM contact_forms
           WHERE location_id = ? AND date = ? AND time_slot IS NOT NULL"#,
    )
    .bind(location_id)
    .bind(date)
    .fetch_all(pool)
    .await?;
    let booked: HashSet<String> = booked_rows.into_iter().map(|(slot,)| slot).collect();

    Ok(slot_template(day.weekday())
        .into_iter()
        .map(|time| Slot {
            display: format_display(&time),
            is_booked: booked.contains(&time),
            // Legacy field kept for existing clients, which key off isBooked.
            is_available: true,
            time,
        })
        .collect())
}
