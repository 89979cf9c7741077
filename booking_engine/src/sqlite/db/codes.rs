use chrono::Utc;
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{BookingCode, TrackingCode},
    helpers::{format_booking_code, new_tracking_code, MAX_CODE_ATTEMPTS},
    traits::BookingError,
};

const BOOKING_SEQUENCE: &str = "booking_code";

/// Atomically increments the named counter and returns its new value. Counters start at 1.
pub async fn next_sequence_value(name: &str, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO code_sequences (name, value) VALUES ($1, 1)
        ON CONFLICT(name) DO UPDATE SET value = code_sequences.value + 1
        RETURNING value
        "#,
    )
    .bind(name)
    .fetch_one(conn)
    .await?;
    Ok(value)
}

pub async fn issue_booking_code(conn: &mut SqliteConnection) -> Result<BookingCode, BookingError> {
    let seq = next_sequence_value(BOOKING_SEQUENCE, conn).await?;
    let code = format_booking_code(Utc::now(), seq);
    trace!("🗃️ Issued booking code {code}");
    Ok(code)
}

pub async fn tracking_code_exists(code: &TrackingCode, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE tracking_code = $1")
        .bind(code.as_str())
        .fetch_one(conn)
        .await?;
    Ok(count > 0)
}

pub async fn issue_tracking_code(conn: &mut SqliteConnection) -> Result<TrackingCode, BookingError> {
    issue_tracking_code_with(new_tracking_code, conn).await
}

/// Draws codes from `generate` until one is not in use, giving up after [`MAX_CODE_ATTEMPTS`] collisions.
pub async fn issue_tracking_code_with<F>(mut generate: F, conn: &mut SqliteConnection) -> Result<TrackingCode, BookingError>
where F: FnMut() -> TrackingCode {
    for attempt in 1..=MAX_CODE_ATTEMPTS {
        let code = generate();
        if !tracking_code_exists(&code, conn).await? {
            return Ok(code);
        }
        warn!("🗃️ Tracking code collision on attempt {attempt} of {MAX_CODE_ATTEMPTS}");
    }
    error!("🗃️ Could not issue a unique tracking code after {MAX_CODE_ATTEMPTS} attempts");
    Err(BookingError::IdentifierExhausted("tracking".into()))
}
