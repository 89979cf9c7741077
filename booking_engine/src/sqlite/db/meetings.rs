use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqliteConnection;

use super::is_unique_violation;
use crate::{
    db_types::{Meeting, MeetingStatus, NewMeeting},
    traits::BookingError,
};

pub async fn fetch_meeting(id: i64, conn: &mut SqliteConnection) -> Result<Option<Meeting>, sqlx::Error> {
    let meeting = sqlx::query_as("SELECT * FROM meetings WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(meeting)
}

pub async fn fetch_meeting_by_link_ref(
    link_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Meeting>, sqlx::Error> {
    let meeting =
        sqlx::query_as("SELECT * FROM meetings WHERE link_ref = $1").bind(link_ref).fetch_optional(conn).await?;
    Ok(meeting)
}

pub async fn fetch_meetings_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Meeting>, sqlx::Error> {
    let meetings = sqlx::query_as("SELECT * FROM meetings WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(meetings)
}

pub(crate) async fn insert_meeting(
    order_id: i64,
    meeting: NewMeeting,
    conn: &mut SqliteConnection,
) -> Result<Meeting, BookingError> {
    let link_ref = meeting.link_ref.clone();
    let now = Utc::now();
    let result = sqlx::query_as(
        r#"
            INSERT INTO meetings (order_id, link_ref, contact_name, contact_email, contact_phone, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(meeting.link_ref)
    .bind(meeting.contact_name)
    .bind(meeting.contact_email)
    .bind(meeting.contact_phone)
    .bind(now)
    .fetch_one(conn)
    .await;
    match result {
        Ok(meeting) => Ok(meeting),
        Err(e) if is_unique_violation(&e) => {
            debug!("🗃️ Meeting [{link_ref}] for order #{order_id} clashes with an existing one. {e}");
            Err(BookingError::MeetingAlreadyActive(format!(
                "Order #{order_id} already has an active meeting, or link {link_ref} is already in use"
            )))
        },
        Err(e) => Err(e.into()),
    }
}

pub(crate) async fn update_meeting(
    id: i64,
    status: MeetingStatus,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    conn: &mut SqliteConnection,
) -> Result<Meeting, sqlx::Error> {
    let meeting = sqlx::query_as(
        "UPDATE meetings SET status = $1, start_time = $2, end_time = $3, updated_at = $4 WHERE id = $5 RETURNING *",
    )
    .bind(status)
    .bind(start_time)
    .bind(end_time)
    .bind(Utc::now())
    .bind(id)
    .fetch_one(conn)
    .await?;
    Ok(meeting)
}
