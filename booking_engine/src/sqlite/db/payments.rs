use chrono::Utc;
use log::*;
use sqlx::SqliteConnection;
use studio_common::Rupiah;

use super::is_unique_violation;
use crate::{
    db_types::{NewPayment, Payment, PaymentStatus},
    traits::BookingError,
};

/// Payment records for the order, in the order they were recorded.
pub async fn fetch_payments_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Payment>, sqlx::Error> {
    let payments = sqlx::query_as("SELECT * FROM payments WHERE order_id = $1 ORDER BY sequence ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(payments)
}

pub async fn fetch_payment(id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as("SELECT * FROM payments WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(payment)
}

/// Inserts a pending payment record. The caller has already validated the amount and picked the sequence number.
///
/// The partial unique index on (order, kind) for active records turns a racing duplicate into
/// [`BookingError::DuplicatePayment`]. A clash on the sequence number means another payment got in first, and is
/// reported as a concurrent modification.
pub(crate) async fn insert_payment(
    order_id: i64,
    sequence: i64,
    payment: NewPayment,
    percentage: u32,
    remaining_balance: Rupiah,
    conn: &mut SqliteConnection,
) -> Result<Payment, BookingError> {
    let kind = payment.kind;
    let now = Utc::now();
    let result = sqlx::query_as(
        r#"
            INSERT INTO payments (
                order_id,
                kind,
                sequence,
                amount,
                percentage,
                method,
                proof_ref,
                verified,
                status,
                remaining_balance,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, 'pending', $8, $9, $9)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(payment.kind)
    .bind(sequence)
    .bind(payment.amount)
    .bind(i64::from(percentage))
    .bind(payment.method)
    .bind(payment.proof_ref)
    .bind(remaining_balance)
    .bind(now)
    .fetch_one(conn)
    .await;
    match result {
        Ok(payment) => Ok(payment),
        Err(e) if is_unique_violation(&e) && e.to_string().contains("payments.sequence") => {
            debug!("🗃️ Payment sequence {sequence} for order #{order_id} was taken by another request. {e}");
            Err(BookingError::ConcurrentModification(format!("Payment sequence {sequence} is already taken")))
        },
        Err(e) if is_unique_violation(&e) => {
            debug!("🗃️ A {kind} payment for order #{order_id} already exists. {e}");
            Err(BookingError::DuplicatePayment(kind))
        },
        Err(e) => Err(e.into()),
    }
}

/// Moves a pending payment to `paid` (verified) or `failed`. Returns `None` if the payment is no longer pending.
pub(crate) async fn close_pending_payment(
    id: i64,
    approve: bool,
    verified_by: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let status = if approve { PaymentStatus::Paid } else { PaymentStatus::Failed };
    let payment = sqlx::query_as(
        "UPDATE payments SET status = $1, verified = $2, verified_by = $3, updated_at = $4 WHERE id = $5 AND status = \
         'pending' RETURNING *",
    )
    .bind(status)
    .bind(approve)
    .bind(verified_by)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

pub(crate) async fn set_remaining_balance(
    id: i64,
    balance: Rupiah,
    conn: &mut SqliteConnection,
) -> Result<Payment, sqlx::Error> {
    let payment = sqlx::query_as("UPDATE payments SET remaining_balance = $1 WHERE id = $2 RETURNING *")
        .bind(balance)
        .bind(id)
        .fetch_one(conn)
        .await?;
    Ok(payment)
}
