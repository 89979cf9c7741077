use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqliteConnection;

use super::is_unique_violation;
use crate::{
    db_types::{DocumentRecord, DocumentTarget},
    traits::BookingError,
};

pub async fn fetch_documents_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<DocumentRecord>, sqlx::Error> {
    let docs = sqlx::query_as("SELECT * FROM documents WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(docs)
}

/// Creates a pending document record. A clash with an existing record of the same kind (or receipt for the same
/// payment) is reported as [`BookingError::DocumentNotAvailable`].
pub(crate) async fn insert_claim(
    order_id: i64,
    target: DocumentTarget,
    issued_by: &str,
    conn: &mut SqliteConnection,
) -> Result<DocumentRecord, BookingError> {
    let now = Utc::now();
    let result = sqlx::query_as(
        r#"
            INSERT INTO documents (order_id, payment_id, kind, status, issued_by, created_at, updated_at)
            VALUES ($1, $2, $3, 'pending', $4, $5, $5)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(target.payment_id())
    .bind(target.kind())
    .bind(issued_by)
    .bind(now)
    .fetch_one(conn)
    .await;
    match result {
        Ok(doc) => Ok(doc),
        Err(e) if is_unique_violation(&e) => {
            debug!("🗃️ The {target} for order #{order_id} has already been claimed. {e}");
            Err(BookingError::DocumentNotAvailable(target))
        },
        Err(e) => Err(e.into()),
    }
}

/// Marks a pending document as issued. Returns `None` if there is no pending record with this id.
pub(crate) async fn mark_issued(
    id: i64,
    artifact_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<DocumentRecord>, sqlx::Error> {
    let doc = sqlx::query_as(
        "UPDATE documents SET status = 'issued', artifact_ref = $1, updated_at = $2 WHERE id = $3 AND status = \
         'pending' RETURNING *",
    )
    .bind(artifact_ref)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(doc)
}

/// Removes a pending claim. Issued documents are never removed.
pub(crate) async fn delete_claim(id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM documents WHERE id = $1 AND status = 'pending'").bind(id).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

/// Removes the order's pending claims that were created before `stale_before`. Returns how many were removed.
pub(crate) async fn delete_stale_claims(
    order_id: i64,
    stale_before: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            DELETE FROM documents
            WHERE order_id = $1 AND status = 'pending' AND julianday(created_at) < julianday($2);
        "#,
    )
    .bind(order_id)
    .bind(stale_before)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
