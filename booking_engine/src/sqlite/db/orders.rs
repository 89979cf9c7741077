use chrono::Utc;
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};
use studio_common::Rupiah;

use crate::{
    db_types::{BookingCode, NewOrder, Order, OrderStatusType, TrackingCode},
    order_objects::OrderQueryFilter,
    traits::BookingError,
};

/// Inserts a new order into the database using the given connection. This is not atomic. Run it inside a transaction
/// together with code issuance and pass `&mut tx` as the connection argument.
pub async fn insert_order(
    order: NewOrder,
    booking_code: &BookingCode,
    tracking_code: &TrackingCode,
    conn: &mut SqliteConnection,
) -> Result<Order, sqlx::Error> {
    let now = Utc::now();
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                booking_code,
                tracking_code,
                customer_id,
                service_id,
                event_name,
                event_date,
                event_end_date,
                event_time,
                location,
                requirements,
                total_price,
                currency,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
            RETURNING *;
        "#,
    )
    .bind(booking_code.as_str())
    .bind(tracking_code.as_str())
    .bind(order.customer_id)
    .bind(order.service_id)
    .bind(order.event_name)
    .bind(order.event_date)
    .bind(order.event_end_date)
    .bind(order.event_time)
    .bind(order.location)
    .bind(order.requirements)
    .bind(order.total_price)
    .bind(order.currency)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Order {} inserted with id {}", order.booking_code, order.id);
    Ok(order)
}

pub async fn fetch_order_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_booking_code(
    code: &BookingCode,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE booking_code = $1").bind(code.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_tracking_code(
    code: &TrackingCode,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE tracking_code = $1").bind(code.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in ascending order
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(code) = query.booking_code {
        where_clause.push("booking_code = ");
        where_clause.push_bind_unseparated(code.0);
    }
    if let Some(cid) = query.customer_id {
        where_clause.push("customer_id = ");
        where_clause.push_bind_unseparated(cid);
    }
    if let Some(service_id) = query.service_id {
        where_clause.push("service_id = ");
        where_clause.push_bind_unseparated(service_id);
    }
    if let Some(statuses) = query.status.filter(|s| !s.is_empty()) {
        let status_clause = statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<String>>().join(",");
        where_clause.push(format!("status IN ({status_clause})"));
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC, id ASC");

    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_orders: {}", orders.len());
    Ok(orders)
}

/// Writes a new status (and the matching lifecycle timestamp), provided nobody has touched the order since `version`.
pub(crate) async fn update_order_status(
    id: i64,
    version: i64,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Order, BookingError> {
    let stamp_column = match status {
        OrderStatusType::AwaitingValidation => "updated_at",
        OrderStatusType::Validated => "validated_at",
        OrderStatusType::Cancelled => "cancelled_at",
        OrderStatusType::Settled => "settled_at",
        OrderStatusType::Archived => "archived_at",
    };
    let sql = format!(
        "UPDATE orders SET status = $1, version = version + 1, updated_at = $2, {stamp_column} = $2 WHERE id = $3 AND \
         version = $4 RETURNING *"
    );
    let result: Option<Order> = sqlx::query_as(&sql)
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .bind(version)
        .fetch_optional(conn)
        .await?;
    trace!("🗃️ Order #{id} status update to {status}: {}", if result.is_some() { "ok" } else { "version conflict" });
    result.ok_or_else(|| version_conflict(id, version))
}

/// Re-quotes an order that is still awaiting validation.
pub(crate) async fn update_total_price(
    id: i64,
    version: i64,
    total: Rupiah,
    conn: &mut SqliteConnection,
) -> Result<Order, BookingError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET total_price = $1, version = version + 1, updated_at = $2 WHERE id = $3 AND version = $4 AND \
         status = 'awaiting_validation' RETURNING *",
    )
    .bind(total)
    .bind(Utc::now())
    .bind(id)
    .bind(version)
    .fetch_optional(conn)
    .await?;
    result.ok_or_else(|| version_conflict(id, version))
}

/// Bumps the order version without changing anything else. Ledger writes call this so that they conflict with
/// concurrent lifecycle transitions on the same order.
pub(crate) async fn touch_order(id: i64, version: i64, conn: &mut SqliteConnection) -> Result<Order, BookingError> {
    let result: Option<Order> = sqlx::query_as(
        "UPDATE orders SET version = version + 1, updated_at = $1 WHERE id = $2 AND version = $3 RETURNING *",
    )
    .bind(Utc::now())
    .bind(id)
    .bind(version)
    .fetch_optional(conn)
    .await?;
    result.ok_or_else(|| version_conflict(id, version))
}

fn version_conflict(id: i64, version: i64) -> BookingError {
    debug!("🗃️ Order #{id} is no longer at version {version}");
    BookingError::ConcurrentModification(format!("Order #{id} has changed since version {version}"))
}
