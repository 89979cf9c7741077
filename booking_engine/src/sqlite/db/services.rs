use chrono::Utc;
use sqlx::SqliteConnection;

use crate::db_types::{NewService, Service};

pub async fn insert_service(service: NewService, conn: &mut SqliteConnection) -> Result<Service, sqlx::Error> {
    let service = sqlx::query_as(
        "INSERT INTO services (name, category, base_price, created_at) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(service.name)
    .bind(service.category)
    .bind(service.base_price)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(service)
}

pub async fn fetch_service(id: i64, conn: &mut SqliteConnection) -> Result<Option<Service>, sqlx::Error> {
    let service = sqlx::query_as("SELECT * FROM services WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(service)
}

pub async fn fetch_services(conn: &mut SqliteConnection) -> Result<Vec<Service>, sqlx::Error> {
    let services = sqlx::query_as("SELECT * FROM services ORDER BY category, name").fetch_all(conn).await?;
    Ok(services)
}
