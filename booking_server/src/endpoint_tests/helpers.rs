use actix_web::{
    body::to_bytes,
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use booking_engine::db_types::{BookingCode, Order, OrderStatusType, TrackingCode};
use chrono::{NaiveDate, TimeZone, Utc};
use log::debug;
use studio_common::{Rupiah, Secret};

use crate::auth::{AdminCredentials, ADMIN_KEY_HEADER, PRINCIPAL_HEADER};

pub const ADMIN_KEY: &str = "test-admin-key";

pub fn as_customer(req: TestRequest, id: &str) -> TestRequest {
    req.insert_header((PRINCIPAL_HEADER, id))
}

pub fn as_admin(req: TestRequest) -> TestRequest {
    req.insert_header((PRINCIPAL_HEADER, "staff")).insert_header((ADMIN_KEY_HEADER, ADMIN_KEY))
}

/// Sends `req` to an app set up by `configure`. Errors raised by middleware are turned into responses the way the
/// HTTP dispatcher would.
pub async fn send_request<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let credentials = AdminCredentials::new(Secret::new(ADMIN_KEY.to_string()));
    let app = App::new().app_data(web::Data::new(credentials)).configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = to_bytes(res.into_body()).await.unwrap();
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}

pub fn order(customer_id: &str, status: OrderStatusType) -> Order {
    let created_at = Utc.with_ymd_and_hms(2026, 10, 1, 8, 30, 0).unwrap();
    Order {
        id: 1,
        booking_code: BookingCode("BK-202610-00001".into()),
        tracking_code: TrackingCode("TRK-ABCD-EFGH-JKMN".into()),
        customer_id: customer_id.into(),
        service_id: 1,
        event_name: "Wedding of A & B".into(),
        event_date: NaiveDate::from_ymd_opt(2026, 12, 12).unwrap(),
        event_end_date: None,
        event_time: Some("09:00".into()),
        location: "Ubud, Bali".into(),
        requirements: None,
        total_price: Rupiah::from(1_000_000),
        currency: "IDR".into(),
        status,
        version: 1,
        created_at,
        updated_at: created_at,
        validated_at: None,
        cancelled_at: None,
        settled_at: None,
        archived_at: None,
    }
}
