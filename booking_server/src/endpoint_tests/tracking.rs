use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use booking_engine::{
    db_types::{OrderStatusType, Service},
    order_objects::OrderSummary,
    TrackingApi,
};
use chrono::Utc;
use studio_common::Rupiah;

use super::{
    helpers::{order, send_request},
    mocks::MockBookingStore,
};
use crate::routes::TrackRoute;

fn configure_tracking(store: MockBookingStore) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.service(TrackRoute::<MockBookingStore>::new()).app_data(web::Data::new(TrackingApi::new(store)));
    }
}

#[actix_web::test]
async fn tracking_needs_no_principal() {
    let _ = env_logger::try_init().ok();
    let mut store = MockBookingStore::new();
    store
        .expect_fetch_order_by_tracking_code()
        .withf(|code| code.as_str() == "TRK-ABCD-EFGH-JKMN")
        .times(1)
        .returning(|_| Ok(Some(order("alice", OrderStatusType::Validated))));
    store.expect_fetch_service().returning(|id| {
        Ok(Some(Service {
            id,
            name: "Wedding Photography".into(),
            category: "photography".into(),
            base_price: Rupiah::from(1_000_000),
            created_at: Utc::now(),
        }))
    });
    let req = TestRequest::get().uri("/track/trk-abcd-efgh-jkmn");
    let (status, body) = send_request(req, configure_tracking(store)).await;
    assert_eq!(status, StatusCode::OK);
    let summary: OrderSummary = serde_json::from_str(&body).unwrap();
    assert_eq!(summary.booking_code.as_str(), "BK-202610-00001");
    assert_eq!(summary.status, OrderStatusType::Validated);
    assert_eq!(summary.service_name, "Wedding Photography");
    // The public view carries no customer data or amounts
    assert!(!body.contains("alice"));
    assert!(!body.contains("1000000"));
    assert!(!body.contains("Ubud"));
}

#[actix_web::test]
async fn unknown_and_malformed_codes_look_the_same() {
    let _ = env_logger::try_init().ok();
    let mut store = MockBookingStore::new();
    store.expect_fetch_order_by_tracking_code().times(1).returning(|_| Ok(None));
    let req = TestRequest::get().uri("/track/TRK-ZZZZ-ZZZZ-ZZZZ");
    let (status, unknown) = send_request(req, configure_tracking(store)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Malformed codes never reach the database
    let req = TestRequest::get().uri("/track/not-a-code");
    let (status, malformed) = send_request(req, configure_tracking(MockBookingStore::new())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(unknown, malformed);
}
