use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use booking_engine::{
    db_types::{Order, OrderStatusType},
    events::EventProducers,
    ledger::{InstallmentPolicy, PaymentMethodRegistry},
    state_machine::OrderTransition,
    traits::BookingError,
    LedgerApi,
    OrderFlowApi,
};
use studio_common::Rupiah;

use super::{
    helpers::{as_admin, as_customer, order, send_request},
    mocks::MockBookingStore,
};
use crate::{
    auth::ADMIN_KEY_HEADER,
    routes::{CreateOrderRoute, MyOrdersRoute, OrderRoute, RecordPaymentRoute, ValidateOrderRoute, VerifyPaymentRoute},
};

fn configure_orders(store: MockBookingStore) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let api = OrderFlowApi::new(store, EventProducers::default());
        cfg.service(MyOrdersRoute::<MockBookingStore>::new())
            .service(CreateOrderRoute::<MockBookingStore>::new())
            .service(OrderRoute::<MockBookingStore>::new())
            .service(ValidateOrderRoute::<MockBookingStore>::new())
            .app_data(web::Data::new(api));
    }
}

fn store_with_order(owner: &'static str, status: OrderStatusType) -> MockBookingStore {
    let mut store = MockBookingStore::new();
    store.expect_fetch_order_by_booking_code().returning(move |_| Ok(Some(order(owner, status))));
    store
}

#[actix_web::test]
async fn fetch_my_orders_no_headers() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::get().uri("/orders");
    let (status, body) = send_request(req, configure_orders(MockBookingStore::new())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("X-Booking-Principal"));
}

#[actix_web::test]
async fn fetch_my_orders() {
    let _ = env_logger::try_init().ok();
    let mut store = MockBookingStore::new();
    store
        .expect_fetch_orders_for_customer()
        .withf(|id| id == "alice")
        .times(1)
        .returning(|_| Ok(vec![order("alice", OrderStatusType::AwaitingValidation)]));
    let req = as_customer(TestRequest::get().uri("/orders"), "alice");
    let (status, body) = send_request(req, configure_orders(store)).await;
    assert_eq!(status, StatusCode::OK);
    let orders: Vec<Order> = serde_json::from_str(&body).unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].booking_code.as_str(), "BK-202610-00001");
    assert_eq!(orders[0].status, OrderStatusType::AwaitingValidation);
}

#[actix_web::test]
async fn other_customers_orders_look_missing() {
    let _ = env_logger::try_init().ok();
    let store = store_with_order("alice", OrderStatusType::Validated);
    let req = as_customer(TestRequest::get().uri("/orders/BK-202610-00001"), "bob");
    let (status, _) = send_request(req, configure_orders(store)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let store = store_with_order("alice", OrderStatusType::Validated);
    let req = as_customer(TestRequest::get().uri("/orders/BK-202610-00001"), "alice");
    let (status, body) = send_request(req, configure_orders(store)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""customer_id":"alice""#));
}

#[actix_web::test]
async fn customers_book_for_themselves() {
    let _ = env_logger::try_init().ok();
    let mut store = MockBookingStore::new();
    store.expect_insert_order().withf(|o| o.customer_id == "alice").times(1).returning(|o| {
        let mut result = order(&o.customer_id, OrderStatusType::AwaitingValidation);
        result.total_price = o.total_price;
        Ok(result)
    });
    let body = r#"{"service_id":1,"event_name":"Wedding","event_date":"2026-12-12","total_price":1500000}"#;
    let req = as_customer(TestRequest::post().uri("/orders"), "alice")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body);
    let (status, body) = send_request(req, configure_orders(store)).await;
    assert_eq!(status, StatusCode::CREATED);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.total_price, Rupiah::from(1_500_000));

    let body = r#"{"customer_id":"bob","service_id":1,"event_name":"Wedding","event_date":"2026-12-12","total_price":1}"#;
    let req = as_customer(TestRequest::post().uri("/orders"), "alice")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body);
    let (status, _) = send_request(req, configure_orders(MockBookingStore::new())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn customers_cannot_validate_orders() {
    let _ = env_logger::try_init().ok();
    let req = as_customer(TestRequest::post().uri("/orders/BK-202610-00001/validate"), "alice");
    let (status, body) = send_request(req, configure_orders(MockBookingStore::new())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("may not access this route"));
}

#[actix_web::test]
async fn wrong_admin_keys_are_refused() {
    let _ = env_logger::try_init().ok();
    let req = as_customer(TestRequest::post().uri("/orders/BK-202610-00001/validate"), "staff")
        .insert_header((ADMIN_KEY_HEADER, "guess"));
    let (status, _) = send_request(req, configure_orders(MockBookingStore::new())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn admins_validate_orders() {
    let _ = env_logger::try_init().ok();
    let mut store = store_with_order("alice", OrderStatusType::AwaitingValidation);
    store
        .expect_transition_order()
        .withf(|id, version, transition| *id == 1 && *version == 1 && *transition == OrderTransition::Validate)
        .times(1)
        .returning(|_, _, _| {
            let mut o = order("alice", OrderStatusType::Validated);
            o.version = 2;
            Ok(o)
        });
    let req = as_admin(TestRequest::post().uri("/orders/BK-202610-00001/validate"));
    let (status, body) = send_request(req, configure_orders(store)).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.status, OrderStatusType::Validated);
    assert_eq!(order.version, 2);
}

#[actix_web::test]
async fn invalid_transitions_are_conflicts() {
    let _ = env_logger::try_init().ok();
    let mut store = store_with_order("alice", OrderStatusType::Settled);
    store.expect_transition_order().returning(|_, _, transition| {
        Err(BookingError::InvalidTransition { from: OrderStatusType::Settled, transition })
    });
    let req = as_admin(TestRequest::post().uri("/orders/BK-202610-00001/validate"));
    let (status, body) = send_request(req, configure_orders(store)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("Cannot validate an order that is settled"));
}

#[actix_web::test]
async fn internal_errors_are_opaque() {
    let _ = env_logger::try_init().ok();
    let mut store = MockBookingStore::new();
    store
        .expect_fetch_orders_for_customer()
        .returning(|_| Err(BookingError::DatabaseError("disk I/O error at /var/lib/booking.db".into())));
    let req = as_customer(TestRequest::get().uri("/orders"), "alice");
    let (status, body) = send_request(req, configure_orders(store)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body.contains("disk"));
}

#[actix_web::test]
async fn reverifying_a_payment_is_a_conflict() {
    let _ = env_logger::try_init().ok();
    let mut store = MockBookingStore::new();
    store.expect_verify_payment().withf(|id, approve, by| *id == 7 && *approve && by == "staff").times(1).returning(
        |id, _, _| Err(BookingError::AlreadyVerified(id)),
    );
    let configure = move |cfg: &mut ServiceConfig| {
        let api = LedgerApi::new(
            store,
            EventProducers::default(),
            InstallmentPolicy::default(),
            PaymentMethodRegistry::default(),
        );
        cfg.service(VerifyPaymentRoute::<MockBookingStore>::new()).app_data(web::Data::new(api));
    };
    let req = as_admin(TestRequest::post().uri("/payments/7/verify"))
        .insert_header(("Content-Type", "application/json"))
        .set_payload(r#"{"approve":true}"#);
    let (status, body) = send_request(req, configure).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("Payment #7 has already been verified"));
}

#[actix_web::test]
async fn unknown_payment_methods_are_unprocessable() {
    let _ = env_logger::try_init().ok();
    let configure = move |cfg: &mut ServiceConfig| {
        let api = LedgerApi::new(
            MockBookingStore::new(),
            EventProducers::default(),
            InstallmentPolicy::default(),
            PaymentMethodRegistry::new(["bank_transfer", "qris"]),
        );
        cfg.service(RecordPaymentRoute::<MockBookingStore>::new()).app_data(web::Data::new(api));
    };
    let req = as_admin(TestRequest::post().uri("/orders/BK-202610-00001/payments"))
        .insert_header(("Content-Type", "application/json"))
        .set_payload(r#"{"kind":"down_payment","amount":250000,"method":"cheque"}"#);
    let (status, body) = send_request(req, configure).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.contains("cheque is not an accepted payment method"));
}
