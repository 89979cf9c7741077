use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use booking_engine::{
    db_types::{Meeting, MeetingStatus, MeetingUpdate},
    events::EventProducers,
    MeetingApi,
};
use chrono::{TimeZone, Utc};
use studio_common::Secret;

use super::{helpers::send_request, mocks::MockBookingStore};
use crate::{
    config::ServerOptions,
    helpers::calculate_hmac,
    middleware::{HmacMiddlewareFactory, SIGNATURE_HEADER},
    routes::SchedulingWebhookRoute,
};

const SECRET: &str = "scheduling-test-secret";
const LINK: &str = "https://cal.example/studio/consult-1";

fn meeting(status: MeetingStatus) -> Meeting {
    let now = Utc.with_ymd_and_hms(2026, 10, 2, 10, 0, 0).unwrap();
    Meeting {
        id: 3,
        order_id: 1,
        link_ref: LINK.into(),
        status,
        start_time: None,
        end_time: None,
        contact_name: "Alice".into(),
        contact_email: None,
        contact_phone: None,
        created_at: now,
        updated_at: now,
    }
}

fn configure_webhooks(store: MockBookingStore, checks: bool) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let api = MeetingApi::new(store, EventProducers::default());
        let hmac = HmacMiddlewareFactory::new(SIGNATURE_HEADER, Secret::new(SECRET.to_string()), checks);
        cfg.service(web::scope("/webhooks").wrap(hmac).service(SchedulingWebhookRoute::<MockBookingStore>::new()))
            .app_data(web::Data::new(api))
            .app_data(web::Data::new(ServerOptions::default()));
    }
}

fn cancellation() -> String {
    format!(r#"{{"link_ref":"{LINK}","event":"invitee_canceled"}}"#)
}

fn signed(body: &str, signature: &str) -> TestRequest {
    TestRequest::post()
        .uri("/webhooks/scheduling")
        .insert_header(("Content-Type", "application/json"))
        .insert_header((SIGNATURE_HEADER, signature.to_string()))
        .set_payload(body.to_string())
}

#[actix_web::test]
async fn signed_callbacks_update_meetings() {
    let _ = env_logger::try_init().ok();
    let mut store = MockBookingStore::new();
    store.expect_fetch_meeting_by_link_ref().times(1).returning(|_| Ok(Some(meeting(MeetingStatus::Scheduled))));
    store
        .expect_update_meeting()
        .withf(|id, update| *id == 3 && *update == MeetingUpdate::InviteeCanceled)
        .times(1)
        .returning(|_, _| Ok(meeting(MeetingStatus::Cancelled)));
    let body = cancellation();
    let signature = calculate_hmac(SECRET, body.as_bytes());
    let (status, response) = send_request(signed(&body, &signature), configure_webhooks(store, true)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.contains(r#""success":true"#));
}

#[actix_web::test]
async fn bad_signatures_are_refused() {
    let _ = env_logger::try_init().ok();
    let body = cancellation();
    let signature = calculate_hmac("some-other-secret", body.as_bytes());
    let (status, _) = send_request(signed(&body, &signature), configure_webhooks(MockBookingStore::new(), true)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let genuine = calculate_hmac(SECRET, body.as_bytes());
    for forged in [&genuine[..genuine.len() / 2], "%%not-base64%%", ""] {
        let (status, _) = send_request(signed(&body, forged), configure_webhooks(MockBookingStore::new(), true)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "signature {forged:?} was accepted");
    }

    let req = TestRequest::post()
        .uri("/webhooks/scheduling")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body);
    let (status, _) = send_request(req, configure_webhooks(MockBookingStore::new(), true)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn unknown_links_are_acknowledged() {
    let _ = env_logger::try_init().ok();
    let mut store = MockBookingStore::new();
    store.expect_fetch_meeting_by_link_ref().times(1).returning(|_| Ok(None));
    let body = cancellation();
    let (status, response) = send_request(signed(&body, "unchecked"), configure_webhooks(store, false)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.contains(r#""success":false"#));
}

#[actix_web::test]
async fn the_provider_cannot_complete_meetings() {
    let _ = env_logger::try_init().ok();
    let body = format!(r#"{{"link_ref":"{LINK}","event":"completed"}}"#);
    let signature = calculate_hmac(SECRET, body.as_bytes());
    let (status, _) = send_request(signed(&body, &signature), configure_webhooks(MockBookingStore::new(), true)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}
