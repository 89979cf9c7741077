use booking_engine::{
    db_types::{
        BookingCode,
        DocumentRecord,
        DocumentTarget,
        Meeting,
        MeetingUpdate,
        NewMeeting,
        NewOrder,
        NewPayment,
        NewService,
        Order,
        Payment,
        Service,
        TrackingCode,
    },
    ledger::InstallmentPolicy,
    order_objects::OrderQueryFilter,
    state_machine::OrderTransition,
    traits::{BookingDatabase, BookingError, BookingQueries, RecordedPayment, VerificationResult},
};
use chrono::{DateTime, Utc};
use mockall::mock;
use studio_common::Rupiah;

mock! {
    pub BookingStore {}
    impl Clone for BookingStore {
        fn clone(&self) -> Self;
    }
    impl BookingQueries for BookingStore {
        async fn fetch_order_by_id(&self, order_id: i64) -> Result<Option<Order>, BookingError>;
        async fn fetch_order_by_booking_code(&self, code: &BookingCode) -> Result<Option<Order>, BookingError>;
        async fn fetch_order_by_tracking_code(&self, code: &TrackingCode) -> Result<Option<Order>, BookingError>;
        async fn fetch_orders_for_customer(&self, customer_id: &str) -> Result<Vec<Order>, BookingError>;
        async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, BookingError>;
        async fn fetch_service(&self, service_id: i64) -> Result<Option<Service>, BookingError>;
        async fn fetch_services(&self) -> Result<Vec<Service>, BookingError>;
        async fn fetch_payments_for_order(&self, order_id: i64) -> Result<Vec<Payment>, BookingError>;
        async fn fetch_payment(&self, payment_id: i64) -> Result<Option<Payment>, BookingError>;
        async fn fetch_meetings_for_order(&self, order_id: i64) -> Result<Vec<Meeting>, BookingError>;
        async fn fetch_meeting(&self, meeting_id: i64) -> Result<Option<Meeting>, BookingError>;
        async fn fetch_meeting_by_link_ref(&self, link_ref: &str) -> Result<Option<Meeting>, BookingError>;
        async fn fetch_documents_for_order(&self, order_id: i64) -> Result<Vec<DocumentRecord>, BookingError>;
    }
    impl BookingDatabase for BookingStore {
        fn url(&self) -> &str;
        async fn insert_service(&self, service: NewService) -> Result<Service, BookingError>;
        async fn insert_order(&self, order: NewOrder) -> Result<Order, BookingError>;
        async fn update_total_price(&self, order_id: i64, version: i64, total: Rupiah) -> Result<Order, BookingError>;
        async fn transition_order(&self, order_id: i64, version: i64, transition: OrderTransition) -> Result<Order, BookingError>;
        async fn insert_payment(&self, order_id: i64, payment: NewPayment, policy: &InstallmentPolicy) -> Result<RecordedPayment, BookingError>;
        async fn verify_payment(&self, payment_id: i64, approve: bool, verified_by: &str) -> Result<VerificationResult, BookingError>;
        async fn insert_meeting(&self, order_id: i64, meeting: NewMeeting) -> Result<Meeting, BookingError>;
        async fn update_meeting(&self, meeting_id: i64, update: MeetingUpdate) -> Result<Meeting, BookingError>;
        async fn claim_document(&self, order_id: i64, target: DocumentTarget, issued_by: &str, stale_before: DateTime<Utc>) -> Result<DocumentRecord, BookingError>;
        async fn complete_document(&self, document_id: i64, artifact_ref: &str) -> Result<DocumentRecord, BookingError>;
        async fn release_document_claim(&self, document_id: i64) -> Result<(), BookingError>;
    }
}
