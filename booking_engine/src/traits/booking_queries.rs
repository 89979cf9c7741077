use crate::{
    db_types::{BookingCode, DocumentRecord, Meeting, Order, Payment, Service, TrackingCode},
    order_objects::OrderQueryFilter,
    traits::BookingError,
};

/// Read-only access to bookings and everything attached to them.
///
/// None of these methods check who is asking.
#[allow(async_fn_in_trait)]
pub trait BookingQueries {
    async fn fetch_order_by_id(&self, order_id: i64) -> Result<Option<Order>, BookingError>;

    async fn fetch_order_by_booking_code(&self, code: &BookingCode) -> Result<Option<Order>, BookingError>;

    /// Indexed lookup, independent of the number of orders.
    async fn fetch_order_by_tracking_code(&self, code: &TrackingCode) -> Result<Option<Order>, BookingError>;

    async fn fetch_orders_for_customer(&self, customer_id: &str) -> Result<Vec<Order>, BookingError>;

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, BookingError>;

    async fn fetch_service(&self, service_id: i64) -> Result<Option<Service>, BookingError>;

    async fn fetch_services(&self) -> Result<Vec<Service>, BookingError>;

    /// Payment records for the order, in sequence order.
    async fn fetch_payments_for_order(&self, order_id: i64) -> Result<Vec<Payment>, BookingError>;

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<Payment>, BookingError>;

    async fn fetch_meetings_for_order(&self, order_id: i64) -> Result<Vec<Meeting>, BookingError>;

    async fn fetch_meeting(&self, meeting_id: i64) -> Result<Option<Meeting>, BookingError>;

    async fn fetch_meeting_by_link_ref(&self, link_ref: &str) -> Result<Option<Meeting>, BookingError>;

    async fn fetch_documents_for_order(&self, order_id: i64) -> Result<Vec<DocumentRecord>, BookingError>;
}
