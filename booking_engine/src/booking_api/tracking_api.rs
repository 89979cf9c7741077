use std::fmt::Debug;

use log::*;

use crate::{
    helpers::normalize_tracking_code,
    order_objects::OrderSummary,
    traits::{BookingError, BookingQueries},
};

/// Public, read-only order lookups by tracking code. No authentication is involved, so nothing private leaves this
/// API: see [`OrderSummary`] for what is exposed.
pub struct TrackingApi<B> {
    db: B,
}

impl<B> Debug for TrackingApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TrackingApi")
    }
}

impl<B> TrackingApi<B>
where B: BookingQueries
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Looks up the order behind `tracking_code`.
    ///
    /// Malformed and unknown codes give the same [`BookingError::NotFound`] error, so callers learn nothing about which
    /// codes exist.
    pub async fn lookup(&self, tracking_code: &str) -> Result<OrderSummary, BookingError> {
        let not_found = || BookingError::NotFound("No order matches this tracking code".into());
        let code = normalize_tracking_code(tracking_code).ok_or_else(not_found)?;
        let order = self.db.fetch_order_by_tracking_code(&code).await?.ok_or_else(not_found)?;
        let service = self.db.fetch_service(order.service_id).await?;
        if service.is_none() {
            warn!("🔎️ Order {} refers to service #{}, which does not exist", order.booking_code, order.service_id);
        }
        trace!("🔎️ Tracking lookup matched order {}", order.booking_code);
        Ok(OrderSummary::new(order, service))
    }
}
