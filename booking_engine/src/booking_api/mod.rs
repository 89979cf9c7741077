//! The booking engine's public APIs.
//!
//! Each API wraps a storage backend and adds the rules about *who* may do what. Every state-changing call receives the
//! acting [`Principal`] explicitly. Committed changes are announced to the notification hooks through
//! [`crate::events::EventProducers`].
use std::future::Future;

use log::*;

use crate::{
    db_types::{BookingCode, Order, Principal},
    traits::{BookingError, BookingQueries},
};

pub mod document_api;
pub mod ledger_api;
pub mod meeting_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod tracking_api;

/// Runs `op`, and runs it once more if it failed because another request modified the same order. The second attempt
/// re-reads everything, so it sees the other request's changes. A second conflict is returned to the caller.
pub(crate) async fn retry_on_conflict<T, F, Fut>(label: &str, mut op: F) -> Result<T, BookingError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BookingError>>,
{
    match op().await {
        Err(e) if e.is_retryable() => {
            debug!("🔄️ {label} hit a concurrent modification ({e}). Retrying once.");
            op().await
        },
        result => result,
    }
}

pub(crate) fn require_admin(principal: &Principal, action: &str) -> Result<(), BookingError> {
    if principal.is_admin() {
        Ok(())
    } else {
        warn!("🔄️ {principal} tried to {action} without admin rights");
        Err(BookingError::Unauthorized(format!("Only admins may {action}")))
    }
}

pub(crate) async fn fetch_order<B: BookingQueries>(db: &B, code: &BookingCode) -> Result<Order, BookingError> {
    db.fetch_order_by_booking_code(code).await?.ok_or_else(|| BookingError::NotFound(format!("Order {code}")))
}

/// Fetches the order, hiding it from principals that may not see it. Other customers' orders look exactly like
/// orders that don't exist.
pub(crate) async fn fetch_visible_order<B: BookingQueries>(
    db: &B,
    principal: &Principal,
    code: &BookingCode,
) -> Result<Order, BookingError> {
    match db.fetch_order_by_booking_code(code).await? {
        Some(order) if principal.can_access(&order.customer_id) => Ok(order),
        Some(_) => {
            debug!("🔄️ {principal} asked for order {code}, which belongs to someone else");
            Err(BookingError::NotFound(format!("Order {code}")))
        },
        None => Err(BookingError::NotFound(format!("Order {code}"))),
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn conflicts_are_retried_exactly_once() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let result: Result<(), BookingError> = retry_on_conflict("test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(BookingError::ConcurrentModification("busy".into()))
        })
        .await;
        assert!(matches!(result, Err(BookingError::ConcurrentModification(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let result = retry_on_conflict("test", || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(BookingError::ConcurrentModification("busy".into()))
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let result: Result<(), BookingError> = retry_on_conflict("test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(BookingError::AlreadyVerified(1))
        })
        .await;
        assert!(matches!(result, Err(BookingError::AlreadyVerified(1))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn admin_check() {
        assert!(require_admin(&Principal::admin("ops"), "validate orders").is_ok());
        let err = require_admin(&Principal::customer("alice"), "validate orders").unwrap_err();
        assert!(matches!(err, BookingError::Unauthorized(_)));
    }
}
