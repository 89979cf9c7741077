use std::fmt::Debug;

use log::*;
use studio_common::Rupiah;

use crate::{
    booking_api::{fetch_order, fetch_visible_order, require_admin, retry_on_conflict},
    db_types::{BookingCode, NewOrder, NewService, Order, Principal, Service},
    events::{EventProducers, EventType, OrderEvent},
    order_objects::OrderQueryFilter,
    state_machine::{Actor, OrderTransition},
    traits::{BookingDatabase, BookingError},
};

/// `OrderFlowApi` drives orders through their lifecycle: creation, re-quoting, validation, cancellation and archiving.
///
/// Settlement is not available here. It happens automatically when the ledger verifies the last outstanding payment
/// (see [`crate::LedgerApi::verify_payment`]).
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderFlowApi<B>
where B: BookingDatabase
{
    /// Submits a new booking. Customers can only book for themselves; admins can book on a customer's behalf.
    ///
    /// The order starts in `awaiting_validation`, with freshly issued booking and tracking codes.
    pub async fn create_order(&self, principal: &Principal, order: NewOrder) -> Result<Order, BookingError> {
        if !principal.can_access(&order.customer_id) {
            warn!("🔄️ {principal} tried to create an order for customer {}", order.customer_id);
            return Err(BookingError::Unauthorized("Customers may only create orders for themselves".into()));
        }
        let order = self.db.insert_order(order).await?;
        info!("🔄️📦️ Order {} created for customer {}", order.booking_code, order.customer_id);
        self.producers.publish(EventType::OrderCreated(OrderEvent::new(order.clone()))).await;
        Ok(order)
    }

    /// Changes the quoted total of an order that has not been validated yet.
    pub async fn modify_total_price(
        &self,
        principal: &Principal,
        code: &BookingCode,
        total: Rupiah,
    ) -> Result<Order, BookingError> {
        require_admin(principal, "change order totals")?;
        let db = &self.db;
        let order = retry_on_conflict("modify_total_price", || async move {
            let order = fetch_order(db, code).await?;
            db.update_total_price(order.id, order.version, total).await
        })
        .await?;
        info!("🔄️📦️ Order {code} re-quoted to {total} by {principal}");
        Ok(order)
    }

    /// Accepts a booking. Only possible from `awaiting_validation`. Once validated, the total is fixed, payments can be
    /// recorded, meetings scheduled and the invoice generated.
    pub async fn validate(&self, principal: &Principal, code: &BookingCode) -> Result<Order, BookingError> {
        let order = self.apply_transition(principal, code, OrderTransition::Validate).await?;
        self.producers.publish(EventType::OrderValidated(OrderEvent::new(order.clone()))).await;
        Ok(order)
    }

    /// Cancels a booking that is awaiting validation or validated. Fails with
    /// [`BookingError::CancellationNotAllowed`] once any payment has been verified as paid.
    pub async fn cancel(&self, principal: &Principal, code: &BookingCode) -> Result<Order, BookingError> {
        let order = self.apply_transition(principal, code, OrderTransition::Cancel).await?;
        self.producers.publish(EventType::OrderCancelled(OrderEvent::new(order.clone()))).await;
        Ok(order)
    }

    /// Puts a settled or cancelled order away. Nothing is deleted: payments, meetings and documents stay on record.
    pub async fn archive(&self, principal: &Principal, code: &BookingCode) -> Result<Order, BookingError> {
        let order = self.apply_transition(principal, code, OrderTransition::Archive).await?;
        self.producers.publish(EventType::OrderArchived(OrderEvent::new(order.clone()))).await;
        Ok(order)
    }

    async fn apply_transition(
        &self,
        principal: &Principal,
        code: &BookingCode,
        transition: OrderTransition,
    ) -> Result<Order, BookingError> {
        if transition.actor() != Actor::Admin {
            error!("🔄️ {principal} requested the system-only transition '{transition}' on order {code}");
            return Err(BookingError::Unauthorized(format!("The {transition} transition is not externally callable")));
        }
        require_admin(principal, &format!("{transition} orders"))?;
        let db = &self.db;
        let order = retry_on_conflict(&format!("{transition} order {code}"), || async move {
            let order = fetch_order(db, code).await?;
            db.transition_order(order.id, order.version, transition).await
        })
        .await?;
        info!("🔄️📦️ {principal} applied '{transition}' to order {code}. It is now {}", order.status);
        Ok(order)
    }

    /// Fetches an order that the principal is allowed to see.
    pub async fn fetch_order(&self, principal: &Principal, code: &BookingCode) -> Result<Order, BookingError> {
        fetch_visible_order(&self.db, principal, code).await
    }

    pub async fn orders_for_customer(&self, principal: &Principal, customer_id: &str) -> Result<Vec<Order>, BookingError> {
        if !principal.can_access(customer_id) {
            return Err(BookingError::Unauthorized(format!("Cannot list orders for customer {customer_id}")));
        }
        self.db.fetch_orders_for_customer(customer_id).await
    }

    /// Searches orders. Customers only ever see their own orders, whatever the filter says.
    pub async fn search_orders(&self, principal: &Principal, query: OrderQueryFilter) -> Result<Vec<Order>, BookingError> {
        let query = if principal.is_admin() { query } else { query.with_customer_id(principal.id.as_str()) };
        trace!("🔄️ Searching orders for {principal}: {query}");
        self.db.search_orders(query).await
    }

    pub async fn services(&self) -> Result<Vec<Service>, BookingError> {
        self.db.fetch_services().await
    }

    pub async fn add_service(&self, principal: &Principal, service: NewService) -> Result<Service, BookingError> {
        require_admin(principal, "add services")?;
        self.db.insert_service(service).await
    }
}
