use serde::{Deserialize, Serialize};

use crate::db_types::{DocumentRecord, Meeting, Order, Payment};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order: Order,
}

impl OrderEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub order: Order,
    pub payment: Payment,
}

impl PaymentEvent {
    pub fn new(order: Order, payment: Payment) -> Self {
        Self { order, payment }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingScheduledEvent {
    pub order: Order,
    pub meeting: Meeting,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentIssuedEvent {
    pub order: Order,
    pub document: DocumentRecord,
}

/// Everything the notification dispatcher hears about. Events are only published after the change they describe has
/// been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum EventType {
    OrderCreated(OrderEvent),
    OrderValidated(OrderEvent),
    OrderCancelled(OrderEvent),
    OrderArchived(OrderEvent),
    PaymentRecorded(PaymentEvent),
    PaymentVerified(PaymentEvent),
    OrderSettled(OrderEvent),
    MeetingScheduled(MeetingScheduledEvent),
    DocumentIssued(DocumentIssuedEvent),
}

impl EventType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OrderCreated(_) => "order_created",
            Self::OrderValidated(_) => "order_validated",
            Self::OrderCancelled(_) => "order_cancelled",
            Self::OrderArchived(_) => "order_archived",
            Self::PaymentRecorded(_) => "payment_recorded",
            Self::PaymentVerified(_) => "payment_verified",
            Self::OrderSettled(_) => "order_settled",
            Self::MeetingScheduled(_) => "meeting_scheduled",
            Self::DocumentIssued(_) => "document_issued",
        }
    }

    /// The order the event concerns.
    pub fn order(&self) -> &Order {
        match self {
            Self::OrderCreated(e)
            | Self::OrderValidated(e)
            | Self::OrderCancelled(e)
            | Self::OrderArchived(e)
            | Self::OrderSettled(e) => &e.order,
            Self::PaymentRecorded(e) | Self::PaymentVerified(e) => &e.order,
            Self::MeetingScheduled(e) => &e.order,
            Self::DocumentIssued(e) => &e.order,
        }
    }
}
