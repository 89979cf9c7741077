use std::fmt::Display;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{BookingCode, Order, OrderStatusType, Service};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub booking_code: Option<BookingCode>,
    pub customer_id: Option<String>,
    pub service_id: Option<i64>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub status: Option<Vec<OrderStatusType>>,
}

impl OrderQueryFilter {
    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_booking_code(mut self, code: BookingCode) -> Self {
        self.booking_code = Some(code);
        self
    }

    pub fn with_customer_id<S: Into<String>>(mut self, customer_id: S) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_service_id(mut self, service_id: i64) -> Self {
        self.service_id = Some(service_id);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.booking_code.is_none() &&
            self.customer_id.is_none() &&
            self.service_id.is_none() &&
            self.status.as_ref().map(|s| s.is_empty()).unwrap_or(true) &&
            self.since.is_none() &&
            self.until.is_none()
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "No filters.")?;
            return Ok(());
        }
        if let Some(code) = &self.booking_code {
            write!(f, "booking_code: {code}. ")?;
        }
        if let Some(customer_id) = &self.customer_id {
            write!(f, "customer_id: {customer_id}. ")?;
        }
        if let Some(service_id) = &self.service_id {
            write!(f, "service_id: {service_id}. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        if let Some(statuses) = &self.status {
            let statuses = statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            write!(f, "statuses: [{statuses}]. ")?;
        }
        Ok(())
    }
}

/// When the order passed each milestone. Missing entries have not happened (yet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTimeline {
    pub created_at: DateTime<Utc>,
    pub validated_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
}

/// The public view of an order, as returned by a tracking code lookup.
///
/// This deliberately leaves out amounts, payment proofs, customer identity and anything about who handled the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub booking_code: BookingCode,
    pub event_name: String,
    pub service_name: String,
    pub category: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_end_date: Option<NaiveDate>,
    pub status: OrderStatusType,
    pub timeline: StatusTimeline,
}

impl OrderSummary {
    pub fn new(order: Order, service: Option<Service>) -> Self {
        let (service_name, category) = service.map(|s| (s.name, s.category)).unwrap_or_default();
        Self {
            booking_code: order.booking_code,
            event_name: order.event_name,
            service_name,
            category,
            scheduled_date: order.event_date,
            scheduled_end_date: order.event_end_date,
            status: order.status,
            timeline: StatusTimeline {
                created_at: order.created_at,
                validated_at: order.validated_at,
                cancelled_at: order.cancelled_at,
                settled_at: order.settled_at,
            },
        }
    }
}
