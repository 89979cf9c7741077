use std::fmt::Display;

use booking_engine::{
    db_types::{BookingCode, MeetingUpdate, NewMeeting, NewOrder, NewPayment, NewService, OrderStatusType, PaymentKind},
    order_objects::OrderQueryFilter,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use studio_common::Rupiah;

use crate::errors::ServerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Body of `POST /api/orders`. The customer defaults to the caller; only admins may book for someone else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub customer_id: Option<String>,
    pub service_id: i64,
    pub event_name: String,
    pub event_date: NaiveDate,
    pub event_end_date: Option<NaiveDate>,
    pub event_time: Option<String>,
    #[serde(default)]
    pub location: String,
    pub requirements: Option<String>,
    pub total_price: Rupiah,
}

impl NewOrderRequest {
    pub fn into_new_order(self, caller: &str) -> NewOrder {
        let customer_id = self.customer_id.unwrap_or_else(|| caller.to_string());
        let mut order = NewOrder::new(customer_id, self.service_id, self.event_name, self.event_date, self.total_price)
            .with_location(self.location);
        if let Some(end) = self.event_end_date {
            order = order.with_end_date(end);
        }
        if let Some(time) = self.event_time {
            order = order.with_event_time(time);
        }
        if let Some(requirements) = self.requirements {
            order = order.with_requirements(requirements);
        }
        order
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewServiceRequest {
    pub name: String,
    pub category: String,
    pub base_price: Rupiah,
}

impl From<NewServiceRequest> for NewService {
    fn from(value: NewServiceRequest) -> Self {
        NewService::new(value.name, value.category, value.base_price)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePriceParams {
    pub total_price: Rupiah,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPaymentRequest {
    pub kind: PaymentKind,
    pub amount: Rupiah,
    /// Falls back to the first configured payment method
    pub method: Option<String>,
    pub proof_ref: Option<String>,
}

impl RecordPaymentRequest {
    pub fn into_new_payment(self, default_method: &str) -> NewPayment {
        let method = self.method.unwrap_or_else(|| default_method.to_string());
        let payment = NewPayment::new(self.kind, self.amount, method);
        match self.proof_ref {
            Some(proof) => payment.with_proof(proof),
            None => payment,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VerifyPaymentParams {
    pub approve: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleMeetingRequest {
    pub link_ref: String,
    pub contact_name: String,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
}

impl From<ScheduleMeetingRequest> for NewMeeting {
    fn from(value: ScheduleMeetingRequest) -> Self {
        let mut meeting = NewMeeting::new(value.link_ref, value.contact_name);
        if let Some(email) = value.contact_email {
            meeting = meeting.with_email(email);
        }
        if let Some(phone) = value.contact_phone {
            meeting = meeting.with_phone(phone);
        }
        meeting
    }
}

/// A callback from the scheduling-link provider, e.g.
/// `{"link_ref": "https://cal.example/abc", "event": "invitee_canceled"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingCallback {
    pub link_ref: String,
    #[serde(flatten)]
    pub update: MeetingUpdate,
}

/// Query string of `GET /api/search/orders`. `status` is a comma-separated list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderSearchParams {
    pub booking_code: Option<BookingCode>,
    pub customer_id: Option<String>,
    pub service_id: Option<i64>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub status: Option<String>,
}

impl TryFrom<OrderSearchParams> for OrderQueryFilter {
    type Error = ServerError;

    fn try_from(params: OrderSearchParams) -> Result<Self, Self::Error> {
        let mut filter = OrderQueryFilter {
            booking_code: params.booking_code,
            customer_id: params.customer_id,
            service_id: params.service_id,
            since: params.since,
            until: params.until,
            status: None,
        };
        for status in params.status.iter().flat_map(|s| s.split(',')).map(str::trim).filter(|s| !s.is_empty()) {
            let status = status
                .parse::<OrderStatusType>()
                .map_err(|e| ServerError::InvalidRequestPath(e.to_string()))?;
            filter = filter.with_status(status);
        }
        Ok(filter)
    }
}
