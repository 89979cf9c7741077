use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use studio_common::{Rupiah, RUPIAH_CURRENCY_CODE};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

/// Implements `Display`, `FromStr` and a lenient `From<String>` for the snake_case string enums stored in the
/// database.
macro_rules! string_enum {
    ($name:ident, $fallback:ident, { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s,)+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant),)+
                    s => Err(ConversionError(format!("{s} is not a valid {}", stringify!($name)))),
                }
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                value.parse().unwrap_or_else(|_| {
                    error!(
                        "Invalid {}: {value}. But this conversion cannot fail. Defaulting to {}",
                        stringify!($name),
                        Self::$fallback
                    );
                    Self::$fallback
                })
            }
        }
    };
}

//--------------------------------------     BookingCode       ---------------------------------------------------------
/// The human-readable order reference shown to admins and the owning customer, e.g. `BK-202610-00042`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct BookingCode(pub String);

impl FromStr for BookingCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().to_string()))
    }
}

impl From<String> for BookingCode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for BookingCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl BookingCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------     TrackingCode      ---------------------------------------------------------
/// The opaque code that unauthenticated visitors use to look up an order's progress.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct TrackingCode(pub String);

impl From<String> for TrackingCode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for TrackingCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TrackingCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------        Principal        -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Admin,
}

/// The party performing an operation. Every state-changing call receives one explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

impl Principal {
    pub fn customer<S: Into<String>>(id: S) -> Self {
        Self { id: id.into(), role: Role::Customer }
    }

    pub fn admin<S: Into<String>>(id: S) -> Self {
        Self { id: id.into(), role: Role::Admin }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// True if this principal may read data belonging to `customer_id`.
    pub fn can_access(&self, customer_id: &str) -> bool {
        self.is_admin() || self.id == customer_id
    }
}

impl Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.role {
            Role::Admin => write!(f, "admin:{}", self.id),
            Role::Customer => write!(f, "customer:{}", self.id),
        }
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// The customer has submitted the booking, and it is waiting for an admin to check it.
    AwaitingValidation,
    /// An admin has accepted the booking. The total is now fixed and payments can be recorded against it.
    Validated,
    /// Every installment has been verified and the balance is zero.
    Settled,
    /// The booking was cancelled by an admin before any payment was verified.
    Cancelled,
    /// A settled or cancelled booking that has been put away. Records are kept; nothing is deleted.
    Archived,
}

string_enum!(OrderStatusType, AwaitingValidation, {
    AwaitingValidation => "awaiting_validation",
    Validated => "validated",
    Settled => "settled",
    Cancelled => "cancelled",
    Archived => "archived",
});

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Archived)
    }

    /// Validated orders and beyond accept ledger and meeting activity.
    pub fn is_validated(&self) -> bool {
        matches!(self, Self::Validated | Self::Settled)
    }
}

//--------------------------------------        Service        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub base_price: Rupiah,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewService {
    pub name: String,
    pub category: String,
    pub base_price: Rupiah,
}

impl NewService {
    pub fn new<S: Into<String>>(name: S, category: S, base_price: Rupiah) -> Self {
        Self { name: name.into(), category: category.into(), base_price }
    }
}

//--------------------------------------        Order          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub booking_code: BookingCode,
    pub tracking_code: TrackingCode,
    pub customer_id: String,
    pub service_id: i64,
    pub event_name: String,
    pub event_date: NaiveDate,
    pub event_end_date: Option<NaiveDate>,
    pub event_time: Option<String>,
    pub location: String,
    pub requirements: Option<String>,
    pub total_price: Rupiah,
    pub currency: String,
    pub status: OrderStatusType,
    /// Bumped on every write. Writers compare it to detect concurrent modification.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub validated_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    /// The customer that owns the booking
    pub customer_id: String,
    /// The service being booked
    pub service_id: i64,
    pub event_name: String,
    pub event_date: NaiveDate,
    #[serde(default)]
    pub event_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub event_time: Option<String>,
    #[serde(default)]
    pub location: String,
    /// Free-form description of what the customer needs
    #[serde(default)]
    pub requirements: Option<String>,
    /// The quoted total. An admin may re-quote it until the order is validated.
    pub total_price: Rupiah,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    RUPIAH_CURRENCY_CODE.to_string()
}

impl NewOrder {
    pub fn new<S: Into<String>>(
        customer_id: S,
        service_id: i64,
        event_name: S,
        event_date: NaiveDate,
        total_price: Rupiah,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            service_id,
            event_name: event_name.into(),
            event_date,
            event_end_date: None,
            event_time: None,
            location: String::default(),
            requirements: None,
            total_price,
            currency: default_currency(),
        }
    }

    pub fn with_location<S: Into<String>>(mut self, location: S) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_event_time<S: Into<String>>(mut self, time: S) -> Self {
        self.event_time = Some(time.into());
        self
    }

    pub fn with_end_date(mut self, end: NaiveDate) -> Self {
        self.event_end_date = Some(end);
        self
    }

    pub fn with_requirements<S: Into<String>>(mut self, requirements: S) -> Self {
        self.requirements = Some(requirements.into());
        self
    }
}

//--------------------------------------      PaymentKind      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    /// The first installment
    DownPayment,
    /// The remainder after the down payment
    Settlement,
    /// The whole total in one go. Exclusive with the other two kinds.
    Full,
}

string_enum!(PaymentKind, DownPayment, {
    DownPayment => "down_payment",
    Settlement => "settlement",
    Full => "full",
});

//--------------------------------------     PaymentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

string_enum!(PaymentStatus, Pending, {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
});

//--------------------------------------        Payment        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    /// Internal id of the owning order
    pub order_id: i64,
    pub kind: PaymentKind,
    /// 1-based position of this record among all the order's payment records
    pub sequence: i64,
    pub amount: Rupiah,
    /// The share of the order total this installment represents
    pub percentage: i64,
    pub method: String,
    /// Reference to the uploaded proof of payment
    pub proof_ref: Option<String>,
    pub verified: bool,
    pub status: PaymentStatus,
    /// The order balance once this record was written (or verified)
    pub remaining_balance: Rupiah,
    pub verified_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// A payment counts towards the balance only once an admin has approved it.
    pub fn is_settled_funds(&self) -> bool {
        self.status == PaymentStatus::Paid && self.verified
    }

    /// Pending and paid records block another record of the same kind.
    pub fn is_active(&self) -> bool {
        matches!(self.status, PaymentStatus::Pending | PaymentStatus::Paid)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub kind: PaymentKind,
    pub amount: Rupiah,
    /// A code from the payment method registry, e.g. `bank_transfer`
    pub method: String,
    #[serde(default)]
    pub proof_ref: Option<String>,
}

impl NewPayment {
    pub fn new<S: Into<String>>(kind: PaymentKind, amount: Rupiah, method: S) -> Self {
        Self { kind, amount, method: method.into(), proof_ref: None }
    }

    pub fn with_proof<S: Into<String>>(mut self, proof_ref: S) -> Self {
        self.proof_ref = Some(proof_ref.into());
        self
    }
}

//--------------------------------------     MeetingStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Scheduled,
    Completed,
    Cancelled,
}

string_enum!(MeetingStatus, Scheduled, {
    Scheduled => "scheduled",
    Completed => "completed",
    Cancelled => "cancelled",
});

//--------------------------------------        Meeting        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Meeting {
    pub id: i64,
    pub order_id: i64,
    /// The scheduling provider's reference for the booking link
    pub link_ref: String,
    pub status: MeetingStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub contact_name: String,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meeting {
    pub fn is_active(&self) -> bool {
        self.status != MeetingStatus::Cancelled
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMeeting {
    pub link_ref: String,
    pub contact_name: String,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
}

impl NewMeeting {
    pub fn new<S: Into<String>>(link_ref: S, contact_name: S) -> Self {
        Self { link_ref: link_ref.into(), contact_name: contact_name.into(), contact_email: None, contact_phone: None }
    }

    pub fn with_email<S: Into<String>>(mut self, email: S) -> Self {
        self.contact_email = Some(email.into());
        self
    }

    pub fn with_phone<S: Into<String>>(mut self, phone: S) -> Self {
        self.contact_phone = Some(phone.into());
        self
    }
}

/// Meeting status input, either from the scheduling provider's callback or from an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MeetingUpdate {
    InviteeCreated { start_time: DateTime<Utc>, end_time: DateTime<Utc> },
    InviteeCanceled,
    Completed,
}

//--------------------------------------     DocumentKind      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Invoice,
    /// Memorandum of understanding, drawn up after the consultation meeting
    Mou,
    Receipt,
}

string_enum!(DocumentKind, Invoice, {
    Invoice => "invoice",
    Mou => "mou",
    Receipt => "receipt",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Claimed and handed to the renderer
    Pending,
    /// Rendered; `artifact_ref` is set
    Issued,
}

string_enum!(DocumentStatus, Pending, {
    Pending => "pending",
    Issued => "issued",
});

/// Names one document that may be generated for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentTarget {
    Invoice,
    Mou,
    Receipt { payment_id: i64 },
}

impl DocumentTarget {
    pub fn kind(&self) -> DocumentKind {
        match self {
            Self::Invoice => DocumentKind::Invoice,
            Self::Mou => DocumentKind::Mou,
            Self::Receipt { .. } => DocumentKind::Receipt,
        }
    }

    pub fn payment_id(&self) -> Option<i64> {
        match self {
            Self::Receipt { payment_id } => Some(*payment_id),
            _ => None,
        }
    }
}

impl Display for DocumentTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Receipt { payment_id } => write!(f, "receipt for payment #{payment_id}"),
            other => write!(f, "{}", other.kind()),
        }
    }
}

//--------------------------------------    DocumentRecord     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub order_id: i64,
    pub payment_id: Option<i64>,
    pub kind: DocumentKind,
    pub status: DocumentStatus,
    pub artifact_ref: Option<String>,
    pub issued_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    pub fn target(&self) -> DocumentTarget {
        match (self.kind, self.payment_id) {
            (DocumentKind::Invoice, _) => DocumentTarget::Invoice,
            (DocumentKind::Mou, _) => DocumentTarget::Mou,
            (DocumentKind::Receipt, Some(payment_id)) => DocumentTarget::Receipt { payment_id },
            (DocumentKind::Receipt, None) => {
                error!("Receipt record #{} has no payment id. The schema should prevent this.", self.id);
                DocumentTarget::Receipt { payment_id: 0 }
            },
        }
    }

    /// True for a pending claim made before `stale_before`, whose render never finished.
    pub fn is_stale_claim(&self, stale_before: DateTime<Utc>) -> bool {
        self.status == DocumentStatus::Pending && self.created_at < stale_before
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_strings_round_trip_through_the_database_representation() {
        for status in [
            OrderStatusType::AwaitingValidation,
            OrderStatusType::Validated,
            OrderStatusType::Settled,
            OrderStatusType::Cancelled,
            OrderStatusType::Archived,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatusType>().unwrap(), status);
        }
        assert!("Paid".parse::<OrderStatusType>().is_err());
        assert_eq!(OrderStatusType::from("nonsense".to_string()), OrderStatusType::AwaitingValidation);
    }

    #[test]
    fn document_targets_serialize_with_a_kind_tag() {
        let json = serde_json::to_string(&DocumentTarget::Receipt { payment_id: 7 }).unwrap();
        assert_eq!(json, r#"{"kind":"receipt","payment_id":7}"#);
        let target: DocumentTarget = serde_json::from_str(r#"{"kind":"mou"}"#).unwrap();
        assert_eq!(target, DocumentTarget::Mou);
        assert_eq!(target.kind(), DocumentKind::Mou);
    }

    #[test]
    fn principals() {
        let alice = Principal::customer("alice");
        assert!(alice.can_access("alice"));
        assert!(!alice.can_access("bob"));
        assert!(Principal::admin("ops").can_access("bob"));
        assert_eq!(Principal::admin("ops").to_string(), "admin:ops");
    }
}
