use chrono::{DateTime, Utc};
use studio_common::Rupiah;
use thiserror::Error;

use crate::{
    db_types::{
        DocumentRecord,
        DocumentTarget,
        Meeting,
        MeetingUpdate,
        NewMeeting,
        NewOrder,
        NewPayment,
        NewService,
        Order,
        OrderStatusType,
        PaymentKind,
        Service,
    },
    ledger::InstallmentPolicy,
    state_machine::OrderTransition,
    traits::{
        data_objects::{RecordedPayment, VerificationResult},
        BookingQueries,
    },
};

#[derive(Debug, Clone, Error)]
pub enum BookingError {
    #[error("Cannot {transition} an order that is {from}")]
    InvalidTransition { from: OrderStatusType, transition: OrderTransition },
    #[error("The order is not in a state that allows this operation. {0}")]
    InvalidOrderState(String),
    #[error("A {kind} payment must be exactly {expected}, but {actual} was given")]
    AmountMismatch { kind: PaymentKind, expected: Rupiah, actual: Rupiah },
    #[error("Payment #{0} has already been verified or rejected")]
    AlreadyVerified(i64),
    #[error("Cannot cancel the order. {0}")]
    CancellationNotAllowed(String),
    #[error("Ledger invariant violated. {0}")]
    LedgerInvariantViolation(String),
    #[error("Could not issue a unique {0} code")]
    IdentifierExhausted(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The record was modified by another request. {0}")]
    ConcurrentModification(String),
    #[error("Not authorised. {0}")]
    Unauthorized(String),
    #[error("A {0} payment is already pending or paid for this order")]
    DuplicatePayment(PaymentKind),
    #[error("The {0} cannot be generated for this order right now")]
    DocumentNotAvailable(DocumentTarget),
    #[error("The order already has an active meeting. {0}")]
    MeetingAlreadyActive(String),
    #[error("Invalid meeting update. {0}")]
    InvalidMeetingUpdate(String),
    #[error("Could not render the document. {0}")]
    RenderError(String),
    #[error("Invalid amount. {0}")]
    InvalidAmount(String),
    #[error("{0} is not an accepted payment method")]
    UnsupportedPaymentMethod(String),
}

/// SQLite reports lock contention as `SQLITE_BUSY` (5), `SQLITE_BUSY_SNAPSHOT` (517) or `SQLITE_LOCKED` (6).
const BUSY_CODES: [&str; 3] = ["5", "517", "6"];

impl From<sqlx::Error> for BookingError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db_err) if db_err.code().map(|c| BUSY_CODES.contains(&c.as_ref())).unwrap_or(false) => {
                BookingError::ConcurrentModification(db_err.message().to_string())
            },
            _ => BookingError::DatabaseError(e.to_string()),
        }
    }
}

impl BookingError {
    /// Faults that say something is wrong with the system rather than with the request.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::LedgerInvariantViolation(_) | Self::DatabaseError(_))
    }

    /// Conflicts that are worth one more attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification(_))
    }
}

/// This trait defines the write side of a booking storage backend.
///
/// Every method is atomic: it either commits completely or leaves the store as it was. Methods that change an order
/// take the order `version` the caller last saw, and fail with [`BookingError::ConcurrentModification`] if somebody
/// else has written to the order since.
///
/// Backends do not check who is calling. That is the job of the engine APIs, which sit on top of this trait.
#[allow(async_fn_in_trait)]
pub trait BookingDatabase: Clone + BookingQueries {
    /// The URL of the database
    fn url(&self) -> &str;

    async fn insert_service(&self, service: NewService) -> Result<Service, BookingError>;

    /// Stores a new order in `awaiting_validation` status, issuing its booking and tracking codes in the same
    /// transaction.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, BookingError>;

    /// Re-quotes an order. Only possible before the order has been validated.
    async fn update_total_price(&self, order_id: i64, version: i64, total: Rupiah) -> Result<Order, BookingError>;

    /// Applies `transition` to the order, checking the transition table and any guards that depend on other records:
    ///
    /// * `Cancel` fails with [`BookingError::CancellationNotAllowed`] if any payment has been marked paid.
    /// * `Settle` fails with [`BookingError::InvalidTransition`] unless the remaining balance is zero, and is a no-op
    ///   on an order that is already settled.
    async fn transition_order(
        &self,
        order_id: i64,
        version: i64,
        transition: OrderTransition,
    ) -> Result<Order, BookingError>;

    /// Records a new, pending, unverified payment after checking it against `policy` and the order's existing
    /// records. The order's version is bumped in the same transaction, and the touched order is returned alongside the
    /// payment.
    async fn insert_payment(
        &self,
        order_id: i64,
        payment: NewPayment,
        policy: &InstallmentPolicy,
    ) -> Result<RecordedPayment, BookingError>;

    /// Approves or rejects a pending payment.
    ///
    /// Approving recomputes the order balance, and settles the order in the same transaction if the balance reaches
    /// zero.
    async fn verify_payment(
        &self,
        payment_id: i64,
        approve: bool,
        verified_by: &str,
    ) -> Result<VerificationResult, BookingError>;

    /// Attaches a meeting to a validated order. At most one meeting per order may be active.
    async fn insert_meeting(&self, order_id: i64, meeting: NewMeeting) -> Result<Meeting, BookingError>;

    async fn update_meeting(&self, meeting_id: i64, update: MeetingUpdate) -> Result<Meeting, BookingError>;

    /// Checks that `target` is currently available and, in the same transaction, creates a pending document record
    /// for it. The record's uniqueness constraints make this safe against concurrent requests.
    ///
    /// Pending claims created before `stale_before` belong to renders that never finished. They are removed first, so
    /// they no longer block their documents.
    async fn claim_document(
        &self,
        order_id: i64,
        target: DocumentTarget,
        issued_by: &str,
        stale_before: DateTime<Utc>,
    ) -> Result<DocumentRecord, BookingError>;

    /// Marks a claimed document as issued. The artifact reference may not be blank.
    async fn complete_document(&self, document_id: i64, artifact_ref: &str) -> Result<DocumentRecord, BookingError>;

    /// Drops a claim whose rendering failed, making the document available again.
    async fn release_document_claim(&self, document_id: i64) -> Result<(), BookingError>;
}
