//! `SqliteDatabase` is a concrete implementation of a booking engine backend.
//!
//! It uses SQLite as the store and implements all the storage traits defined in the [`crate::traits`] module. Each
//! write method runs in a single [`WriteTransaction`]. If any step fails, the transaction is dropped without
//! committing and rolled back.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate, SqlitePool};
use studio_common::Rupiah;

use super::db::{codes, db_url, documents, meetings, new_pool, orders, payments, services, WriteTransaction};
use crate::{
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
        OrderStatusType,
        Payment,
        PaymentStatus,
        Service,
        TrackingCode,
    },
    document_rules,
    ledger::{remaining_balance, InstallmentPolicy},
    order_objects::OrderQueryFilter,
    state_machine::{evaluate, evaluate_meeting_update, OrderTransition, TransitionOutcome},
    traits::{BookingDatabase, BookingError, BookingQueries, RecordedPayment, VerificationResult},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `BKS_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool for {url} with {max_connections} connections");
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes every connection in the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }
}

fn order_not_found(order_id: i64) -> BookingError {
    BookingError::NotFound(format!("Order #{order_id}"))
}

fn check_version(order: &Order, version: i64) -> Result<(), BookingError> {
    if order.version == version {
        Ok(())
    } else {
        debug!("🗃️ Order {} is at version {} but the caller expected {version}", order.booking_code, order.version);
        Err(BookingError::ConcurrentModification(format!(
            "Order {} has changed since version {version}",
            order.booking_code
        )))
    }
}

impl BookingDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_service(&self, service: NewService) -> Result<Service, BookingError> {
        let mut tx = WriteTransaction::begin(&self.pool).await?;
        let service = services::insert_service(service, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Service '{}' saved with id {}", service.name, service.id);
        Ok(service)
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, BookingError> {
        if !order.total_price.is_positive() {
            return Err(BookingError::InvalidAmount(format!("Order total must be positive, not {}", order.total_price)));
        }
        let mut tx = WriteTransaction::begin(&self.pool).await?;
        if services::fetch_service(order.service_id, &mut tx).await?.is_none() {
            return Err(BookingError::NotFound(format!("Service #{}", order.service_id)));
        }
        let booking_code = codes::issue_booking_code(&mut tx).await?;
        let tracking_code = codes::issue_tracking_code(&mut tx).await?;
        let order = orders::insert_order(order, &booking_code, &tracking_code, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn update_total_price(&self, order_id: i64, version: i64, total: Rupiah) -> Result<Order, BookingError> {
        if !total.is_positive() {
            return Err(BookingError::InvalidAmount(format!("Order total must be positive, not {total}")));
        }
        let mut tx = WriteTransaction::begin(&self.pool).await?;
        let order = orders::fetch_order_by_id(order_id, &mut tx).await?.ok_or_else(|| order_not_found(order_id))?;
        check_version(&order, version)?;
        if order.status != OrderStatusType::AwaitingValidation {
            return Err(BookingError::InvalidOrderState(format!(
                "The total of order {} is fixed because it is {}",
                order.booking_code, order.status
            )));
        }
        let updated = orders::update_total_price(order_id, version, total, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {} re-quoted from {} to {total}", updated.booking_code, order.total_price);
        Ok(updated)
    }

    async fn transition_order(
        &self,
        order_id: i64,
        version: i64,
        transition: OrderTransition,
    ) -> Result<Order, BookingError> {
        let mut tx = WriteTransaction::begin(&self.pool).await?;
        let order = orders::fetch_order_by_id(order_id, &mut tx).await?.ok_or_else(|| order_not_found(order_id))?;
        check_version(&order, version)?;
        let next = match evaluate(order.status, transition)? {
            TransitionOutcome::NoOp => {
                debug!("🗃️ Order {} is already {}. Nothing to do for {transition}", order.booking_code, order.status);
                return Ok(order);
            },
            TransitionOutcome::Apply(next) => next,
        };
        match transition {
            OrderTransition::Cancel => {
                let payments = payments::fetch_payments_for_order(order_id, &mut tx).await?;
                if let Some(p) = payments.iter().find(|p| p.status == PaymentStatus::Paid) {
                    return Err(BookingError::CancellationNotAllowed(format!(
                        "Payment #{} of {} has been paid for order {}. A refund process is required",
                        p.id, p.amount, order.booking_code
                    )));
                }
            },
            OrderTransition::Settle => {
                let payments = payments::fetch_payments_for_order(order_id, &mut tx).await?;
                let balance = remaining_balance(order_id, order.total_price, &payments)?;
                if !balance.is_zero() {
                    debug!("🗃️ Order {} cannot be settled with {balance} outstanding", order.booking_code);
                    return Err(BookingError::InvalidTransition { from: order.status, transition });
                }
            },
            OrderTransition::Validate | OrderTransition::Archive => {},
        }
        let updated = orders::update_order_status(order_id, version, next, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Order {} moved from {} to {next}", updated.booking_code, order.status);
        Ok(updated)
    }

    async fn insert_payment(
        &self,
        order_id: i64,
        payment: NewPayment,
        policy: &InstallmentPolicy,
    ) -> Result<RecordedPayment, BookingError> {
        let mut tx = WriteTransaction::begin(&self.pool).await?;
        let order = orders::fetch_order_by_id(order_id, &mut tx).await?.ok_or_else(|| order_not_found(order_id))?;
        if !order.status.is_validated() {
            return Err(BookingError::InvalidOrderState(format!(
                "Payments cannot be recorded against order {} while it is {}",
                order.booking_code, order.status
            )));
        }
        let existing = payments::fetch_payments_for_order(order_id, &mut tx).await?;
        let percent = policy.check_new_payment(payment.kind, payment.amount, order.total_price, &existing)?;
        let balance = remaining_balance(order_id, order.total_price, &existing)?;
        let sequence = existing.iter().map(|p| p.sequence).max().unwrap_or(0) + 1;
        let payment = payments::insert_payment(order_id, sequence, payment, percent, balance, &mut tx).await?;
        let order = orders::touch_order(order_id, order.version, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🗃️ {} payment #{} of {} recorded for order {} as installment {sequence}",
            payment.kind, payment.id, payment.amount, order.booking_code
        );
        Ok(RecordedPayment { payment, order })
    }

    async fn verify_payment(
        &self,
        payment_id: i64,
        approve: bool,
        verified_by: &str,
    ) -> Result<VerificationResult, BookingError> {
        let mut tx = WriteTransaction::begin(&self.pool).await?;
        let payment = payments::fetch_payment(payment_id, &mut tx)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("Payment #{payment_id}")))?;
        if payment.status != PaymentStatus::Pending {
            return Err(BookingError::AlreadyVerified(payment_id));
        }
        let order_id = payment.order_id;
        let order = orders::fetch_order_by_id(order_id, &mut tx).await?.ok_or_else(|| order_not_found(order_id))?;
        if approve && order.status != OrderStatusType::Validated {
            return Err(BookingError::InvalidOrderState(format!(
                "Payment #{payment_id} cannot be approved while order {} is {}",
                order.booking_code, order.status
            )));
        }
        let payment = payments::close_pending_payment(payment_id, approve, verified_by, &mut tx)
            .await?
            .ok_or(BookingError::AlreadyVerified(payment_id))?;
        if !approve {
            tx.commit().await?;
            info!("🗃️ Payment #{payment_id} for order {} was rejected by {verified_by}", order.booking_code);
            return Ok(VerificationResult { payment, order, settled: false });
        }
        let all_payments = payments::fetch_payments_for_order(order_id, &mut tx).await?;
        let balance = remaining_balance(order_id, order.total_price, &all_payments)?;
        let payment = payments::set_remaining_balance(payment_id, balance, &mut tx).await?;
        let (order, settled) = if balance.is_zero() {
            match evaluate(order.status, OrderTransition::Settle)? {
                TransitionOutcome::Apply(next) => {
                    (orders::update_order_status(order_id, order.version, next, &mut tx).await?, true)
                },
                TransitionOutcome::NoOp => (orders::touch_order(order_id, order.version, &mut tx).await?, false),
            }
        } else {
            (orders::touch_order(order_id, order.version, &mut tx).await?, false)
        };
        tx.commit().await?;
        info!(
            "🗃️ Payment #{payment_id} for order {} approved by {verified_by}. Remaining balance: {balance}",
            order.booking_code
        );
        if settled {
            info!("🗃️ Order {} is fully paid and has been settled", order.booking_code);
        }
        Ok(VerificationResult { payment, order, settled })
    }

    async fn insert_meeting(&self, order_id: i64, meeting: NewMeeting) -> Result<Meeting, BookingError> {
        let mut tx = WriteTransaction::begin(&self.pool).await?;
        let order = orders::fetch_order_by_id(order_id, &mut tx).await?.ok_or_else(|| order_not_found(order_id))?;
        if !order.status.is_validated() {
            return Err(BookingError::InvalidOrderState(format!(
                "A meeting cannot be scheduled for order {} while it is {}",
                order.booking_code, order.status
            )));
        }
        let existing = meetings::fetch_meetings_for_order(order_id, &mut tx).await?;
        if let Some(active) = existing.iter().find(|m| m.is_active()) {
            return Err(BookingError::MeetingAlreadyActive(format!(
                "Order {} already has meeting {} ({})",
                order.booking_code, active.link_ref, active.status
            )));
        }
        let meeting = meetings::insert_meeting(order_id, meeting, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Meeting #{} [{}] attached to order {}", meeting.id, meeting.link_ref, order.booking_code);
        Ok(meeting)
    }

    async fn update_meeting(&self, meeting_id: i64, update: MeetingUpdate) -> Result<Meeting, BookingError> {
        let mut tx = WriteTransaction::begin(&self.pool).await?;
        let meeting = meetings::fetch_meeting(meeting_id, &mut tx)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("Meeting #{meeting_id}")))?;
        let change = match evaluate_meeting_update(&meeting, &update)? {
            Some(change) => change,
            None => {
                debug!("🗃️ Meeting #{meeting_id} is already {}. Ignoring {update:?}", meeting.status);
                return Ok(meeting);
            },
        };
        let updated =
            meetings::update_meeting(meeting_id, change.status, change.start_time, change.end_time, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Meeting #{meeting_id} is now {}", updated.status);
        Ok(updated)
    }

    async fn claim_document(
        &self,
        order_id: i64,
        target: DocumentTarget,
        issued_by: &str,
        stale_before: DateTime<Utc>,
    ) -> Result<DocumentRecord, BookingError> {
        let mut tx = WriteTransaction::begin(&self.pool).await?;
        let order = orders::fetch_order_by_id(order_id, &mut tx).await?.ok_or_else(|| order_not_found(order_id))?;
        let expired = documents::delete_stale_claims(order_id, stale_before, &mut tx).await?;
        if expired > 0 {
            warn!("🗃️ Dropped {expired} unfinished document claim(s) on order {}", order.booking_code);
        }
        let meetings = meetings::fetch_meetings_for_order(order_id, &mut tx).await?;
        let payments = payments::fetch_payments_for_order(order_id, &mut tx).await?;
        let docs = documents::fetch_documents_for_order(order_id, &mut tx).await?;
        if !document_rules::is_available(target, &order, &meetings, &payments, &docs) {
            debug!("🗃️ The {target} is not available for order {}", order.booking_code);
            return Err(BookingError::DocumentNotAvailable(target));
        }
        let claim = documents::insert_claim(order_id, target, issued_by, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Document #{} ({target}) claimed for order {}", claim.id, order.booking_code);
        Ok(claim)
    }

    async fn complete_document(&self, document_id: i64, artifact_ref: &str) -> Result<DocumentRecord, BookingError> {
        if artifact_ref.trim().is_empty() {
            return Err(BookingError::RenderError(format!("No artifact reference was given for document #{document_id}")));
        }
        let mut tx = WriteTransaction::begin(&self.pool).await?;
        let doc = documents::mark_issued(document_id, artifact_ref, &mut tx)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("Pending document #{document_id}")))?;
        tx.commit().await?;
        Ok(doc)
    }

    async fn release_document_claim(&self, document_id: i64) -> Result<(), BookingError> {
        let mut tx = WriteTransaction::begin(&self.pool).await?;
        if !documents::delete_claim(document_id, &mut tx).await? {
            warn!("🗃️ Document #{document_id} was not pending, so its claim could not be released");
        }
        tx.commit().await?;
        Ok(())
    }
}

impl BookingQueries for SqliteDatabase {
    async fn fetch_order_by_id(&self, order_id: i64) -> Result<Option<Order>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_id(order_id, &mut conn).await?)
    }

    async fn fetch_order_by_booking_code(&self, code: &BookingCode) -> Result<Option<Order>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_booking_code(code, &mut conn).await?)
    }

    async fn fetch_order_by_tracking_code(&self, code: &TrackingCode) -> Result<Option<Order>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_tracking_code(code, &mut conn).await?)
    }

    async fn fetch_orders_for_customer(&self, customer_id: &str) -> Result<Vec<Order>, BookingError> {
        let query = OrderQueryFilter::default().with_customer_id(customer_id);
        self.search_orders(query).await
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::search_orders(query, &mut conn).await?)
    }

    async fn fetch_service(&self, service_id: i64) -> Result<Option<Service>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        Ok(services::fetch_service(service_id, &mut conn).await?)
    }

    async fn fetch_services(&self) -> Result<Vec<Service>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        Ok(services::fetch_services(&mut conn).await?)
    }

    async fn fetch_payments_for_order(&self, order_id: i64) -> Result<Vec<Payment>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_payments_for_order(order_id, &mut conn).await?)
    }

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<Payment>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_payment(payment_id, &mut conn).await?)
    }

    async fn fetch_meetings_for_order(&self, order_id: i64) -> Result<Vec<Meeting>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        Ok(meetings::fetch_meetings_for_order(order_id, &mut conn).await?)
    }

    async fn fetch_meeting(&self, meeting_id: i64) -> Result<Option<Meeting>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        Ok(meetings::fetch_meeting(meeting_id, &mut conn).await?)
    }

    async fn fetch_meeting_by_link_ref(&self, link_ref: &str) -> Result<Option<Meeting>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        Ok(meetings::fetch_meeting_by_link_ref(link_ref, &mut conn).await?)
    }

    async fn fetch_documents_for_order(&self, order_id: i64) -> Result<Vec<DocumentRecord>, BookingError> {
        let mut conn = self.pool.acquire().await?;
        Ok(documents::fetch_documents_for_order(order_id, &mut conn).await?)
    }
}
