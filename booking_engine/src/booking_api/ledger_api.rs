use std::fmt::Debug;

use log::*;
use serde::{Deserialize, Serialize};
use studio_common::Rupiah;

use crate::{
    booking_api::{fetch_order, fetch_visible_order, require_admin, retry_on_conflict},
    db_types::{BookingCode, NewPayment, Order, Payment, Principal},
    events::{EventProducers, EventType, OrderEvent, PaymentEvent},
    ledger::{remaining_balance, InstallmentPolicy, InstallmentQuote, PaymentMethodRegistry},
    traits::{BookingDatabase, BookingError, RecordedPayment, VerificationResult},
};

/// Where an order's ledger stands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub booking_code: BookingCode,
    pub quote: InstallmentQuote,
    pub paid: Rupiah,
    pub remaining_balance: Rupiah,
    pub payments: Vec<Payment>,
}

/// `LedgerApi` records installment payments against validated orders and handles their verification.
///
/// The installment split and the accepted payment methods are configuration, passed in at construction.
pub struct LedgerApi<B> {
    db: B,
    producers: EventProducers,
    policy: InstallmentPolicy,
    methods: PaymentMethodRegistry,
}

impl<B> Debug for LedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerApi ({:?}, {:?})", self.policy, self.methods)
    }
}

impl<B> LedgerApi<B> {
    pub fn new(db: B, producers: EventProducers, policy: InstallmentPolicy, methods: PaymentMethodRegistry) -> Self {
        Self { db, producers, policy, methods }
    }

    pub fn policy(&self) -> &InstallmentPolicy {
        &self.policy
    }

    pub fn payment_methods(&self) -> &PaymentMethodRegistry {
        &self.methods
    }
}

impl<B> LedgerApi<B>
where B: BookingDatabase
{
    /// The down payment and settlement amounts for an order. Quotes are only given once the order has been validated.
    pub async fn quote(&self, principal: &Principal, code: &BookingCode) -> Result<InstallmentQuote, BookingError> {
        let order = fetch_visible_order(&self.db, principal, code).await?;
        self.quote_order(&order)
    }

    fn quote_order(&self, order: &Order) -> Result<InstallmentQuote, BookingError> {
        if !order.status.is_validated() {
            return Err(BookingError::InvalidOrderState(format!(
                "Order {} cannot be quoted while it is {}",
                order.booking_code, order.status
            )));
        }
        self.policy.quote(order.total_price)
    }

    /// Records a payment attempt against an order. The new record is `pending` until an admin verifies it.
    ///
    /// Fails with
    /// * [`BookingError::InvalidOrderState`] unless the order is validated (or settled),
    /// * [`BookingError::UnsupportedPaymentMethod`] if the method is not in the registry,
    /// * [`BookingError::AmountMismatch`] if the amount is not exactly the installment for its kind, or a `full` payment
    ///   is mixed with partial ones,
    /// * [`BookingError::DuplicatePayment`] if a record of the same kind is already pending or paid.
    pub async fn record_payment(
        &self,
        principal: &Principal,
        code: &BookingCode,
        payment: NewPayment,
    ) -> Result<Payment, BookingError> {
        require_admin(principal, "record payments")?;
        let method = self.methods.resolve(&payment.method)?;
        let payment = NewPayment { method, ..payment };
        let db = &self.db;
        let policy = &self.policy;
        let payment = &payment;
        let RecordedPayment { payment, order } = retry_on_conflict("record_payment", || async move {
            let order = fetch_order(db, code).await?;
            db.insert_payment(order.id, payment.clone(), policy).await
        })
        .await?;
        info!(
            "💰️ {} payment #{} of {} recorded against order {code} by {principal}",
            payment.kind, payment.id, payment.amount
        );
        self.producers.publish(EventType::PaymentRecorded(PaymentEvent::new(order, payment.clone()))).await;
        Ok(payment)
    }

    /// Approves (`approve = true`) or rejects a pending payment.
    ///
    /// Approval marks the payment paid and verified, and recomputes the balance. If that brings the balance to zero,
    /// the order is settled in the same step. Rejection marks the payment failed and leaves the balance alone.
    pub async fn verify_payment(
        &self,
        principal: &Principal,
        payment_id: i64,
        approve: bool,
    ) -> Result<VerificationResult, BookingError> {
        require_admin(principal, "verify payments")?;
        let db = &self.db;
        let verifier = principal.id.as_str();
        let result = retry_on_conflict("verify_payment", || async move {
            db.verify_payment(payment_id, approve, verifier).await
        })
        .await?;
        let verdict = if approve { "approved" } else { "rejected" };
        info!(
            "💰️ Payment #{payment_id} for order {} {verdict} by {principal}. Balance is now {}",
            result.order.booking_code, result.payment.remaining_balance
        );
        let event = PaymentEvent::new(result.order.clone(), result.payment.clone());
        self.producers.publish(EventType::PaymentVerified(event)).await;
        if result.settled {
            info!("💰️ Order {} has been settled", result.order.booking_code);
            self.producers.publish(EventType::OrderSettled(OrderEvent::new(result.order.clone()))).await;
        }
        Ok(result)
    }

    /// Total due minus verified, paid amounts.
    pub async fn remaining_balance(&self, principal: &Principal, code: &BookingCode) -> Result<Rupiah, BookingError> {
        let order = fetch_visible_order(&self.db, principal, code).await?;
        let payments = self.db.fetch_payments_for_order(order.id).await?;
        remaining_balance(order.id, order.total_price, &payments)
    }

    pub async fn payments_for_order(
        &self,
        principal: &Principal,
        code: &BookingCode,
    ) -> Result<Vec<Payment>, BookingError> {
        let order = fetch_visible_order(&self.db, principal, code).await?;
        self.db.fetch_payments_for_order(order.id).await
    }

    pub async fn ledger_summary(&self, principal: &Principal, code: &BookingCode) -> Result<LedgerSummary, BookingError> {
        let order = fetch_visible_order(&self.db, principal, code).await?;
        let quote = self.quote_order(&order)?;
        let payments = self.db.fetch_payments_for_order(order.id).await?;
        let balance = remaining_balance(order.id, order.total_price, &payments)?;
        Ok(LedgerSummary {
            booking_code: order.booking_code,
            quote,
            paid: order.total_price - balance,
            remaining_balance: balance,
            payments,
        })
    }
}
