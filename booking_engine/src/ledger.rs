//! Installment policy and balance arithmetic for the payment ledger.
//!
//! Nothing in here touches storage. The SQLite backend calls these functions from inside its transactions.
use log::*;
use serde::{Deserialize, Serialize};
use studio_common::Rupiah;

use crate::{
    db_types::{Payment, PaymentKind},
    traits::BookingError,
};

pub const DEFAULT_DOWN_PAYMENT_PERCENT: u32 = 25;
pub const DEFAULT_PAYMENT_METHOD: &str = "bank_transfer";

//--------------------------------------   InstallmentPolicy   ---------------------------------------------------------
/// How an order total is split into installments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentPolicy {
    down_payment_percent: u32,
}

impl Default for InstallmentPolicy {
    fn default() -> Self {
        Self { down_payment_percent: DEFAULT_DOWN_PAYMENT_PERCENT }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentQuote {
    pub total: Rupiah,
    pub down_payment: Rupiah,
    pub down_payment_percent: u32,
    pub settlement: Rupiah,
    pub settlement_percent: u32,
}

impl InstallmentPolicy {
    /// The down payment share must leave something for the settlement, so only 1..=99 is accepted.
    pub fn new(down_payment_percent: u32) -> Result<Self, BookingError> {
        if !(1..=99).contains(&down_payment_percent) {
            return Err(BookingError::InvalidAmount(format!(
                "Down payment percentage must be between 1 and 99, not {down_payment_percent}"
            )));
        }
        Ok(Self { down_payment_percent })
    }

    pub fn down_payment_percent(&self) -> u32 {
        self.down_payment_percent
    }

    pub fn settlement_percent(&self) -> u32 {
        100 - self.down_payment_percent
    }

    /// Splits `total` into a down payment and a settlement.
    ///
    /// The down payment is rounded half-up to the whole rupiah, and the settlement takes whatever is left, so the two
    /// always add up to `total` exactly.
    pub fn quote(&self, total: Rupiah) -> Result<InstallmentQuote, BookingError> {
        if !total.is_positive() {
            return Err(BookingError::InvalidAmount(format!("Order total must be positive, not {total}")));
        }
        let down_payment = total.percent_half_up(self.down_payment_percent);
        let settlement = total - down_payment;
        Ok(InstallmentQuote {
            total,
            down_payment,
            down_payment_percent: self.down_payment_percent,
            settlement,
            settlement_percent: self.settlement_percent(),
        })
    }

    /// The exact amount (and share of the total, in percent) that a payment of `kind` must carry.
    pub fn expected_amount(&self, kind: PaymentKind, total: Rupiah) -> Result<(Rupiah, u32), BookingError> {
        let quote = self.quote(total)?;
        let result = match kind {
            PaymentKind::DownPayment => (quote.down_payment, quote.down_payment_percent),
            PaymentKind::Settlement => (quote.settlement, quote.settlement_percent),
            PaymentKind::Full => (quote.total, 100),
        };
        Ok(result)
    }

    /// Checks a new payment against the policy and the order's existing payment records.
    ///
    /// * The amount must match the expected installment exactly.
    /// * On very small totals an installment can round to nothing. Such an installment cannot be recorded, and the
    ///   order has to be paid in `full` (or by its other, non-zero installment).
    /// * A `full` payment cannot sit alongside an active down payment or settlement, and vice versa.
    /// * Only one active (pending or paid) record of each kind is allowed.
    ///
    /// Returns the percentage that the payment represents.
    pub fn check_new_payment(
        &self,
        kind: PaymentKind,
        amount: Rupiah,
        total: Rupiah,
        existing: &[Payment],
    ) -> Result<u32, BookingError> {
        let (expected, percent) = self.expected_amount(kind, total)?;
        if expected.is_zero() {
            return Err(BookingError::InvalidAmount(format!(
                "A {kind} on a total of {total} comes to {expected}. Record a full payment instead"
            )));
        }
        if amount != expected {
            return Err(BookingError::AmountMismatch { kind, expected, actual: amount });
        }
        let mut active = existing.iter().filter(|p| p.is_active());
        let conflict = match kind {
            PaymentKind::Full => active.find(|p| p.kind != PaymentKind::Full),
            _ => active.find(|p| p.kind == PaymentKind::Full),
        };
        if let Some(p) = conflict {
            debug!("💰️ A {kind} payment cannot be combined with the existing {} record #{}", p.kind, p.id);
            return Err(BookingError::AmountMismatch { kind, expected, actual: amount });
        }
        if existing.iter().any(|p| p.is_active() && p.kind == kind) {
            return Err(BookingError::DuplicatePayment(kind));
        }
        Ok(percent)
    }
}

/// Total due minus the sum of verified, paid amounts.
///
/// A negative result means more money was verified than was ever due. That can only happen through a bug or a
/// corrupted store, so it is reported as [`BookingError::LedgerInvariantViolation`].
pub fn remaining_balance(order_id: i64, total: Rupiah, payments: &[Payment]) -> Result<Rupiah, BookingError> {
    let paid = payments.iter().filter(|p| p.is_settled_funds()).map(|p| p.amount).sum::<Rupiah>();
    let balance = total - paid;
    if balance.is_negative() {
        let msg = format!("Order #{order_id} has {paid} in verified payments against a total of {total}");
        error!("🚨️💰️ LEDGER INVARIANT VIOLATION. {msg}");
        return Err(BookingError::LedgerInvariantViolation(msg));
    }
    Ok(balance)
}

//--------------------------------------  PaymentMethodRegistry  -------------------------------------------------------
/// The payment methods the studio accepts. Payments naming any other method are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodRegistry {
    methods: Vec<String>,
}

impl Default for PaymentMethodRegistry {
    fn default() -> Self {
        Self { methods: vec![DEFAULT_PAYMENT_METHOD.to_string()] }
    }
}

impl PaymentMethodRegistry {
    /// An empty list falls back to the default registry.
    pub fn new<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut result = Vec::new();
        for m in methods {
            let m = m.as_ref().trim().to_lowercase();
            if !m.is_empty() && !result.contains(&m) {
                result.push(m);
            }
        }
        if result.is_empty() {
            warn!("💰️ No payment methods configured. Falling back to {DEFAULT_PAYMENT_METHOD}");
            return Self::default();
        }
        Self { methods: result }
    }

    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    /// Returns the canonical method code for `method`.
    pub fn resolve(&self, method: &str) -> Result<String, BookingError> {
        let method = method.trim().to_lowercase();
        if self.methods.contains(&method) {
            Ok(method)
        } else {
            Err(BookingError::UnsupportedPaymentMethod(method))
        }
    }
}
