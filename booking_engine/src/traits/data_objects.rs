use serde::{Deserialize, Serialize};

use crate::db_types::{Order, Payment};

/// A newly recorded payment, with the order as it stands after recording it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedPayment {
    pub payment: Payment,
    pub order: Order,
}

/// The outcome of approving or rejecting a payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub payment: Payment,
    /// The order as it stands after the verification
    pub order: Order,
    /// True if this verification brought the balance to zero and settled the order
    pub settled: bool,
}
