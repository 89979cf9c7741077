//! Decides which documents may be generated for an order right now.
//!
//! The rules only look at records; rendering is someone else's job.
//!
//! * An invoice needs a validated (or settled) order and no invoice record yet.
//! * A memorandum of understanding needs a meeting, in any status, and no memorandum record yet.
//! * A receipt is available for every paid payment that doesn't have a receipt yet.
//!
//! Claimed (pending) document records count as existing, so two requests racing for the same document cannot both be
//! authorised.
use crate::db_types::{DocumentKind, DocumentRecord, DocumentTarget, Meeting, Order, Payment, PaymentStatus};

pub fn available_documents(
    order: &Order,
    meetings: &[Meeting],
    payments: &[Payment],
    documents: &[DocumentRecord],
) -> Vec<DocumentTarget> {
    let has_kind = |kind: DocumentKind| documents.iter().any(|d| d.order_id == order.id && d.kind == kind);
    let mut result = Vec::new();
    if order.status.is_validated() && !has_kind(DocumentKind::Invoice) {
        result.push(DocumentTarget::Invoice);
    }
    if meetings.iter().any(|m| m.order_id == order.id) && !has_kind(DocumentKind::Mou) {
        result.push(DocumentTarget::Mou);
    }
    let receipts = payments
        .iter()
        .filter(|p| p.order_id == order.id && p.status == PaymentStatus::Paid)
        .filter(|p| !documents.iter().any(|d| d.kind == DocumentKind::Receipt && d.payment_id == Some(p.id)))
        .map(|p| DocumentTarget::Receipt { payment_id: p.id });
    result.extend(receipts);
    result
}

pub fn is_available(
    target: DocumentTarget,
    order: &Order,
    meetings: &[Meeting],
    payments: &[Payment],
    documents: &[DocumentRecord],
) -> bool {
    available_documents(order, meetings, payments, documents).contains(&target)
}
