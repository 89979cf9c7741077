use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    booking_api::{fetch_order, fetch_visible_order, require_admin},
    db_types::{BookingCode, DocumentRecord, DocumentTarget, Order, Principal},
    document_rules::available_documents,
    events::{DocumentIssuedEvent, EventProducers, EventType},
    traits::{BookingDatabase, BookingError, DocumentPayload, DocumentRenderer},
};

/// Generates invoices, memoranda of understanding and receipts.
///
/// Generation is a three-step affair:
/// 1. The document record is claimed. Availability is checked and the pending record created in one transaction, so
///    two concurrent requests can never both get the same document.
/// 2. The renderer is called, outside any transaction.
/// 3. The record is completed with the artifact reference, or, if rendering or completion failed, the claim is
///    released so the document can be requested again.
///
/// A claim that is neither completed nor released (the process died mid-render, say) stops blocking its document once
/// it is older than the claim timeout.
///
/// Rendering never touches the order or its ledger.
pub struct DocumentApi<B, R> {
    db: B,
    renderer: R,
    producers: EventProducers,
    claim_timeout: Duration,
}

pub const DEFAULT_CLAIM_TIMEOUT_SECS: i64 = 600;

impl<B, R> Debug for DocumentApi<B, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DocumentApi")
    }
}

impl<B, R> DocumentApi<B, R> {
    pub fn new(db: B, renderer: R, producers: EventProducers) -> Self {
        Self { db, renderer, producers, claim_timeout: Duration::seconds(DEFAULT_CLAIM_TIMEOUT_SECS) }
    }

    /// How long a pending claim may block its document before it is considered abandoned.
    pub fn with_claim_timeout(mut self, timeout: Duration) -> Self {
        self.claim_timeout = timeout;
        self
    }
}

impl<B, R> DocumentApi<B, R>
where
    B: BookingDatabase,
    R: DocumentRenderer,
{
    /// The documents that may be generated for the order right now.
    pub async fn available_documents(
        &self,
        principal: &Principal,
        code: &BookingCode,
    ) -> Result<Vec<DocumentTarget>, BookingError> {
        let order = fetch_visible_order(&self.db, principal, code).await?;
        let meetings = self.db.fetch_meetings_for_order(order.id).await?;
        let payments = self.db.fetch_payments_for_order(order.id).await?;
        let stale_before = Utc::now() - self.claim_timeout;
        let mut documents = self.db.fetch_documents_for_order(order.id).await?;
        documents.retain(|d| !d.is_stale_claim(stale_before));
        Ok(available_documents(&order, &meetings, &payments, &documents))
    }

    pub async fn documents_for_order(
        &self,
        principal: &Principal,
        code: &BookingCode,
    ) -> Result<Vec<DocumentRecord>, BookingError> {
        let order = fetch_visible_order(&self.db, principal, code).await?;
        self.db.fetch_documents_for_order(order.id).await
    }

    pub async fn generate_document(
        &self,
        principal: &Principal,
        code: &BookingCode,
        target: DocumentTarget,
    ) -> Result<DocumentRecord, BookingError> {
        require_admin(principal, "generate documents")?;
        let order = fetch_order(&self.db, code).await?;
        let stale_before = Utc::now() - self.claim_timeout;
        let claim = self.db.claim_document(order.id, target, &principal.id, stale_before).await?;
        debug!("📄️ Claimed document #{} ({target}) for order {code}", claim.id);
        let completed = match self.render(&order, &claim, target).await {
            Ok(artifact) => self.db.complete_document(claim.id, &artifact).await.map(|doc| (doc, artifact)),
            Err(e) => Err(e),
        };
        let (document, artifact) = match completed {
            Ok(done) => done,
            Err(e) => {
                warn!("📄️ Generating the {target} for order {code} failed. Releasing the claim. {e}");
                if let Err(release_err) = self.db.release_document_claim(claim.id).await {
                    error!("📄️ Could not release claim #{} for order {code}: {release_err}", claim.id);
                }
                return Err(e);
            },
        };
        info!("📄️ Issued the {target} for order {code} as {artifact}");
        let event = DocumentIssuedEvent { order, document: document.clone() };
        self.producers.publish(EventType::DocumentIssued(event)).await;
        Ok(document)
    }

    async fn render(&self, order: &Order, claim: &DocumentRecord, target: DocumentTarget) -> Result<String, BookingError> {
        let service = self.db.fetch_service(order.service_id).await?;
        let payment = match target.payment_id() {
            Some(id) => self.db.fetch_payment(id).await?,
            None => None,
        };
        let meeting = match target {
            DocumentTarget::Mou => self.db.fetch_meetings_for_order(order.id).await?.into_iter().last(),
            _ => None,
        };
        let payload = DocumentPayload { document_id: claim.id, target, order: order.clone(), service, payment, meeting };
        self.renderer.render(&payload).await.map_err(|e| BookingError::RenderError(e.to_string()))
    }
}
