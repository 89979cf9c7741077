use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{DocumentTarget, Meeting, Order, Payment, Service};

#[derive(Debug, Clone, Error)]
#[error("Rendering failed: {0}")]
pub struct RenderError(pub String);

/// Everything a renderer gets to see when producing a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPayload {
    pub document_id: i64,
    pub target: DocumentTarget,
    pub order: Order,
    pub service: Option<Service>,
    /// Set for receipts
    pub payment: Option<Payment>,
    /// Set for memoranda
    pub meeting: Option<Meeting>,
}

/// The external document renderer. It produces an artifact and returns a reference to it (a path, URL or storage
/// key). The output format is the renderer's business.
///
/// Renderers are only called once the document record has been claimed and committed. A failure here never changes
/// order or ledger state.
#[allow(async_fn_in_trait)]
pub trait DocumentRenderer: Clone {
    async fn render(&self, payload: &DocumentPayload) -> Result<String, RenderError>;
}
