use std::path::{Path, PathBuf};

use booking_engine::{
    db_types::DocumentTarget,
    traits::{DocumentPayload, DocumentRenderer, RenderError},
};
use log::*;

/// Writes each document's payload to `<dir>/<booking code>/<document>.json`.
///
/// This is the renderer the server ships with. A PDF service can take its place by implementing
/// [`DocumentRenderer`]; the engine only needs the returned artifact reference.
#[derive(Debug, Clone)]
pub struct JsonFileRenderer {
    dir: PathBuf,
}

impl JsonFileRenderer {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    fn file_name(payload: &DocumentPayload) -> String {
        match payload.target {
            DocumentTarget::Receipt { payment_id } => format!("receipt-{payment_id}-{}.json", payload.document_id),
            target => format!("{}-{}.json", target.kind(), payload.document_id),
        }
    }
}

impl DocumentRenderer for JsonFileRenderer {
    async fn render(&self, payload: &DocumentPayload) -> Result<String, RenderError> {
        let dir = self.dir.join(payload.order.booking_code.as_str());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| RenderError(format!("Could not create {}. {e}", dir.display())))?;
        let path = dir.join(Self::file_name(payload));
        let contents = serde_json::to_vec_pretty(payload).map_err(|e| RenderError(e.to_string()))?;
        tokio::fs::write(&path, contents).await.map_err(|e| RenderError(format!("Could not write {}. {e}", path.display())))?;
        debug!("📄️ Wrote {}", path.display());
        Ok(path.to_string_lossy().into_owned())
    }
}
