//! Document store - owns the persisted progress document.
//!
//! Reads never fail: missing or corrupt state falls back to the default
//! document. Writes report success as a `bool` and never roll back the
//! caller's in-memory copy.

use crate::config::TrackerConfig;
use crate::notify::{Notifier, ProgressListener, Subscription};
use safescape_core::{
    calculate_overall_progress, merge_onto_defaults, MergeError, ProgressDocument, ProgressEvent,
};
use safescape_storage::ProgressStorage;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Errors from importing a progress payload.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// Not valid JSON
    #[error("invalid progress JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Valid JSON that cannot be merged onto the document
    #[error(transparent)]
    Merge(#[from] MergeError),
}

/// Canonical owner of the progress document.
pub struct ProgressStore {
    storage: Arc<dyn ProgressStorage>,
    notifier: Notifier,
    key: String,
}

impl ProgressStore {
    /// Create a store over `storage`.
    pub fn new(storage: Arc<dyn ProgressStorage>, config: &TrackerConfig) -> Self {
        Self {
            storage,
            notifier: Notifier::new(),
            key: config.storage_key.clone(),
        }
    }

    /// The notifier save and reset emit through.
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Register a change listener.
    pub fn subscribe(&self, listener: impl ProgressListener + 'static) -> Subscription {
        self.notifier.subscribe(listener)
    }

    /// Load the persisted document merged onto defaults, or a fresh
    /// default document.
    pub async fn load(&self) -> ProgressDocument {
        let raw = match self.storage.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return ProgressDocument::default(),
            Err(e) => {
                error!("Error reading progress: {}", e);
                return ProgressDocument::default();
            }
        };

        let parsed = serde_json::from_str(&raw)
            .map_err(ImportError::from)
            .and_then(|value| merge_onto_defaults(value).map_err(ImportError::from));

        match parsed {
            Ok(doc) => doc,
            Err(e) => {
                error!("Discarding corrupt progress: {}", e);
                ProgressDocument::default()
            }
        }
    }

    /// Stamp, recompute and persist `doc`, then notify listeners.
    ///
    /// Returns whether persistence succeeded. The stamps are applied to
    /// `doc` either way.
    pub async fn save(&self, doc: &mut ProgressDocument) -> bool {
        doc.last_accessed = Some(chrono::Utc::now());
        doc.overall_progress = calculate_overall_progress(doc);

        let json = match serde_json::to_string(doc) {
            Ok(json) => json,
            Err(e) => {
                error!("Error encoding progress: {}", e);
                return false;
            }
        };

        if let Err(e) = self.storage.set(&self.key, &json).await {
            error!("Error saving progress: {}", e);
            return false;
        }

        debug!("Saved progress ({}% overall)", doc.overall_progress);
        self.notifier.emit(&ProgressEvent::updated(doc));
        true
    }

    /// Clear persisted state and return the default document.
    pub async fn reset(&self) -> ProgressDocument {
        if let Err(e) = self.storage.remove(&self.key).await {
            warn!("Error clearing progress: {}", e);
        }
        let doc = ProgressDocument::default();
        self.notifier.emit(&ProgressEvent::updated(&doc));
        doc
    }

    /// The current document as pretty-printed JSON.
    pub async fn export_json(&self) -> String {
        let doc = self.load().await;
        serde_json::to_string_pretty(&doc).unwrap_or_else(|e| {
            error!("Error encoding progress: {}", e);
            String::from("{}")
        })
    }

    /// Parse `json`, merge it onto defaults and persist it. On error the
    /// stored document is left untouched.
    pub async fn try_import_json(&self, json: &str) -> Result<ProgressDocument, ImportError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let mut doc = merge_onto_defaults(value)?;
        self.save(&mut doc).await;
        Ok(doc)
    }

    /// Like [`try_import_json`](Self::try_import_json), reporting only
    /// whether the payload was accepted.
    pub async fn import_json(&self, json: &str) -> bool {
        match self.try_import_json(json).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Rejected progress import: {}", e);
                false
            }
        }
    }
}
