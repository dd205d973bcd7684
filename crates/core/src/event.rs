//! Progress events - notifications emitted to observers and forwarded to
//! an embedding context.

use crate::document::ProgressDocument;
use crate::module_num::ModuleNum;
use crate::section::Sections;
use serde::{Deserialize, Serialize};

/// Something observers of the progress document may react to.
///
/// Serializes as the message shape an embedding context expects, e.g.
/// `{"type": "PROGRESS_UPDATE", "progress": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressEvent {
    /// The document was saved (or reset)
    ProgressUpdate {
        /// The document as persisted
        progress: Box<ProgressDocument>,
    },

    /// A module's sections reached the server
    #[serde(rename_all = "camelCase")]
    SectionComplete {
        /// Module that was pushed
        module_num: ModuleNum,
        /// The pushed section mapping
        section_data: Sections,
        /// The pushed completion flag
        completed: bool,
    },
}

impl ProgressEvent {
    /// Event for a saved document.
    pub fn updated(progress: &ProgressDocument) -> Self {
        ProgressEvent::ProgressUpdate {
            progress: Box::new(progress.clone()),
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::ProgressUpdate { .. } => "PROGRESS_UPDATE",
            ProgressEvent::SectionComplete { .. } => "SECTION_COMPLETE",
        }
    }
}
