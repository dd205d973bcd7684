//! Remote progress records - the server-of-record's view of a learner.

use crate::module_num::ModuleNum;
use crate::section::Sections;
use crate::Time;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// One module's progress as stored by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProgressRecord {
    /// Module number as reported by the server
    pub module_num: u8,

    /// Section values (transmitted as an object or a serialized blob)
    #[serde(default, deserialize_with = "section_blob")]
    pub section_data: Sections,

    /// Server-side completion flag
    #[serde(default)]
    pub completed: bool,

    /// When the server recorded completion
    #[serde(default)]
    pub completed_at: Option<Time>,
}

/// All remote records for one learner, as returned by the progress endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSnapshot {
    /// Whether the server reported success
    #[serde(default)]
    pub success: bool,

    /// Identity the server resolved
    #[serde(default)]
    pub user_id: Option<String>,

    /// Display name the server knows
    #[serde(default)]
    pub user_name: Option<String>,

    /// Records keyed by module number
    #[serde(default, deserialize_with = "progress_map")]
    pub progress: BTreeMap<ModuleNum, RemoteProgressRecord>,

    /// Server-computed overall percentage
    #[serde(default)]
    pub overall_progress: u8,

    /// Server-computed completed module count
    #[serde(default)]
    pub completed_modules: usize,
}

impl RemoteSnapshot {
    /// Whether the server has marked a module completed.
    pub fn is_completed(&self, n: ModuleNum) -> bool {
        self.progress.get(&n).is_some_and(|r| r.completed)
    }
}

/// Response to a single-module query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteModuleResponse {
    /// Whether the server reported success
    #[serde(default)]
    pub success: bool,

    /// The record, if the learner has one for this module
    #[serde(default)]
    pub progress: Option<RemoteProgressRecord>,
}

/// Full-state upsert for one module, sent after every local mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    /// Target module
    pub module_num: ModuleNum,

    /// The module's entire current section mapping
    pub section_data: Sections,

    /// Local completion flag
    pub completed: bool,
}

fn section_blob<'de, D>(deserializer: D) -> Result<Sections, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Blob {
        Map(Sections),
        Serialized(String),
        Missing(()),
    }

    Ok(match Blob::deserialize(deserializer)? {
        Blob::Map(sections) => sections,
        Blob::Serialized(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
            tracing::warn!("Ignoring unparseable remote section data: {}", e);
            Sections::new()
        }),
        Blob::Missing(()) => Sections::new(),
    })
}

fn progress_map<'de, D>(deserializer: D) -> Result<BTreeMap<ModuleNum, RemoteProgressRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, RemoteProgressRecord>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, record)| match key.parse::<ModuleNum>() {
            Ok(n) => Some((n, record)),
            Err(e) => {
                tracing::debug!("Skipping remote record with key {:?}: {}", key, e);
                None
            }
        })
        .collect())
}
