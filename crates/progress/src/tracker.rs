//! Progress tracking service.
//!
//! [`ProgressTracker`] is the per-session entry point. Each mutation runs
//! as one turn (load → mutate → recompute → persist → notify) under a
//! lock, then hands the module's new state to the reconciler for a
//! background push.

use crate::config::{Identity, TrackerConfig};
use crate::notify::{ProgressListener, Subscription};
use crate::reconciler::{ErrorReporter, Reconciler, TracingReporter};
use crate::remote::RemoteProgress;
use crate::store::{ImportError, ProgressStore};
use safescape_core::schema::keys;
use safescape_core::{
    merge_remote, module_fill_ratio, recompute_completion, ModuleNum, ProgressDocument,
    ProgressUpdate, RemoteProgressRecord, RemoteSnapshot, SectionValue, Sections,
};
use safescape_storage::ProgressStorage;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Learner progress tracker for one session.
pub struct ProgressTracker {
    store: ProgressStore,
    reconciler: Option<Reconciler>,
    reporter: Arc<dyn ErrorReporter>,
    config: TrackerConfig,
    turn: Mutex<()>,
}

impl ProgressTracker {
    /// Create a tracker over `storage` with no remote (guest mode).
    pub fn new(storage: Arc<dyn ProgressStorage>, config: TrackerConfig) -> Self {
        Self {
            store: ProgressStore::new(storage, &config),
            reconciler: None,
            reporter: Arc::new(TracingReporter),
            config,
            turn: Mutex::new(()),
        }
    }

    /// Sync with `remote` as `identity`. Passing `None` keeps guest mode.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteProgress>, identity: Option<Identity>) -> Self {
        let reconciler = Reconciler::new(remote, identity, self.store.notifier().clone())
            .with_reporter(Arc::clone(&self.reporter));
        self.reconciler = Some(reconciler);
        self
    }

    /// Route swallowed remote failures to `reporter`.
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        if let Some(reconciler) = self.reconciler.as_mut() {
            reconciler.set_reporter(Arc::clone(&reporter));
        }
        self.reporter = reporter;
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// The underlying document store.
    pub fn store(&self) -> &ProgressStore {
        &self.store
    }

    /// Register a change listener.
    pub fn subscribe(&self, listener: impl ProgressListener + 'static) -> Subscription {
        self.store.subscribe(listener)
    }

    /// Whether remote sync is active for this session.
    pub fn is_authenticated(&self) -> bool {
        self.reconciler.as_ref().is_some_and(Reconciler::is_authenticated)
    }

    // === Document ===

    /// Current document.
    pub async fn progress(&self) -> ProgressDocument {
        self.store.load().await
    }

    /// Persist a caller-edited document.
    pub async fn save(&self, doc: &mut ProgressDocument) -> bool {
        let _turn = self.turn.lock().await;
        self.store.save(doc).await
    }

    /// Discard all local progress.
    pub async fn reset(&self) -> ProgressDocument {
        let _turn = self.turn.lock().await;
        info!("Resetting progress");
        self.store.reset().await
    }

    // === Sections & modules ===

    /// Record a section value and re-evaluate the module.
    ///
    /// An unknown module number or a key outside the module's schema leaves
    /// the document untouched.
    pub async fn complete_section(
        &self,
        module: u8,
        key: &str,
        value: impl Into<SectionValue>,
    ) -> ProgressDocument {
        let _turn = self.turn.lock().await;
        let mut doc = self.store.load().await;

        let Some(n) = ModuleNum::new(module) else {
            warn!("Ignoring section {:?} for unknown module {}", key, module);
            return doc;
        };
        if !doc.set_section(n, key, value.into()) {
            warn!("Ignoring unknown section {:?} for module {}", key, n);
            return doc;
        }

        if recompute_completion(&mut doc, n) {
            info!("Module {} completed", n);
        }
        self.store.save(&mut doc).await;
        self.push(&doc, n);
        doc
    }

    /// Whether the learner may open a module.
    pub async fn is_module_unlocked(&self, module: u8) -> bool {
        match ModuleNum::new(module) {
            Some(n) => self.progress().await.module(n).unlocked,
            None => false,
        }
    }

    /// Whether a module is completed.
    pub async fn is_module_completed(&self, module: u8) -> bool {
        match ModuleNum::new(module) {
            Some(n) => self.progress().await.module(n).completed,
            None => false,
        }
    }

    /// Share of a module's sections filled in, as a percentage.
    pub async fn module_progress(&self, module: u8) -> u8 {
        match ModuleNum::new(module) {
            Some(n) => module_fill_ratio(&self.progress().await, n),
            None => 0,
        }
    }

    // === Student ===

    /// Set the display name.
    pub async fn set_student_name(&self, name: impl Into<String>) -> ProgressDocument {
        let _turn = self.turn.lock().await;
        let mut doc = self.store.load().await;
        doc.student_name = name.into();
        self.store.save(&mut doc).await;
        doc
    }

    /// Display name, or the placeholder when none is set.
    pub async fn student_name(&self) -> String {
        let doc = self.progress().await;
        if doc.student_name.is_empty() {
            self.config.placeholder_name.clone()
        } else {
            doc.student_name
        }
    }

    // === Certificate ===

    /// Award the course certificate, completing the final module.
    pub async fn award_certificate(&self) -> ProgressDocument {
        let _turn = self.turn.lock().await;
        let mut doc = self.store.load().await;
        let last = ModuleNum::last();

        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let module = doc.module_mut(last);
        module.sections.insert(keys::CERTIFIED.to_string(), true.into());
        module
            .sections
            .insert(keys::CERTIFICATION_DATE.to_string(), SectionValue::Text(now));
        module.completed = true;

        info!("Certificate awarded");
        self.store.save(&mut doc).await;
        self.push(&doc, last);
        doc
    }

    /// Whether the certificate has been awarded.
    pub async fn is_certified(&self) -> bool {
        let last = ModuleNum::last();
        self.progress().await.module(last).flag(keys::CERTIFIED)
    }

    // === Export / import ===

    /// The current document as pretty-printed JSON.
    pub async fn export_json(&self) -> String {
        self.store.export_json().await
    }

    /// Import a document, merging it onto defaults. Returns whether the
    /// payload was accepted.
    pub async fn import_json(&self, json: &str) -> bool {
        let _turn = self.turn.lock().await;
        self.store.import_json(json).await
    }

    /// Import a document, returning the reason on rejection.
    pub async fn try_import_json(&self, json: &str) -> Result<ProgressDocument, ImportError> {
        let _turn = self.turn.lock().await;
        self.store.try_import_json(json).await
    }

    // === Remote ===

    /// Push one module's sections and wait for the outcome.
    pub async fn sync_remote(&self, module: u8, section_data: Sections, completed: bool) -> bool {
        let (Some(reconciler), Some(module_num)) = (self.reconciler.as_ref(), ModuleNum::new(module)) else {
            debug!("Skipping progress sync for module {}", module);
            return false;
        };
        reconciler
            .sync_remote(ProgressUpdate {
                module_num,
                section_data,
                completed,
            })
            .await
    }

    /// Fetch the full remote snapshot.
    pub async fn fetch_remote(&self) -> Option<RemoteSnapshot> {
        self.reconciler.as_ref()?.fetch().await
    }

    /// Fetch one module's remote record.
    pub async fn fetch_remote_module(&self, module: u8) -> Option<RemoteProgressRecord> {
        let reconciler = self.reconciler.as_ref()?;
        reconciler.fetch_module(ModuleNum::new(module)?).await
    }

    /// Merge the server's view into the local document. Called once at
    /// session start; returns whether a merge was applied.
    ///
    /// Any fetch failure leaves the local document as it is.
    pub async fn initialize_from_remote(&self) -> bool {
        let Some(reconciler) = self.reconciler.as_ref() else {
            return false;
        };
        let Some(snapshot) = reconciler.fetch().await else {
            return false;
        };

        let _turn = self.turn.lock().await;
        let mut doc = self.store.load().await;
        merge_remote(&mut doc, &snapshot.progress);

        let name = reconciler.identity().and_then(|i| i.user_name.as_deref());
        if let Some(name) = name.filter(|n| !n.is_empty() && *n != self.config.placeholder_name) {
            doc.student_name = name.to_string();
        }

        self.store.save(&mut doc).await;
        info!(
            "Merged {} remote module record(s), {}% overall",
            snapshot.progress.len(),
            doc.overall_progress
        );
        true
    }

    /// Wait for background pushes. Returns how many succeeded.
    pub async fn flush(&self) -> usize {
        match self.reconciler.as_ref() {
            Some(reconciler) => reconciler.flush().await,
            None => 0,
        }
    }

    fn push(&self, doc: &ProgressDocument, n: ModuleNum) {
        if let Some(reconciler) = self.reconciler.as_ref() {
            let module = doc.module(n);
            reconciler.spawn_push(ProgressUpdate {
                module_num: n,
                section_data: module.sections.clone(),
                completed: module.completed,
            });
        }
    }
}
