//! Reconciler - pushes local section updates to the server of record and
//! pulls remote snapshots for merging.
//!
//! Pushes are best-effort: a failed push is reported and dropped, with no
//! retry queue. Every push carries the module's entire section mapping, so
//! whichever push lands last leaves the server self-consistent.

use crate::config::Identity;
use crate::notify::Notifier;
use crate::remote::{RemoteError, RemoteProgress};
use safescape_core::{ModuleNum, ProgressEvent, ProgressUpdate, RemoteProgressRecord, RemoteSnapshot};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Receives remote failures the reconciler swallows.
pub trait ErrorReporter: Send + Sync {
    /// Record a failure of `operation`.
    fn report(&self, operation: &str, error: &RemoteError);
}

/// Reports failures through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, operation: &str, error: &RemoteError) {
        warn!("Progress {} failed: {}", operation, error);
    }
}

/// Two-way sync between the local document and the progress API.
pub struct Reconciler {
    remote: Arc<dyn RemoteProgress>,
    identity: Option<Identity>,
    notifier: Notifier,
    reporter: Arc<dyn ErrorReporter>,
    pending: Mutex<Vec<JoinHandle<bool>>>,
}

impl Reconciler {
    /// Create a reconciler. Without an identity every operation is a no-op.
    pub fn new(remote: Arc<dyn RemoteProgress>, identity: Option<Identity>, notifier: Notifier) -> Self {
        Self {
            remote,
            identity,
            notifier,
            reporter: Arc::new(TracingReporter),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Route swallowed failures to `reporter`.
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Replace the error reporter.
    pub fn set_reporter(&mut self, reporter: Arc<dyn ErrorReporter>) {
        self.reporter = reporter;
    }

    /// The resolved identity, if any.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Whether an identity is resolvable.
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// Push one module and wait for the outcome.
    pub async fn sync_remote(&self, update: ProgressUpdate) -> bool {
        if !self.is_authenticated() {
            debug!("Skipping progress sync: not authenticated");
            return false;
        }
        push(
            Arc::clone(&self.remote),
            self.notifier.clone(),
            Arc::clone(&self.reporter),
            update,
        )
        .await
    }

    /// Push one module in the background. The caller is not suspended and
    /// completion order across pushes is not guaranteed.
    ///
    /// The push runs detached: dropping the reconciler does not cancel it.
    pub fn spawn_push(&self, update: ProgressUpdate) {
        if !self.is_authenticated() {
            debug!("Skipping progress sync: not authenticated");
            return;
        }
        let task = push(
            Arc::clone(&self.remote),
            self.notifier.clone(),
            Arc::clone(&self.reporter),
            update,
        );
        let mut pending = self.lock_pending();
        pending.retain(|handle| !handle.is_finished());
        pending.push(tokio::spawn(task));
    }

    /// Wait for every in-flight push. Returns how many succeeded.
    pub async fn flush(&self) -> usize {
        let pending = std::mem::take(&mut *self.lock_pending());
        let mut succeeded = 0;
        for handle in pending {
            match handle.await {
                Ok(true) => succeeded += 1,
                Ok(false) => {}
                Err(e) => warn!("Progress push task aborted: {}", e),
            }
        }
        succeeded
    }

    /// Number of pushes still in flight.
    pub fn pending_pushes(&self) -> usize {
        let mut pending = self.lock_pending();
        pending.retain(|handle| !handle.is_finished());
        pending.len()
    }

    /// Fetch the learner's full remote snapshot.
    pub async fn fetch(&self) -> Option<RemoteSnapshot> {
        if !self.is_authenticated() {
            debug!("Skipping progress fetch: not authenticated");
            return None;
        }
        match self.remote.fetch_all().await {
            Ok(snapshot) => {
                debug!("Fetched {} remote module record(s)", snapshot.progress.len());
                Some(snapshot)
            }
            Err(e) => {
                self.handle_error("fetch", &e);
                None
            }
        }
    }

    /// Fetch one module's remote record.
    pub async fn fetch_module(&self, module: ModuleNum) -> Option<RemoteProgressRecord> {
        if !self.is_authenticated() {
            debug!("Skipping progress fetch: not authenticated");
            return None;
        }
        match self.remote.fetch_module(module).await {
            Ok(record) => record,
            Err(e) => {
                self.handle_error("fetch", &e);
                None
            }
        }
    }

    fn handle_error(&self, operation: &str, error: &RemoteError) {
        if error.is_unauthorized() {
            debug!("Progress {} skipped: session not authenticated", operation);
        } else {
            self.reporter.report(operation, error);
        }
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<bool>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

async fn push(
    remote: Arc<dyn RemoteProgress>,
    notifier: Notifier,
    reporter: Arc<dyn ErrorReporter>,
    update: ProgressUpdate,
) -> bool {
    match remote.upsert(&update).await {
        Ok(()) => {
            info!("Progress synced for module {}", update.module_num);
            notifier.emit(&ProgressEvent::SectionComplete {
                module_num: update.module_num,
                section_data: update.section_data,
                completed: update.completed,
            });
            true
        }
        Err(e) if e.is_unauthorized() => {
            debug!("Progress sync skipped: session not authenticated");
            false
        }
        Err(e) => {
            reporter.report("sync", &e);
            false
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use safescape_core::{SectionValue, Sections};
    use std::collections::BTreeMap;

    /// In-process stand-in for the progress API.
    #[derive(Default)]
    pub(crate) struct MockRemote {
        pub records: Mutex<BTreeMap<ModuleNum, RemoteProgressRecord>>,
        pub pushes: Mutex<Vec<ProgressUpdate>>,
        pub fail: std::sync::atomic::AtomicBool,
        pub unauthorized: std::sync::atomic::AtomicBool,
    }

    impl MockRemote {
        pub(crate) fn with_record(self, n: u8, completed: bool, sections: Sections) -> Self {
            let module = ModuleNum::new(n).unwrap();
            self.records.lock().unwrap().insert(
                module,
                RemoteProgressRecord {
                    module_num: n,
                    section_data: sections,
                    completed,
                    completed_at: None,
                },
            );
            self
        }

        fn check(&self) -> Result<(), RemoteError> {
            use std::sync::atomic::Ordering;
            if self.unauthorized.load(Ordering::SeqCst) {
                return Err(RemoteError::Unauthorized);
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(RemoteError::Status(reqwest::StatusCode::INTERNAL_SERVER_ERROR));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RemoteProgress for MockRemote {
        async fn fetch_all(&self) -> Result<RemoteSnapshot, RemoteError> {
            self.check()?;
            let progress = self.records.lock().unwrap().clone();
            Ok(RemoteSnapshot {
                success: true,
                progress,
                ..Default::default()
            })
        }

        async fn fetch_module(&self, module: ModuleNum) -> Result<Option<RemoteProgressRecord>, RemoteError> {
            self.check()?;
            Ok(self.records.lock().unwrap().get(&module).cloned())
        }

        async fn upsert(&self, update: &ProgressUpdate) -> Result<(), RemoteError> {
            self.check()?;
            self.pushes.lock().unwrap().push(update.clone());
            self.records.lock().unwrap().insert(
                update.module_num,
                RemoteProgressRecord {
                    module_num: update.module_num.get(),
                    section_data: update.section_data.clone(),
                    completed: update.completed,
                    completed_at: update.completed.then(chrono::Utc::now),
                },
            );
            Ok(())
        }
    }

    /// Remote whose upserts take a while to land.
    struct SlowRemote(Arc<MockRemote>);

    #[async_trait]
    impl RemoteProgress for SlowRemote {
        async fn fetch_all(&self) -> Result<RemoteSnapshot, RemoteError> {
            self.0.fetch_all().await
        }

        async fn fetch_module(&self, module: ModuleNum) -> Result<Option<RemoteProgressRecord>, RemoteError> {
            self.0.fetch_module(module).await
        }

        async fn upsert(&self, update: &ProgressUpdate) -> Result<(), RemoteError> {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            self.0.upsert(update).await
        }
    }

    #[derive(Default)]
    struct CountingReporter(Mutex<Vec<String>>);

    impl ErrorReporter for CountingReporter {
        fn report(&self, operation: &str, error: &RemoteError) {
            self.0.lock().unwrap().push(format!("{operation}: {error}"));
        }
    }

    fn update(n: u8) -> ProgressUpdate {
        ProgressUpdate {
            module_num: ModuleNum::new(n).unwrap(),
            section_data: [("videoWatched".to_string(), SectionValue::Flag(true))].into(),
            completed: false,
        }
    }

    #[tokio::test]
    async fn test_guest_mode_is_noop() {
        let remote = Arc::new(MockRemote::default());
        let reconciler = Reconciler::new(remote.clone(), None, Notifier::new());

        assert!(!reconciler.sync_remote(update(1)).await);
        reconciler.spawn_push(update(1));
        assert_eq!(reconciler.pending_pushes(), 0);
        assert!(reconciler.fetch().await.is_none());
        assert!(remote.pushes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_successful_push_emits_section_complete() {
        let remote = Arc::new(MockRemote::default());
        let notifier = Notifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = notifier.subscribe(move |e: &ProgressEvent| sink.lock().unwrap().push(e.kind()));

        let reconciler = Reconciler::new(remote.clone(), Some(Identity::new("u-1")), notifier);
        reconciler.spawn_push(update(2));
        assert_eq!(reconciler.flush().await, 1);

        assert_eq!(remote.pushes.lock().unwrap().len(), 1);
        assert_eq!(*seen.lock().unwrap(), vec!["SECTION_COMPLETE"]);
    }

    #[tokio::test]
    async fn test_landed_pushes_leave_pending_set() {
        let remote = Arc::new(MockRemote::default());
        let reconciler = Reconciler::new(remote.clone(), Some(Identity::new("u-1")), Notifier::new());

        for n in 0..200u8 {
            reconciler.spawn_push(update(n % 5 + 1));
        }
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;

        assert_eq!(remote.pushes.lock().unwrap().len(), 200);
        assert_eq!(reconciler.pending_pushes(), 0);
        assert_eq!(reconciler.flush().await, 0);
    }

    #[tokio::test]
    async fn test_push_survives_dropped_reconciler() {
        let inner = Arc::new(MockRemote::default());
        let reconciler = Reconciler::new(
            Arc::new(SlowRemote(inner.clone())),
            Some(Identity::new("u-1")),
            Notifier::new(),
        );

        reconciler.spawn_push(update(1));
        assert_eq!(reconciler.pending_pushes(), 1);
        drop(reconciler);

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert_eq!(inner.pushes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_push_is_reported_not_raised() {
        let remote = Arc::new(MockRemote::default());
        remote.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        let reporter = Arc::new(CountingReporter::default());

        let reconciler = Reconciler::new(remote.clone(), Some(Identity::new("u-1")), Notifier::new())
            .with_reporter(reporter.clone());

        assert!(!reconciler.sync_remote(update(1)).await);
        assert!(reconciler.fetch().await.is_none());
        assert_eq!(reporter.0.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_reported() {
        let remote = Arc::new(MockRemote::default());
        remote.unauthorized.store(true, std::sync::atomic::Ordering::SeqCst);
        let reporter = Arc::new(CountingReporter::default());

        let reconciler = Reconciler::new(remote, Some(Identity::new("u-1")), Notifier::new())
            .with_reporter(reporter.clone());

        assert!(!reconciler.sync_remote(update(1)).await);
        assert!(reconciler.fetch().await.is_none());
        assert!(reporter.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_module() {
        let remote = Arc::new(MockRemote::default().with_record(3, true, Sections::new()));
        let reconciler = Reconciler::new(remote, Some(Identity::new("u-1")), Notifier::new());

        let record = reconciler.fetch_module(ModuleNum::new(3).unwrap()).await.unwrap();
        assert!(record.completed);
        assert!(reconciler.fetch_module(ModuleNum::new(4).unwrap()).await.is_none());
    }
}
