//! Observer registry for progress events.

use safescape_core::ProgressEvent;
use std::io::Write;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, warn};

/// Receives progress events.
pub trait ProgressListener: Send + Sync {
    /// Handle one event. Called synchronously on the emitting task.
    fn on_event(&self, event: &ProgressEvent);
}

impl<F> ProgressListener for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_event(&self, event: &ProgressEvent) {
        self(event)
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Arc<dyn ProgressListener>)>,
}

/// Shared list of listeners. Cloning yields a handle to the same list.
#[derive(Clone, Default)]
pub struct Notifier {
    registry: Arc<Mutex<Registry>>,
}

impl Notifier {
    /// Create an empty notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. It stays registered until the returned
    /// subscription is explicitly unsubscribed.
    pub fn subscribe(&self, listener: impl ProgressListener + 'static) -> Subscription {
        let mut registry = self.lock();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.listeners.push((id, Arc::new(listener)));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver an event to every listener.
    pub fn emit(&self, event: &ProgressEvent) {
        // Listeners may subscribe or unsubscribe from inside on_event.
        let listeners: Vec<_> = self
            .lock()
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        debug!("Emitting {} to {} listener(s)", event.kind(), listeners.len());
        for listener in listeners {
            listener.on_event(event);
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Handle returned by [`Notifier::subscribe`].
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Remove the listener. A no-op if the notifier is gone.
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.lock().unwrap_or_else(|e| e.into_inner());
            registry.listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

/// Forwards every event to an enclosing context as one JSON message per
/// line, e.g. a parent process reading our stdout.
pub struct EmbedForwarder<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> EmbedForwarder<W> {
    /// Forward messages to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl<W: Write + Send> ProgressListener for EmbedForwarder<W> {
    fn on_event(&self, event: &ProgressEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to encode {} message: {}", event.kind(), e);
                return;
            }
        };
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
            warn!("Failed to forward {} message: {}", event.kind(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safescape_core::ProgressDocument;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let notifier = Notifier::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let sub = notifier.subscribe(move |_: &ProgressEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(notifier.listener_count(), 1);

        notifier.emit(&ProgressEvent::updated(&ProgressDocument::default()));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        sub.unsubscribe();
        assert_eq!(notifier.listener_count(), 0);
        notifier.emit(&ProgressEvent::updated(&ProgressDocument::default()));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_after_notifier_dropped() {
        let notifier = Notifier::new();
        let sub = notifier.subscribe(|_: &ProgressEvent| {});
        drop(notifier);
        sub.unsubscribe();
    }

    #[test]
    fn test_embed_forwarder_writes_json_lines() {
        let forwarder = EmbedForwarder::new(Vec::new());
        forwarder.on_event(&ProgressEvent::updated(&ProgressDocument::default()));

        let out = String::from_utf8(forwarder.into_inner()).unwrap();
        let message: serde_json::Value = serde_json::from_str(out.trim_end()).unwrap();
        assert_eq!(message["type"], "PROGRESS_UPDATE");
        assert_eq!(out.lines().count(), 1);
    }
}
