use crate::event::CacheEvent;
use crate::lock::{rw_read, rw_write};
use crate::types::{EventCallback, KeyFilter};
use config::SignalConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use uuid::Uuid;

const SOURCE: &str = "signal_system::manager";

/// Identifier of a registered callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(Uuid);

impl CallbackId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for CallbackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("Callback limit reached ({0})")]
    TooManyCallbacks(usize),
}

/// Counters exposed for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalStats {
    pub callback_count: usize,
    pub events_emitted: u64,
}

struct Registration {
    id: CallbackId,
    filter: KeyFilter,
    callback: EventCallback,
}

/// Registration guard; the callback is removed when the handle is dropped
#[derive(Debug)]
pub struct CallbackHandle {
    id: CallbackId,
    manager: Weak<SignalManager>,
}

impl CallbackHandle {
    pub fn id(&self) -> CallbackId {
        self.id
    }
}

impl Drop for CallbackHandle {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.remove_callback(self.id);
        }
    }
}

/// Signal manager for cache entry notifications
///
/// Callbacks run synchronously in registration order on the emitting task,
/// after the emitter has released its own locks.
pub struct SignalManager {
    callbacks: RwLock<Vec<Registration>>,
    config: SignalConfig,
    events_emitted: AtomicU64,
}

impl std::fmt::Debug for SignalManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalManager")
            .field("callback_count", &self.callback_count())
            .field("config", &self.config)
            .finish()
    }
}

impl SignalManager {
    pub fn new(config: SignalConfig) -> Self {
        Self {
            callbacks: RwLock::new(Vec::new()),
            config,
            events_emitted: AtomicU64::new(0),
        }
    }

    /// Add event callback for the keys selected by `filter`
    pub fn add_callback<F>(
        self: &Arc<Self>,
        filter: KeyFilter,
        callback: F,
    ) -> Result<CallbackHandle, SignalError>
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        let mut callbacks = rw_write(&self.callbacks, SOURCE, "add_callback");
        if callbacks.len() >= self.config.max_callbacks {
            return Err(SignalError::TooManyCallbacks(self.config.max_callbacks));
        }

        let id = CallbackId::new();
        callbacks.push(Registration {
            id,
            filter,
            callback: Arc::new(callback),
        });

        Ok(CallbackHandle {
            id,
            manager: Arc::downgrade(self),
        })
    }

    /// Remove a callback; returns false when it was already gone
    pub fn remove_callback(&self, id: CallbackId) -> bool {
        let mut callbacks = rw_write(&self.callbacks, SOURCE, "remove_callback");
        let before = callbacks.len();
        callbacks.retain(|r| r.id != id);
        callbacks.len() != before
    }

    /// Emit event to all matching subscribers
    pub fn emit(&self, event: CacheEvent) {
        // Snapshot so callbacks may register or drop handles while running
        let targets: Vec<EventCallback> = {
            let callbacks = rw_read(&self.callbacks, SOURCE, "emit");
            callbacks
                .iter()
                .filter(|r| r.filter.accepts(&event.key))
                .map(|r| Arc::clone(&r.callback))
                .collect()
        };

        self.events_emitted.fetch_add(1, Ordering::Relaxed);
        for callback in targets {
            callback(&event);
        }
    }

    /// Emit events in order
    pub fn emit_all(&self, events: impl IntoIterator<Item = CacheEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    /// Clear all callbacks
    pub fn clear_callbacks(&self) {
        rw_write(&self.callbacks, SOURCE, "clear_callbacks").clear();
    }

    /// Get number of registered callbacks
    pub fn callback_count(&self) -> usize {
        rw_read(&self.callbacks, SOURCE, "callback_count").len()
    }

    pub fn stats(&self) -> SignalStats {
        SignalStats {
            callback_count: self.callback_count(),
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
        }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }
}

impl Default for SignalManager {
    fn default() -> Self {
        Self::new(SignalConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_types::{query_key, QueryStatus};
    use std::sync::Mutex;

    fn event(key: query_types::QueryKey, status: QueryStatus) -> CacheEvent {
        CacheEvent::status_changed(key, status, 1)
    }

    #[test]
    fn delivers_only_matching_events_in_order() {
        let manager = Arc::new(SignalManager::default());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let _handle = manager
            .add_callback(KeyFilter::Prefix(query_key!("posts")), move |e| {
                sink.lock().unwrap().push((e.key.clone(), e.status));
            })
            .unwrap();

        manager.emit(event(query_key!("posts", 0, ""), QueryStatus::Loading));
        manager.emit(event(query_key!("post", 1), QueryStatus::Loading));
        manager.emit(event(query_key!("posts", 0, ""), QueryStatus::Success));

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                (query_key!("posts", 0, ""), QueryStatus::Loading),
                (query_key!("posts", 0, ""), QueryStatus::Success),
            ]
        );
        assert_eq!(manager.stats().events_emitted, 3);
    }

    #[test]
    fn dropping_handle_unregisters() {
        let manager = Arc::new(SignalManager::default());
        let handle = manager.add_callback(KeyFilter::All, |_| {}).unwrap();
        assert_eq!(manager.callback_count(), 1);

        drop(handle);
        assert_eq!(manager.callback_count(), 0);
    }

    #[test]
    fn enforces_callback_limit() {
        let manager = Arc::new(SignalManager::new(SignalConfig::new(1)));
        let _first = manager.add_callback(KeyFilter::All, |_| {}).unwrap();
        let second = manager.add_callback(KeyFilter::All, |_| {});
        assert!(matches!(second, Err(SignalError::TooManyCallbacks(1))));
    }

    #[test]
    fn callbacks_may_drop_handles_while_emitting() {
        let manager = Arc::new(SignalManager::default());
        let slot: Arc<Mutex<Option<CallbackHandle>>> = Arc::new(Mutex::new(None));

        let inner = Arc::clone(&slot);
        let handle = manager
            .add_callback(KeyFilter::All, move |_| {
                inner.lock().unwrap().take();
            })
            .unwrap();
        *slot.lock().unwrap() = Some(handle);

        manager.emit(event(query_key!("me"), QueryStatus::Success));
        assert_eq!(manager.callback_count(), 0);
    }
}
