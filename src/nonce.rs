//! Digest nonce replay protection.
//!
//! A [`NonceRegistry`] remembers, per client nonce, the highest request
//! count it has accepted. A request whose count does not exceed the stored
//! count is a replay. Entries never expire here; an external store may
//! evict them.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::Error;

/// Highest accepted count for one client nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceEntry {
    /// Highest accepted request count
    pub count: u64,
    /// When that count was accepted, in epoch milliseconds
    pub last_seen_millis: i64,
}

/// Backing storage of a nonce registry.
///
/// Implementations need no internal locking: the registry serialises all
/// access behind its own lock.
pub trait NonceStore: Send {
    /// Entry for `nonce`, if one exists.
    fn get(&self, nonce: &str) -> Option<NonceEntry>;

    /// Inserts or replaces the entry for `nonce`.
    fn put(&mut self, nonce: &str, entry: NonceEntry);

    /// Number of tracked nonces.
    fn len(&self) -> usize;

    /// True if no nonce is tracked.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local [`NonceStore`].
#[derive(Debug, Default)]
pub struct InMemoryNonceStore {
    entries: HashMap<String, NonceEntry>,
}

impl NonceStore for InMemoryNonceStore {
    fn get(&self, nonce: &str) -> Option<NonceEntry> {
        self.entries.get(nonce).copied()
    }

    fn put(&mut self, nonce: &str, entry: NonceEntry) {
        self.entries.insert(nonce.to_string(), entry);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Replay detector for one application's digest nonces.
///
/// # Examples
///
/// ```
/// use realm_adapter::NonceRegistry;
///
/// let registry = NonceRegistry::in_memory("shop");
/// assert!(registry.admit("abc123", 1).is_ok());
/// assert!(registry.admit("abc123", 1).is_err());
/// assert!(registry.admit("abc123", 2).is_ok());
/// ```
pub struct NonceRegistry {
    app_name: String,
    store: Mutex<Box<dyn NonceStore>>,
}

impl NonceRegistry {
    /// Creates a registry over the given store.
    pub fn with_store(app_name: impl Into<String>, store: Box<dyn NonceStore>) -> Self {
        Self {
            app_name: app_name.into(),
            store: Mutex::new(store),
        }
    }

    /// Creates a registry over a fresh in-memory store.
    pub fn in_memory(app_name: impl Into<String>) -> Self {
        Self::with_store(app_name, Box::new(InMemoryNonceStore::default()))
    }

    /// Application this registry belongs to.
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Admits a request carrying `nonce` with count `incoming`.
    ///
    /// The lookup and the update happen under one lock, so two racing
    /// requests with the same count cannot both be admitted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReplayDetected`] if `incoming` does not exceed the
    /// stored count for `nonce`.
    pub fn admit(&self, nonce: &str, incoming: u64) -> Result<(), Error> {
        let now = chrono::Utc::now().timestamp_millis();
        let mut store = self.store.lock();

        if let Some(existing) = store.get(nonce) {
            if incoming <= existing.count {
                tracing::warn!(
                    app = %self.app_name,
                    nonce,
                    incoming,
                    stored = existing.count,
                    "rejecting digest request: possible replay"
                );
                return Err(Error::ReplayDetected {
                    nonce: nonce.to_string(),
                    incoming,
                    stored: existing.count,
                });
            }
        }

        store.put(
            nonce,
            NonceEntry {
                count: incoming,
                last_seen_millis: now,
            },
        );
        Ok(())
    }

    /// Stored entry for `nonce`.
    pub fn entry(&self, nonce: &str) -> Option<NonceEntry> {
        self.store.lock().get(nonce)
    }

    /// Number of tracked nonces.
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    /// True if no nonce is tracked.
    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }
}

impl std::fmt::Debug for NonceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceRegistry")
            .field("app_name", &self.app_name)
            .field("len", &self.len())
            .finish()
    }
}

/// Externally managed registries shared across instances, keyed by application.
pub trait SharedNonceCaches: Send + Sync {
    /// The shared registry for `app_name`, if the cluster manages one.
    fn get(&self, app_name: &str) -> Option<Arc<NonceRegistry>>;
}

/// Creates private registries when no shared one is available.
pub trait NonceCacheFactory: Send + Sync {
    /// Creates a registry for `app_name`.
    fn create(&self, app_name: &str) -> Arc<NonceRegistry>;
}

/// Factory producing [`InMemoryNonceStore`]-backed registries.
#[derive(Debug, Clone, Copy, Default)]
pub struct InMemoryNonceCacheFactory;

impl NonceCacheFactory for InMemoryNonceCacheFactory {
    fn create(&self, app_name: &str) -> Arc<NonceRegistry> {
        Arc::new(NonceRegistry::in_memory(app_name))
    }
}

/// Lazily obtained registry owned by one adapter.
///
/// The first caller to find the cell empty resolves the registry under the
/// write lock; every other caller, racing or later, observes that same
/// instance.
pub(crate) struct LazyNonceRegistry {
    app_name: String,
    shared: Option<Arc<dyn SharedNonceCaches>>,
    factory: Arc<dyn NonceCacheFactory>,
    cell: RwLock<Option<Arc<NonceRegistry>>>,
}

impl LazyNonceRegistry {
    pub(crate) fn new(
        app_name: impl Into<String>,
        shared: Option<Arc<dyn SharedNonceCaches>>,
        factory: Arc<dyn NonceCacheFactory>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            shared,
            factory,
            cell: RwLock::new(None),
        }
    }

    /// Returns the registry, resolving it on first use.
    ///
    /// Prefers the shared registry for the application; falls back to a
    /// private one from the factory.
    pub(crate) fn get(&self) -> Arc<NonceRegistry> {
        if let Some(registry) = self.cell.read().as_ref() {
            return Arc::clone(registry);
        }

        let mut cell = self.cell.write();
        if let Some(registry) = cell.as_ref() {
            return Arc::clone(registry);
        }

        let registry = match self.shared.as_ref().and_then(|s| s.get(&self.app_name)) {
            Some(shared) => {
                tracing::debug!(app = %self.app_name, "using shared nonce cache");
                shared
            }
            None => {
                tracing::debug!(app = %self.app_name, "creating private nonce cache");
                self.factory.create(&self.app_name)
            }
        };
        *cell = Some(Arc::clone(&registry));
        registry
    }
}
