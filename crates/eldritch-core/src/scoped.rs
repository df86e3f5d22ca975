//! Context-scoped singletons.
//!
//! A [`ScopedRegistry`] holds at most one instance of each component type per
//! runtime context. Keys are `(TypeId, ContextId)`: two contexts built from
//! identical configuration still get separate instances.
//!
//! Construction runs outside the registry lock, so a factory may itself request
//! *other* components. Requesting the component that is currently being built
//! on the same thread fails with [`ContextError::ReentrantConstruction`]; other
//! threads asking for it block until the first factory finishes.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, ThreadId};

use tracing::trace;

use crate::context::{ContextId, RuntimeContext};
use crate::error::{ContextError, Result};

/// A type with at most one instance per runtime context.
///
/// Obtain instances with [`RuntimeContext::component`]; never call `create`
/// directly.
pub trait ContextComponent: Any + Send + Sync + Sized {
    /// Build the instance for `ctx`.
    fn create(ctx: &Arc<RuntimeContext>) -> Result<Self>;
}

type Key = (TypeId, ContextId);
type Instance = Arc<dyn Any + Send + Sync>;

enum Slot {
    Pending { owner: ThreadId, token: u64 },
    Ready(Instance),
}

/// Keyed cache of context-scoped component instances.
pub struct ScopedRegistry {
    slots: Mutex<HashMap<Key, Slot>>,
    settled: Condvar,
    next_token: AtomicU64,
}

static GLOBAL: OnceLock<ScopedRegistry> = OnceLock::new();

impl ScopedRegistry {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            settled: Condvar::new(),
            next_token: AtomicU64::new(0),
        }
    }

    /// The process-wide registry used by [`RuntimeContext::component`].
    pub fn global() -> &'static ScopedRegistry {
        GLOBAL.get_or_init(ScopedRegistry::new)
    }

    /// Return the instance of `T` for `context`, building it with `factory` if
    /// there is none yet.
    ///
    /// `factory` runs at most once per key while the entry lives. If it fails
    /// (or panics) nothing is cached and the next caller tries again.
    ///
    /// Reentrancy is tracked per thread: the thread running `factory` gets
    /// [`ContextError::ReentrantConstruction`] if it asks for the same key.
    /// Any other thread asking for that key waits until `factory` returns, so
    /// a factory must not hand its own key to another thread and join it;
    /// that deadlocks.
    pub fn get_or_create<T, F>(&self, context: ContextId, factory: F) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Result<T>,
    {
        let key = (TypeId::of::<T>(), context);
        let me = thread::current().id();

        let mut slots = self.lock();
        let token = loop {
            match slots.get(&key) {
                Some(Slot::Ready(instance)) => return downcast::<T>(instance.clone()),
                Some(Slot::Pending { owner, .. }) if *owner == me => {
                    return Err(ContextError::ReentrantConstruction {
                        component: type_name::<T>(),
                        context,
                    });
                }
                Some(Slot::Pending { .. }) => {
                    slots = self
                        .settled
                        .wait(slots)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                None => {
                    let token = self.next_token.fetch_add(1, Ordering::Relaxed);
                    slots.insert(key, Slot::Pending { owner: me, token });
                    break token;
                }
            }
        };
        drop(slots);

        let mut pending = PendingGuard {
            registry: self,
            key,
            token,
            armed: true,
        };

        trace!(component = type_name::<T>(), context = %context, "constructing component");
        let instance = Arc::new(factory()?);

        let mut slots = self.lock();
        if pending.owns(&slots) {
            slots.insert(key, Slot::Ready(instance.clone()));
        }
        pending.armed = false;
        drop(slots);
        self.settled.notify_all();

        Ok(instance)
    }

    /// Look up an existing instance without building one.
    pub fn get<T: Any + Send + Sync>(&self, context: ContextId) -> Option<Arc<T>> {
        match self.lock().get(&(TypeId::of::<T>(), context)) {
            Some(Slot::Ready(instance)) => downcast::<T>(instance.clone()).ok(),
            _ => None,
        }
    }

    /// Whether an instance of `T` exists for `context`.
    pub fn contains<T: Any + Send + Sync>(&self, context: ContextId) -> bool {
        self.get::<T>(context).is_some()
    }

    /// Drop every instance belonging to `context`.
    pub fn reset(&self, context: ContextId) {
        let removed: Vec<Slot> = {
            let mut slots = self.lock();
            let keys: Vec<Key> = slots.keys().filter(|(_, c)| *c == context).copied().collect();
            keys.iter().filter_map(|k| slots.remove(k)).collect()
        };
        if !removed.is_empty() {
            trace!(context = %context, entries = removed.len(), "reset context components");
            self.settled.notify_all();
        }
        // Instances are dropped here, outside the lock.
        drop(removed);
    }

    /// Drop every instance of every context.
    pub fn reset_all(&self) {
        let removed: HashMap<Key, Slot> = std::mem::take(&mut *self.lock());
        self.settled.notify_all();
        drop(removed);
    }

    /// Number of cached instances.
    pub fn len(&self) -> usize {
        self.lock()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Key, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ScopedRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScopedRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedRegistry").field("len", &self.len()).finish()
    }
}

/// Clears a pending slot if its factory fails or unwinds.
struct PendingGuard<'a> {
    registry: &'a ScopedRegistry,
    key: Key,
    token: u64,
    armed: bool,
}

impl PendingGuard<'_> {
    /// Whether the slot is still the one this guard reserved. A reset while the
    /// factory ran means the result must not be cached.
    fn owns(&self, slots: &HashMap<Key, Slot>) -> bool {
        matches!(slots.get(&self.key), Some(Slot::Pending { token, .. }) if *token == self.token)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut slots = self.registry.lock();
        if self.owns(&slots) {
            slots.remove(&self.key);
        }
        drop(slots);
        self.registry.settled.notify_all();
    }
}

fn downcast<T: Any + Send + Sync>(instance: Instance) -> Result<Arc<T>> {
    instance
        .downcast::<T>()
        .map_err(|_| ContextError::component::<T>(anyhow::anyhow!("cached instance has a different type")))
}
