//! Finding the runtime context from inside a helper.
//!
//! Helpers are normally handed their context explicitly. When a helper is built
//! deep inside a hook or command without one, [`locate`] falls back to the
//! innermost context entered on the current thread (see
//! [`RuntimeContext::enter`]). If neither exists the helper was wired up wrong
//! and [`ContextError::ContextNotFound`] is returned.

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use crate::context::{ContextId, RuntimeContext};
use crate::error::{ContextError, Result};

thread_local! {
    static SCOPES: RefCell<Vec<Arc<RuntimeContext>>> = const { RefCell::new(Vec::new()) };
}

/// Anything a context can be recovered from.
pub trait ContextSource {
    fn context(&self) -> Option<Arc<RuntimeContext>>;
}

impl ContextSource for Arc<RuntimeContext> {
    fn context(&self) -> Option<Arc<RuntimeContext>> {
        Some(Arc::clone(self))
    }
}

impl ContextSource for ContextRef {
    fn context(&self) -> Option<Arc<RuntimeContext>> {
        self.upgrade()
    }
}

impl<T: ContextSource> ContextSource for Option<T> {
    fn context(&self) -> Option<Arc<RuntimeContext>> {
        self.as_ref().and_then(ContextSource::context)
    }
}

impl<T: ContextSource + ?Sized> ContextSource for &T {
    fn context(&self) -> Option<Arc<RuntimeContext>> {
        (**self).context()
    }
}

/// No explicit source: rely on the entered scope.
impl ContextSource for () {
    fn context(&self) -> Option<Arc<RuntimeContext>> {
        None
    }
}

/// The nearest context reachable from `start`.
pub fn locate<S: ContextSource + ?Sized>(start: &S) -> Result<Arc<RuntimeContext>> {
    start
        .context()
        .or_else(current)
        .ok_or(ContextError::ContextNotFound)
}

/// The innermost context entered on this thread, if any.
pub fn current() -> Option<Arc<RuntimeContext>> {
    SCOPES
        .try_with(|scopes| scopes.borrow().last().cloned())
        .ok()
        .flatten()
}

/// Guard returned by [`RuntimeContext::enter`].
///
/// Scopes nest. Dropping a guard also unwinds any inner scopes that were leaked.
#[must_use = "the context is only ambient while the guard is alive"]
pub struct ContextScope {
    depth: usize,
    id: ContextId,
    // Scopes live on a thread-local stack.
    _not_send: PhantomData<*const ()>,
}

impl ContextScope {
    pub(crate) fn push(ctx: Arc<RuntimeContext>) -> Self {
        let id = ctx.id();
        let depth = SCOPES.with(|scopes| {
            let mut scopes = scopes.borrow_mut();
            scopes.push(ctx);
            scopes.len() - 1
        });
        Self {
            depth,
            id,
            _not_send: PhantomData,
        }
    }

    /// Id of the context this guard entered.
    pub fn id(&self) -> ContextId {
        self.id
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        let popped = SCOPES
            .try_with(|scopes| {
                let mut scopes = scopes.borrow_mut();
                if scopes.len() > self.depth {
                    scopes.split_off(self.depth)
                } else {
                    Vec::new()
                }
            })
            .unwrap_or_default();
        // A popped context may be the last strong reference; its Drop must not
        // run while the stack is borrowed.
        drop(popped);
    }
}

impl fmt::Debug for ContextScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextScope")
            .field("id", &self.id)
            .field("depth", &self.depth)
            .finish()
    }
}

/// Non-owning back-reference from a helper to the context that produced it.
#[derive(Clone)]
pub struct ContextRef {
    id: ContextId,
    inner: Weak<RuntimeContext>,
}

impl ContextRef {
    pub fn new(ctx: &Arc<RuntimeContext>) -> Self {
        Self {
            id: ctx.id(),
            inner: Arc::downgrade(ctx),
        }
    }

    /// Resolve `start` (or the ambient scope) and keep a weak handle to it.
    pub fn locate<S: ContextSource + ?Sized>(start: &S) -> Result<Self> {
        locate(start).map(|ctx| Self::new(&ctx))
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn upgrade(&self) -> Option<Arc<RuntimeContext>> {
        self.inner.upgrade()
    }

    /// The context, or `ContextNotFound` once it has been dropped.
    pub fn get(&self) -> Result<Arc<RuntimeContext>> {
        self.upgrade().ok_or(ContextError::ContextNotFound)
    }
}

impl fmt::Debug for ContextRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextRef")
            .field("id", &self.id)
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

/// A helper tied to one runtime context.
pub trait ContextBound {
    fn context_ref(&self) -> &ContextRef;

    fn ctx(&self) -> Result<Arc<RuntimeContext>> {
        self.context_ref().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eldritch_common_config::PyProject;

    fn context() -> Arc<RuntimeContext> {
        RuntimeContext::builder("/project")
            .pyproject(PyProject::default())
            .build()
            .unwrap()
    }

    #[test]
    fn test_nothing_reachable_is_an_error() {
        assert!(current().is_none());
        assert!(matches!(locate(&()), Err(ContextError::ContextNotFound)));
        let none: Option<Arc<RuntimeContext>> = None;
        assert!(matches!(locate(&none), Err(ContextError::ContextNotFound)));
    }

    #[test]
    fn test_explicit_source_wins_over_scope() {
        let outer = context();
        let explicit = context();
        let _scope = outer.enter();

        let found = locate(&explicit).unwrap();
        assert!(Arc::ptr_eq(&found, &explicit));
    }

    #[test]
    fn test_falls_back_to_innermost_scope() {
        let outer = context();
        let inner = context();

        let _a = outer.enter();
        assert!(Arc::ptr_eq(&locate(&()).unwrap(), &outer));
        {
            let _b = inner.enter();
            assert!(Arc::ptr_eq(&locate(&()).unwrap(), &inner));
        }
        assert!(Arc::ptr_eq(&locate(&()).unwrap(), &outer));
    }

    #[test]
    fn test_dropping_outer_scope_unwinds_leaked_inner() {
        let outer = context();
        let inner = context();

        let a = outer.enter();
        std::mem::forget(inner.enter());
        drop(a);

        assert!(current().is_none());
    }

    #[test]
    fn test_scope_is_per_thread() {
        let ctx = context();
        let _scope = ctx.enter();

        let seen = std::thread::spawn(|| current().is_some()).join().unwrap();
        assert!(!seen);
    }

    #[test]
    fn test_context_ref_does_not_keep_context_alive() {
        let ctx = context();
        let weak = ctx.downgrade();
        assert_eq!(weak.id(), ctx.id());
        assert!(weak.get().is_ok());

        drop(ctx);
        assert!(weak.upgrade().is_none());
        assert!(matches!(weak.get(), Err(ContextError::ContextNotFound)));
    }

    #[test]
    fn test_context_bound_helper() {
        struct Helper(ContextRef);
        impl ContextBound for Helper {
            fn context_ref(&self) -> &ContextRef {
                &self.0
            }
        }

        let ctx = context();
        let helper = {
            let _scope = ctx.enter();
            Helper(ContextRef::locate(&()).unwrap())
        };
        assert!(Arc::ptr_eq(&helper.ctx().unwrap(), &ctx));
    }
}
