use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

/// Handler invoked when any request is rejected with 401.
pub type UnauthorizedHandler = Arc<dyn Fn() + Send + Sync>;

/// Detects session invalidation and signals the owning session layer.
///
/// Holds at most one handler; registering a new one replaces the previous.
/// The guard does not touch stored credentials or navigation, that is the
/// handler's job. Clones share the same registration.
#[derive(Clone, Default)]
pub struct SessionGuard {
    handler: Arc<Mutex<Option<UnauthorizedHandler>>>,
}

impl SessionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler`, discarding any earlier one.
    pub fn on_unauthorized<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.register(Some(Arc::new(handler)));
    }

    /// Replaces the handler; `None` clears it.
    pub fn register(&self, handler: Option<UnauthorizedHandler>) {
        *self.handler.lock().unwrap_or_else(PoisonError::into_inner) = handler;
    }

    pub fn clear(&self) {
        self.register(None);
    }

    pub fn is_registered(&self) -> bool {
        self.handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Invokes the registered handler synchronously. Returns whether one ran.
    ///
    /// A panicking handler is contained so the failed request still reports
    /// its result to the caller.
    pub fn notify(&self) -> bool {
        // Released before the call so the handler may re-register.
        let handler = self
            .handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match handler {
            Some(handler) => {
                #[cfg(feature = "tracing")]
                tracing::info!("session invalidated, notifying unauthorized handler");
                if catch_unwind(AssertUnwindSafe(|| handler())).is_err() {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("unauthorized handler panicked");
                }
                true
            }
            None => {
                #[cfg(feature = "tracing")]
                tracing::debug!("session invalidated with no unauthorized handler registered");
                false
            }
        }
    }
}

impl fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGuard")
            .field("registered", &self.is_registered())
            .finish()
    }
}
