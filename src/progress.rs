use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Broadcast before each retry so the UI can show reconnect feedback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryStatus {
    /// 1-based retry number.
    pub attempt: usize,
    pub max_retries: usize,
    pub message: String,
}

struct Listener {
    id: u64,
    /// Cleared by `unsubscribe`; checked before every dispatch.
    active: AtomicBool,
    callback: Box<dyn Fn(&RetryStatus) + Send + Sync>,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<Arc<Listener>>,
}

/// Publish/subscribe registry for [`RetryStatus`] events.
///
/// Events are fire-and-forget; listeners that subscribe late miss earlier
/// events. Clones share the same listener set.
#[derive(Clone, Default)]
pub struct ProgressNotifier {
    listeners: Arc<Mutex<Listeners>>,
}

impl ProgressNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` and returns the handle that removes it.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&RetryStatus) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push(Arc::new(Listener {
            id,
            active: AtomicBool::new(true),
            callback: Box::new(listener),
        }));

        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Delivers `status` to every listener in subscription order.
    ///
    /// Listeners subscribed during this call are not invoked; listeners
    /// unsubscribed during it are skipped unless already running. A
    /// panicking listener is logged and skipped; the rest still run.
    pub fn publish(&self, status: &RetryStatus) {
        let snapshot: Vec<Arc<Listener>> = {
            let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            listeners.entries.iter().map(Arc::clone).collect()
        };

        for listener in snapshot {
            if !listener.active.load(Ordering::SeqCst) {
                continue;
            }
            let outcome = catch_unwind(AssertUnwindSafe(|| (listener.callback)(status)));
            if outcome.is_err() {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    attempt = status.attempt,
                    "retry progress listener panicked; continuing with remaining listeners"
                );
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }
}

impl fmt::Debug for ProgressNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressNotifier")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Handle for one registered listener.
///
/// Dropping the handle leaves the listener subscribed; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    /// Removes this listener. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        let Some(listeners) = self.listeners.upgrade() else {
            return;
        };
        let mut listeners = listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.entries.retain(|listener| {
            if listener.id == self.id {
                listener.active.store(false, Ordering::SeqCst);
                false
            } else {
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::{ProgressNotifier, RetryStatus};

    fn status(attempt: usize) -> RetryStatus {
        RetryStatus {
            attempt,
            max_retries: 2,
            message: "Connecting to server...".to_owned(),
        }
    }

    #[test]
    fn publishes_in_subscription_order() {
        let notifier = ProgressNotifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for name in ["a", "b", "c"] {
            let seen = Arc::clone(&seen);
            let _ = notifier.subscribe(move |status| {
                seen.lock().unwrap().push(format!("{name}{}", status.attempt));
            });
        }
        notifier.publish(&status(1));

        assert_eq!(*seen.lock().unwrap(), vec!["a1", "b1", "c1"]);
    }

    #[test]
    fn unsubscribe_twice_removes_only_that_listener() {
        let notifier = ProgressNotifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first_seen = Arc::clone(&seen);
        let first = notifier.subscribe(move |_| first_seen.lock().unwrap().push("first"));
        let second_seen = Arc::clone(&seen);
        let _second = notifier.subscribe(move |_| second_seen.lock().unwrap().push("second"));

        first.unsubscribe();
        first.unsubscribe();
        assert_eq!(notifier.listener_count(), 1);

        notifier.publish(&status(1));
        assert_eq!(*seen.lock().unwrap(), vec!["second"]);
    }

    #[test]
    fn panicking_listener_does_not_starve_later_listeners() {
        let notifier = ProgressNotifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let _bad = notifier.subscribe(|_| panic!("listener failure"));
        let later = Arc::clone(&seen);
        let _good = notifier.subscribe(move |status| later.lock().unwrap().push(status.attempt));

        notifier.publish(&status(1));
        notifier.publish(&status(2));

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn late_subscriber_misses_earlier_events() {
        let notifier = ProgressNotifier::new();
        notifier.publish(&status(1));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = notifier.subscribe(move |status| sink.lock().unwrap().push(status.attempt));

        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn listener_may_unsubscribe_itself_during_publish() {
        let notifier = ProgressNotifier::new();
        let slot = Arc::new(Mutex::new(None::<super::Subscription>));

        let handle_slot = Arc::clone(&slot);
        let subscription = notifier.subscribe(move |_| {
            if let Some(subscription) = handle_slot.lock().unwrap().take() {
                subscription.unsubscribe();
            }
        });
        *slot.lock().unwrap() = Some(subscription);

        notifier.publish(&status(1));
        assert_eq!(notifier.listener_count(), 0);
    }

    #[test]
    fn listener_removed_mid_publish_is_not_called() {
        let notifier = ProgressNotifier::new();
        let removed_calls = Arc::new(AtomicUsize::new(0));
        let slot = Arc::new(Mutex::new(None::<super::Subscription>));

        let handle_slot = Arc::clone(&slot);
        let _remover = notifier.subscribe(move |_| {
            if let Some(subscription) = handle_slot.lock().unwrap().take() {
                subscription.unsubscribe();
            }
        });
        let counter = Arc::clone(&removed_calls);
        let removed = notifier.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        *slot.lock().unwrap() = Some(removed);

        notifier.publish(&status(1));
        notifier.publish(&status(2));

        assert_eq!(notifier.listener_count(), 1);
        assert_eq!(removed_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn listener_subscribed_mid_publish_waits_for_next_event() {
        let notifier = ProgressNotifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registered = Arc::new(Mutex::new(Vec::new()));

        let inner = notifier.clone();
        let sink = Arc::clone(&seen);
        let keep = Arc::clone(&registered);
        let _adder = notifier.subscribe(move |status| {
            if status.attempt == 1 {
                let sink = Arc::clone(&sink);
                let subscription = inner.subscribe(move |status| {
                    sink.lock().unwrap().push(status.attempt);
                });
                keep.lock().unwrap().push(subscription);
            }
        });

        notifier.publish(&status(1));
        notifier.publish(&status(2));

        assert_eq!(*seen.lock().unwrap(), vec![2]);
    }
}
