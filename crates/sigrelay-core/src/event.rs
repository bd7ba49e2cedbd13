//! Event dispatch primitive.
//!
//! `Listeners<A>` is embedded by value in every stateful object (hub, client,
//! channel and member mirrors). Handlers are registered per event name and
//! receive a shared reference to the trigger argument.
//!
//! Handlers are snapshotted before they run, so a handler may register or
//! remove handlers (including itself) while being dispatched. There is no
//! per-handler failure isolation: a panicking handler unwinds into the caller
//! of [`Listeners::trigger`]. No lock is held while handlers run.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Registered handler.
pub type Handler<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// Token returned by [`Listeners::on`], used to unregister the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct Inner<A> {
    handlers: HashMap<String, Vec<(HandlerId, Handler<A>)>>,
    proxies: Vec<Arc<Listeners<A>>>,
    next_id: u64,
}

/// Publish/subscribe table keyed by event name.
pub struct Listeners<A> {
    inner: Mutex<Inner<A>>,
}

impl<A> Default for Listeners<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for Listeners<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let g = self.inner.lock();
        f.debug_struct("Listeners")
            .field("events", &g.handlers.len())
            .field("proxies", &g.proxies.len())
            .finish()
    }
}

impl<A> Listeners<A> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                handlers: HashMap::new(),
                proxies: Vec::new(),
                next_id: 1,
            }),
        }
    }

    /// Register `handler` for `event`. Handlers run in registration order.
    pub fn on<F>(&self, event: impl Into<String>, handler: F) -> HandlerId
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let mut g = self.inner.lock();
        let id = HandlerId(g.next_id);
        g.next_id += 1;
        g.handlers
            .entry(event.into())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns false if it was not registered for `event`.
    pub fn off(&self, event: &str, id: HandlerId) -> bool {
        let mut g = self.inner.lock();
        let Some(list) = g.handlers.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|(hid, _)| *hid != id);
        let removed = list.len() != before;
        if list.is_empty() {
            g.handlers.remove(event);
        }
        removed
    }

    /// True if at least one handler is registered for `event`.
    pub fn has_listener_for(&self, event: &str) -> bool {
        self.inner
            .lock()
            .handlers
            .get(event)
            .map(|l| !l.is_empty())
            .unwrap_or(false)
    }

    /// Forward every future trigger to `other` as well.
    ///
    /// Proxy cycles are not detected and would recurse forever.
    pub fn proxy(&self, other: Arc<Listeners<A>>) {
        self.inner.lock().proxies.push(other);
    }

    /// Invoke proxies, then every handler registered for `event`.
    pub fn trigger(&self, event: &str, args: &A) {
        let (proxies, handlers) = {
            let g = self.inner.lock();
            let handlers: Vec<Handler<A>> = g
                .handlers
                .get(event)
                .map(|l| l.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default();
            (g.proxies.clone(), handlers)
        };

        for p in &proxies {
            p.trigger(event, args);
        }
        for h in &handlers {
            h(args);
        }
    }
}
