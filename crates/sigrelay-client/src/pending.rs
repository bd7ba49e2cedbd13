//! Requests waiting for a correlated answer.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use sigrelay_core::protocol::Envelope;
use sigrelay_core::{RelayError, Result};

/// Request id -> waiter. Bounded by `max`.
pub struct PendingRequests {
    waiters: Mutex<HashMap<String, oneshot::Sender<Envelope>>>,
    max: usize,
}

impl PendingRequests {
    pub fn new(max: usize) -> Self {
        Self {
            waiters: Mutex::new(HashMap::new()),
            max,
        }
    }

    /// Register a waiter for answers to `id`. Refused when the table is full.
    pub fn register(&self, id: &str) -> Result<oneshot::Receiver<Envelope>> {
        let mut waiters = self.waiters.lock();
        if waiters.len() >= self.max {
            tracing::warn!(pending = waiters.len(), max_pending = self.max, "too many pending requests");
            return Err(RelayError::Invalid("too many pending requests".into()));
        }
        let (tx, rx) = oneshot::channel();
        waiters.insert(id.to_string(), tx);
        Ok(rx)
    }

    /// Hand `env` to the waiter its `answered` points at. False when nobody
    /// is waiting (never asked, already answered, or timed out).
    pub fn resolve(&self, env: &Envelope) -> bool {
        let Some(id) = env.answered() else {
            return false;
        };
        let waiter = self.waiters.lock().remove(id);
        match waiter {
            Some(tx) => tx.send(env.clone()).is_ok(),
            None => {
                tracing::trace!(answered = id, "answer without a waiter ignored");
                false
            }
        }
    }

    pub fn cancel(&self, id: &str) -> bool {
        self.waiters.lock().remove(id).is_some()
    }

    /// Drop every waiter; their receivers observe a closed channel.
    pub fn clear(&self) -> usize {
        let mut waiters = self.waiters.lock();
        let n = waiters.len();
        waiters.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.waiters.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Retires a registration when the request future finishes or is dropped.
pub(crate) struct PendingGuard<'a> {
    table: &'a PendingRequests,
    id: String,
}

impl<'a> PendingGuard<'a> {
    pub(crate) fn new(table: &'a PendingRequests, id: &str) -> Self {
        Self {
            table,
            id: id.to_string(),
        }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.table.cancel(&self.id) {
            tracing::debug!(request = %self.id, "pending request retired");
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn resolve_by_answered_once() {
        let table = PendingRequests::new(4);
        let req = Envelope::new("join");
        let mut rx = table.register(req.id()).unwrap();

        let answer = req.as_answer();
        assert!(table.resolve(&answer));
        assert!(!table.resolve(&answer));
        assert_eq!(rx.try_recv().unwrap().answered(), Some(req.id()));
        assert!(table.is_empty());
    }

    #[test]
    fn bounded_and_guarded() {
        let table = PendingRequests::new(1);
        let _rx = table.register("a").unwrap();
        assert!(table.register("b").is_err());
        {
            let _guard = PendingGuard::new(&table, "a");
        }
        assert!(table.is_empty());
        assert!(table.register("b").is_ok());
        assert_eq!(table.clear(), 1);
    }
}
