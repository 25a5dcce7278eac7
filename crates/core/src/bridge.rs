//! One-shot bridging between issued requests and completion events.
//!
//! A waiter is registered under an operation-scoped key before the
//! request is dispatched; the matching completion event fires it exactly
//! once and removes it. Keys carry the attribute handle for read/write
//! so concurrent operations on distinct handles cannot cross-talk.
//!
//! Concurrent calls to the same operation coalesce: every waiter
//! registered under one key is completed by the same event, which is
//! why outcomes must be `Clone`.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::Result;
use crate::gatt::Service;

/// Operation-scoped waiter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum OpKey {
    Connect,
    Disconnect,
    UpdateRssi,
    DiscoverServices,
    HandleRead(u16),
    HandleWrite(u16),
}

/// Completion payload delivered to a waiter.
#[derive(Debug, Clone)]
pub(crate) enum Completion {
    Unit,
    Rssi(i16),
    Services(Vec<Service>),
    Bytes(Vec<u8>),
}

/// Registry of pending one-shot waiters for one session.
#[derive(Default)]
pub(crate) struct PendingOps {
    waiters: Mutex<HashMap<OpKey, Vec<oneshot::Sender<Result<Completion>>>>>,
}

impl PendingOps {
    /// Register a waiter for `key`.
    ///
    /// Must happen before the corresponding request is issued so a fast
    /// completion cannot slip past the registration.
    pub(crate) fn register(&self, key: OpKey) -> oneshot::Receiver<Result<Completion>> {
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().entry(key).or_default().push(tx);
        rx
    }

    /// Complete every waiter registered under `key`, returning how many
    /// were actually delivered.
    ///
    /// Sends to dropped receivers are ignored: a caller that abandoned
    /// its future simply never observes the outcome.
    pub(crate) fn complete(&self, key: OpKey, outcome: Result<Completion>) -> usize {
        let waiters = match self.waiters.lock().remove(&key) {
            Some(waiters) => waiters,
            None => return 0,
        };
        let mut delivered = 0;
        for tx in waiters {
            if tx.send(outcome.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Drop waiters whose receiving side has gone away (timed-out or
    /// abandoned callers), clearing now-empty keys.
    pub(crate) fn prune(&self) {
        let mut waiters = self.waiters.lock();
        waiters.retain(|_, senders| {
            senders.retain(|tx| !tx.is_closed());
            !senders.is_empty()
        });
    }

    #[cfg(test)]
    fn pending_keys(&self) -> usize {
        self.waiters.lock().len()
    }
}
