//! Scaffolding shared by the connection-oriented engines (stream, websocket):
//! the Fresh→Running→Stopped→Fresh lifecycle state machine (spec.md §4.10)
//! and the per-peer outbound-queue registry that backs `Messaging`.

use crate::error::Error;
use crate::id::Id;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;
use tokio::sync::{mpsc, watch};

const FRESH: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

/// Tracks the engine-context lifecycle described in spec.md §4.10 and
/// hands `start()` a receiver that resolves once `stop()` is called from
/// any thread.
pub(crate) struct Lifecycle {
    state: AtomicU8,
    stop_tx: Mutex<Option<watch::Sender<bool>>>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Lifecycle {
            state: AtomicU8::new(FRESH),
            stop_tx: Mutex::new(None),
        }
    }
}

impl Lifecycle {
    /// Call at the top of `start()`. Rejects `start` called on a `Stopped`
    /// engine — the caller must `restart()` first (spec.md §4.10, §7).
    pub fn begin_start(&self) -> Result<watch::Receiver<bool>, Error> {
        if self.state.load(Ordering::SeqCst) == STOPPED {
            return Err(Error::RestartBeforeStop);
        }
        let (tx, rx) = watch::channel(false);
        *self.stop_tx.lock().unwrap() = Some(tx);
        self.state.store(RUNNING, Ordering::SeqCst);
        Ok(rx)
    }

    /// Non-blocking, idempotent, callable from any thread.
    pub fn stop(&self) {
        if let Some(tx) = self.stop_tx.lock().unwrap().as_ref() {
            let _ = tx.send(true);
        }
        self.state.store(STOPPED, Ordering::SeqCst);
    }

    /// Call once `start()`'s run loop has returned, whether via `stop()`
    /// or a fatal error.
    pub fn settle_stopped(&self) {
        self.state.store(STOPPED, Ordering::SeqCst);
    }

    /// Drop the prior context, making the engine ready for a fresh `start`.
    pub fn restart(&self) {
        *self.stop_tx.lock().unwrap() = None;
        self.state.store(FRESH, Ordering::SeqCst);
    }
}

/// Per-peer outbound byte queues, keyed by [`Id`]. Every connection-
/// oriented engine's `Messaging` impl is a thin wrapper over this.
#[derive(Default)]
pub(crate) struct ConnectionRegistry {
    outbound: Mutex<HashMap<Id, mpsc::UnboundedSender<Bytes>>>,
}

impl ConnectionRegistry {
    pub fn insert(&self, id: Id, tx: mpsc::UnboundedSender<Bytes>) {
        self.outbound.lock().unwrap().insert(id, tx);
    }

    pub fn remove(&self, id: &Id) {
        self.outbound.lock().unwrap().remove(id);
    }

    pub fn clear(&self) {
        self.outbound.lock().unwrap().clear();
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.outbound.lock().unwrap().contains_key(id)
    }

    pub fn publish(&self, bytes: Bytes) {
        for tx in self.outbound.lock().unwrap().values() {
            let _ = tx.send(bytes.clone());
        }
    }

    pub fn publish_except(&self, except: &Id, bytes: Bytes) {
        for (id, tx) in self.outbound.lock().unwrap().iter() {
            if id != except {
                let _ = tx.send(bytes.clone());
            }
        }
    }

    /// Silent no-op when `id` is unknown (spec.md §7).
    pub fn send(&self, id: &Id, bytes: Bytes) {
        if let Some(tx) = self.outbound.lock().unwrap().get(id) {
            let _ = tx.send(bytes);
        }
    }

    pub fn send_many(&self, ids: &[Id], bytes: Bytes) {
        let map = self.outbound.lock().unwrap();
        for id in ids {
            if let Some(tx) = map.get(id) {
                let _ = tx.send(bytes.clone());
            }
        }
    }
}
