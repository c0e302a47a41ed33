use super::{invoke_guarded, ConnectHandler, DisconnectHandler, MessageHandler, ReadyHandler};
use crate::id::Id;
use std::sync::Mutex;

/// Ordered handler lists shared by every engine.
///
/// Per spec.md §3, registration order is preserved and all handlers of a
/// kind run in order on each event; per spec.md §5, registration is only
/// safe before `start()` is called, so a plain [`Mutex`] (rather than no
/// lock at all) is the conservative, still-zero-contention choice — it is
/// only ever taken once up front per handler, and once per event at fire
/// time, never held across an `.await`.
#[derive(Default)]
pub(crate) struct HandlerSet {
    ready: Mutex<Vec<ReadyHandler>>,
    connect: Mutex<Vec<ConnectHandler>>,
    disconnect: Mutex<Vec<DisconnectHandler>>,
    message: Mutex<Vec<MessageHandler>>,
}

impl HandlerSet {
    pub fn push_ready(&self, h: ReadyHandler) {
        self.ready.lock().unwrap().push(h);
    }

    pub fn push_connect(&self, h: ConnectHandler) {
        self.connect.lock().unwrap().push(h);
    }

    pub fn push_disconnect(&self, h: DisconnectHandler) {
        self.disconnect.lock().unwrap().push(h);
    }

    pub fn push_message(&self, h: MessageHandler) {
        self.message.lock().unwrap().push(h);
    }

    pub fn fire_ready(&self, id: &Id) {
        for h in self.ready.lock().unwrap().iter() {
            invoke_guarded("on_ready", || h(id));
        }
    }

    pub fn fire_connect(&self, id: &Id) {
        for h in self.connect.lock().unwrap().iter() {
            invoke_guarded("on_connect", || h(id));
        }
    }

    pub fn fire_disconnect(&self, id: &Id) {
        for h in self.disconnect.lock().unwrap().iter() {
            invoke_guarded("on_disconnect", || h(id));
        }
    }

    pub fn fire_message(&self, id: &Id, bytes: &[u8]) {
        for h in self.message.lock().unwrap().iter() {
            invoke_guarded("on_message", || h(id, bytes));
        }
    }
}
