//! The `Self` engine (spec.md §4.5): a single in-process peer, `"self"`.
//! All operations post work onto one strand task so every callback in a
//! loopback service runs in a single serialized order.

use crate::error::Error;
use crate::handler::{ConnectHandler, DisconnectHandler, HandlerSet, MessageHandler, ReadyHandler};
use crate::id::Id;
use crate::service::{impl_service_accessors, BoxFuture, Messaging, Observable, Runnable};
use bytes::Bytes;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub struct LoopbackEngine {
    handlers: HandlerSet,
    lifecycle: super::common::Lifecycle,
    deliver_tx: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
}

impl_service_accessors!(LoopbackEngine);

/// Create a loopback service. There are no options — the single peer is
/// always `"self"`.
pub fn create() -> Arc<LoopbackEngine> {
    Arc::new(LoopbackEngine {
        handlers: HandlerSet::default(),
        lifecycle: super::common::Lifecycle::default(),
        deliver_tx: Mutex::new(None),
    })
}

impl LoopbackEngine {
    fn enqueue(&self, bytes: Bytes) {
        if let Some(tx) = self.deliver_tx.lock().unwrap().as_ref() {
            let _ = tx.send(bytes);
        }
    }
}

impl Observable for LoopbackEngine {
    fn add_ready(&self, handler: ReadyHandler) {
        self.handlers.push_ready(handler);
    }
    fn add_connect(&self, handler: ConnectHandler) {
        self.handlers.push_connect(handler);
    }
    fn add_disconnect(&self, handler: DisconnectHandler) {
        self.handlers.push_disconnect(handler);
    }
    fn add_message(&self, handler: MessageHandler) {
        self.handlers.push_message(handler);
    }
}

impl Messaging for LoopbackEngine {
    fn publish(&self, bytes: Bytes) {
        self.enqueue(bytes);
    }

    fn publish_except(&self, id: &Id, bytes: Bytes) {
        if id.as_str() != Id::SELF_TEXT {
            self.enqueue(bytes);
        }
    }

    fn send(&self, id: &Id, bytes: Bytes) {
        if id.as_str() == Id::SELF_TEXT {
            self.enqueue(bytes);
        }
    }

    fn send_many(&self, ids: &[Id], bytes: Bytes) {
        if ids.iter().any(|id| id.as_str() == Id::SELF_TEXT) {
            self.enqueue(bytes);
        }
    }
}

impl Runnable for LoopbackEngine {
    fn start(&self) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async move {
            let mut stop_rx = self.lifecycle.begin_start()?;
            let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();
            *self.deliver_tx.lock().unwrap() = Some(tx);

            let id = Id::this();
            self.handlers.fire_ready(&id);
            self.handlers.fire_connect(&id);

            loop {
                tokio::select! {
                    biased;
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                    msg = rx.recv() => {
                        match msg {
                            None => break,
                            Some(bytes) => self.handlers.fire_message(&id, &bytes),
                        }
                    }
                }
            }

            *self.deliver_tx.lock().unwrap() = None;
            self.lifecycle.settle_stopped();
            Ok(())
        })
    }

    fn stop(&self) {
        self.lifecycle.stop();
    }

    fn restart(&self) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async move {
            self.lifecycle.restart();
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::concat;
    use crate::handler;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn round_trip_and_connect_ordering() {
        let svc = create();
        let connect_count = Arc::new(AtomicU32::new(0));
        let messages = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));

        let cc = connect_count.clone();
        handler::on_connect(svc.as_observable(), move |id| {
            assert_eq!(id.as_str(), "self");
            cc.fetch_add(1, Ordering::SeqCst);
        });
        let msgs = messages.clone();
        handler::on_message(svc.as_observable(), move |_id, bytes| {
            msgs.lock().unwrap().push(bytes.to_vec());
        });

        let svc_run = svc.clone();
        tokio::spawn(async move {
            svc_run.start().await.unwrap();
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let payload = concat(&[&0u32, &"hello".to_owned()]);
        svc.as_messaging().publish(payload.clone().into());
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(connect_count.load(Ordering::SeqCst), 1);
        assert_eq!(*messages.lock().unwrap(), vec![payload]);

        svc.as_runnable().stop();
    }

    #[tokio::test]
    async fn send_only_delivers_to_self() {
        let svc = create();
        let messages = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));
        let msgs = messages.clone();
        handler::on_message(svc.as_observable(), move |_id, bytes| {
            msgs.lock().unwrap().push(bytes.to_vec());
        });

        let svc_run = svc.clone();
        tokio::spawn(async move {
            svc_run.start().await.unwrap();
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        svc.as_messaging().send(&Id::new("someone-else"), Bytes::from_static(b"x"));
        svc.as_messaging().publish_except(&Id::this(), Bytes::from_static(b"y"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(messages.lock().unwrap().is_empty());

        svc.as_messaging().send(&Id::this(), Bytes::from_static(b"z"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*messages.lock().unwrap(), vec![b"z".to_vec()]);

        svc.as_runnable().stop();
    }
}
