use super::drive_connection;
use crate::engine::common::{ConnectionRegistry, Lifecycle};
use crate::error::Error;
use crate::handler::{ConnectHandler, DisconnectHandler, HandlerSet, MessageHandler, ReadyHandler};
use crate::id::Id;
use crate::service::{impl_service_accessors, BoxFuture, Messaging, Observable, Runnable};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Reconnect interval applied between a dropped connection and the next
/// connect attempt (spec.md §4.6.3).
pub(crate) const RECONNECT_INTERVAL: Duration = Duration::from_millis(25);

/// Options for `stream::client::create` (spec.md §6).
#[derive(Debug, Clone)]
pub struct Options {
    pub host: String,
    pub port: u16,
    pub buffer: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            host: "127.0.0.1".to_owned(),
            port: 0,
            buffer: 8192,
        }
    }
}

pub struct StreamClient {
    handlers: Arc<HandlerSet>,
    registry: Arc<ConnectionRegistry>,
    lifecycle: Lifecycle,
    options: Options,
}

impl_service_accessors!(StreamClient);

pub fn create(options: Options) -> Arc<StreamClient> {
    Arc::new(StreamClient {
        handlers: Arc::new(HandlerSet::default()),
        registry: Arc::new(ConnectionRegistry::default()),
        lifecycle: Lifecycle::default(),
        options,
    })
}

impl Observable for StreamClient {
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

impl Messaging for StreamClient {
    fn publish(&self, bytes: Bytes) {
        self.registry.publish(bytes);
    }
    fn publish_except(&self, id: &Id, bytes: Bytes) {
        self.registry.publish_except(id, bytes);
    }
    fn send(&self, id: &Id, bytes: Bytes) {
        self.registry.send(id, bytes);
    }
    fn send_many(&self, ids: &[Id], bytes: Bytes) {
        self.registry.send_many(ids, bytes);
    }
}

impl Runnable for StreamClient {
    fn start(&self) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async move {
            let mut stop_rx = self.lifecycle.begin_start()?;
            let addr = format!("{}:{}", self.options.host, self.options.port);

            loop {
                if *stop_rx.borrow() {
                    break;
                }

                let stream = tokio::select! {
                    biased;
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                        continue;
                    }
                    connected = TcpStream::connect(&addr) => connected,
                };

                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        tracing::debug!(error = %e, %addr, "connect failed, retrying");
                        tokio::select! {
                            biased;
                            changed = stop_rx.changed() => {
                                if changed.is_err() || *stop_rx.borrow() {
                                    break;
                                }
                            }
                            () = tokio::time::sleep(RECONNECT_INTERVAL) => {}
                        }
                        continue;
                    }
                };

                let local = stream.local_addr()?;
                self.handlers.fire_ready(&Id::from(local));

                let id = Id::new(addr.as_str());
                let (tx, rx) = mpsc::unbounded_channel::<Bytes>();
                self.registry.insert(id.clone(), tx);
                self.handlers.fire_connect(&id);

                drive_connection(stream, id.clone(), self.handlers.clone(), rx).await;
                self.registry.remove(&id);

                if *stop_rx.borrow() {
                    break;
                }
                tokio::select! {
                    biased;
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                    () = tokio::time::sleep(RECONNECT_INTERVAL) => {}
                }
            }

            self.registry.clear();
            self.lifecycle.settle_stopped();
            Ok(())
        })
    }

    fn stop(&self) {
        self.lifecycle.stop();
    }

    fn restart(&self) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async move {
            self.registry.clear();
            self.lifecycle.restart();
            Ok(())
        })
    }
}
