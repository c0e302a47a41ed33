use super::drive_ws_connection;
use crate::engine::common::{ConnectionRegistry, Lifecycle};
use crate::engine::stream::client::RECONNECT_INTERVAL;
use crate::error::Error;
use crate::handler::{ConnectHandler, DisconnectHandler, HandlerSet, MessageHandler, ReadyHandler};
use crate::id::Id;
use crate::service::{impl_service_accessors, BoxFuture, Messaging, Observable, Runnable};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::MaybeTlsStream;

#[derive(Debug, Clone)]
pub struct Options {
    pub host: String,
    pub port: u16,
    pub route: String,
    pub buffer: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            host: "127.0.0.1".to_owned(),
            port: 0,
            route: "/".to_owned(),
            buffer: 8192,
        }
    }
}

pub struct WebSocketClient {
    handlers: Arc<HandlerSet>,
    registry: Arc<ConnectionRegistry>,
    lifecycle: Lifecycle,
    options: Options,
    secure: bool,
}

impl_service_accessors!(WebSocketClient);

pub fn create(options: Options) -> Arc<WebSocketClient> {
    create_inner(options, false)
}

pub(crate) fn create_inner(options: Options, secure: bool) -> Arc<WebSocketClient> {
    Arc::new(WebSocketClient {
        handlers: Arc::new(HandlerSet::default()),
        registry: Arc::new(ConnectionRegistry::default()),
        lifecycle: Lifecycle::default(),
        options,
        secure,
    })
}

impl Observable for WebSocketClient {
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

impl Messaging for WebSocketClient {
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

impl Runnable for WebSocketClient {
    fn start(&self) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async move {
            let mut stop_rx = self.lifecycle.begin_start()?;
            let scheme = if self.secure { "wss" } else { "ws" };
            let url = format!("{scheme}://{}:{}{}", self.options.host, self.options.port, self.options.route);

            loop {
                if *stop_rx.borrow() {
                    break;
                }

                let connected = tokio::select! {
                    biased;
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                        continue;
                    }
                    connected = tokio_tungstenite::connect_async(&url) => connected,
                };

                let ws = match connected {
                    Ok((ws, _response)) => ws,
                    Err(e) => {
                        tracing::debug!(error = %e, %url, "websocket connect failed, retrying");
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

                let local = match ws.get_ref() {
                    MaybeTlsStream::Plain(tcp) => tcp.local_addr(),
                    MaybeTlsStream::Rustls(tls) => tls.get_ref().0.local_addr(),
                    _ => Err(std::io::Error::other("unrecognized websocket stream type")),
                }?;
                self.handlers.fire_ready(&Id::from(local));

                let id = Id::new(format!("{}:{}", self.options.host, self.options.port));
                let (tx, rx) = mpsc::unbounded_channel::<Bytes>();
                self.registry.insert(id.clone(), tx);
                self.handlers.fire_connect(&id);

                drive_ws_connection(ws, id.clone(), self.handlers.clone(), rx).await;
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
