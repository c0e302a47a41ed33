use super::drive_connection;
use crate::engine::common::{ConnectionRegistry, Lifecycle};
use crate::error::Error;
use crate::handler::{ConnectHandler, DisconnectHandler, HandlerSet, MessageHandler, ReadyHandler};
use crate::id::Id;
use crate::service::{impl_service_accessors, BoxFuture, Messaging, Observable, Runnable};
use bytes::Bytes;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Options for `stream::server::create` (spec.md §6).
#[derive(Debug, Clone)]
pub struct Options {
    pub host: String,
    pub port: u16,
    /// Initial read-buffer capacity hint; the buffer still grows as needed.
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

pub struct StreamServer {
    handlers: Arc<HandlerSet>,
    registry: Arc<ConnectionRegistry>,
    lifecycle: Lifecycle,
    options: Options,
}

impl_service_accessors!(StreamServer);

pub fn create(options: Options) -> Arc<StreamServer> {
    Arc::new(StreamServer {
        handlers: Arc::new(HandlerSet::default()),
        registry: Arc::new(ConnectionRegistry::default()),
        lifecycle: Lifecycle::default(),
        options,
    })
}

impl Observable for StreamServer {
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

impl Messaging for StreamServer {
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

impl Runnable for StreamServer {
    fn start(&self) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async move {
            let mut stop_rx = self.lifecycle.begin_start()?;
            let addr = format!("{}:{}", self.options.host, self.options.port);
            let listener = TcpListener::bind(&addr)
                .await
                .map_err(|source| Error::Bind { addr: addr.clone(), source })?;
            let local = listener.local_addr()?;
            tracing::info!(%local, "stream server ready");
            self.handlers.fire_ready(&Id::from(local));

            loop {
                tokio::select! {
                    biased;
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                    accepted = listener.accept() => {
                        let (stream, peer_addr) = match accepted {
                            Ok(pair) => pair,
                            Err(e) => { tracing::warn!(error = %e, "accept failed"); continue; }
                        };
                        self.spawn_connection(stream, Id::from(peer_addr));
                    }
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

impl StreamServer {
    fn spawn_connection(&self, stream: tokio::net::TcpStream, id: Id) {
        let (tx, rx) = mpsc::unbounded_channel::<Bytes>();
        self.registry.insert(id.clone(), tx);
        self.handlers.fire_connect(&id);

        let handlers = self.handlers.clone();
        let registry = self.registry.clone();
        tokio::spawn(async move {
            let conn_id = id;
            drive_connection(stream, conn_id.clone(), handlers, rx).await;
            registry.remove(&conn_id);
        });
    }
}
