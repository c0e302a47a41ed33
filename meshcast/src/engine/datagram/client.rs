//! Connectionless client: one logical peer, the configured server endpoint,
//! tracked through a ping-heartbeat liveness state machine (spec.md §4.7.2,
//! §4.10).

use super::{frame_keepalive, frame_user, TAG_KEEPALIVE, TAG_USER};
use crate::engine::common::Lifecycle;
use crate::error::Error;
use crate::handler::{ConnectHandler, DisconnectHandler, HandlerSet, MessageHandler, ReadyHandler};
use crate::id::Id;
use crate::service::{impl_service_accessors, BoxFuture, Messaging, Observable, Runnable};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::Instant;

const DEFAULT_BUFFER: usize = 1024;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct Options {
    pub host: String,
    pub port: u16,
    pub buffer: usize,
    pub timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            host: "127.0.0.1".to_owned(),
            port: 0,
            buffer: DEFAULT_BUFFER,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub struct DatagramClient {
    handlers: HandlerSet,
    lifecycle: Lifecycle,
    options: Options,
    outbound_tx: std::sync::Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
}

impl_service_accessors!(DatagramClient);

pub fn create(options: Options) -> Arc<DatagramClient> {
    Arc::new(DatagramClient {
        handlers: HandlerSet::default(),
        lifecycle: Lifecycle::default(),
        options,
        outbound_tx: std::sync::Mutex::new(None),
    })
}

impl Observable for DatagramClient {
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

impl Messaging for DatagramClient {
    // The server is the only peer; every operation collapses to "send or don't".
    fn publish(&self, bytes: Bytes) {
        self.enqueue(bytes);
    }

    fn publish_except(&self, id: &Id, bytes: Bytes) {
        if id.as_str() != self.peer_id().as_str() {
            self.enqueue(bytes);
        }
    }

    fn send(&self, id: &Id, bytes: Bytes) {
        if id.as_str() == self.peer_id().as_str() {
            self.enqueue(bytes);
        }
    }

    fn send_many(&self, ids: &[Id], bytes: Bytes) {
        if ids.iter().any(|id| id.as_str() == self.peer_id().as_str()) {
            self.enqueue(bytes);
        }
    }
}

impl DatagramClient {
    fn peer_id(&self) -> Id {
        Id::new(format!("{}:{}", self.options.host, self.options.port))
    }

    fn enqueue(&self, bytes: Bytes) {
        if let Some(tx) = self.outbound_tx.lock().unwrap().as_ref() {
            let _ = tx.send(bytes);
        }
    }
}

impl Runnable for DatagramClient {
    fn start(&self) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async move {
            let mut stop_rx = self.lifecycle.begin_start()?;
            let server_addr = format!("{}:{}", self.options.host, self.options.port);
            let socket = UdpSocket::bind("0.0.0.0:0")
                .await
                .map_err(|source| Error::Bind { addr: "0.0.0.0:0".to_owned(), source })?;
            socket
                .connect(&server_addr)
                .await
                .map_err(|source| Error::Connect { addr: server_addr.clone(), source })?;
            let local = socket.local_addr()?;
            self.handlers.fire_ready(&Id::from(local));

            let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Bytes>();
            *self.outbound_tx.lock().unwrap() = Some(outbound_tx);

            let peer_id = self.peer_id();
            let half_timeout = (self.options.timeout / 2).max(Duration::from_millis(10));
            let sweep_period = (self.options.timeout / 4).max(Duration::from_millis(10));
            let mut ping_interval = tokio::time::interval(half_timeout);
            let mut sweep_interval = tokio::time::interval(sweep_period);
            let mut buf = vec![0u8; self.options.buffer.max(1)];
            let mut alive = false;
            let mut last_reply: Option<Instant> = None;

            loop {
                tokio::select! {
                    biased;
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                    _ = ping_interval.tick() => {
                        let _ = socket.send(&frame_keepalive()).await;
                    }
                    _ = sweep_interval.tick() => {
                        if alive {
                            if let Some(last) = last_reply {
                                if Instant::now() > last + self.options.timeout {
                                    alive = false;
                                    self.handlers.fire_disconnect(&peer_id);
                                }
                            }
                        }
                    }
                    received = socket.recv(&mut buf) => {
                        let Ok(n) = received else { continue };
                        if n == 0 {
                            continue;
                        }
                        match buf[0] {
                            TAG_KEEPALIVE => {
                                last_reply = Some(Instant::now());
                                if !alive {
                                    alive = true;
                                    self.handlers.fire_connect(&peer_id);
                                }
                            }
                            TAG_USER => {
                                self.handlers.fire_message(&peer_id, &buf[1..n]);
                            }
                            _ => {}
                        }
                    }
                    outgoing = outbound_rx.recv() => {
                        let Some(outgoing) = outgoing else { break };
                        let _ = socket.send(&frame_user(&outgoing)).await;
                    }
                }
            }

            *self.outbound_tx.lock().unwrap() = None;
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
