//! Connectionless server with per-peer keepalive liveness (spec.md §4.7.1).

use super::{frame_keepalive, frame_user, TAG_KEEPALIVE, TAG_USER};
use crate::engine::common::Lifecycle;
use crate::error::Error;
use crate::handler::{ConnectHandler, DisconnectHandler, HandlerSet, MessageHandler, ReadyHandler};
use crate::id::Id;
use crate::service::{impl_service_accessors, BoxFuture, Messaging, Observable, Runnable};
use bytes::Bytes;
use std::collections::HashMap;
use std::net::SocketAddr;
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

enum Outbound {
    Publish(Bytes),
    PublishExcept(Id, Bytes),
    Send(Id, Bytes),
    SendMany(Vec<Id>, Bytes),
}

pub struct DatagramServer {
    handlers: HandlerSet,
    lifecycle: Lifecycle,
    options: Options,
    outbound_tx: std::sync::Mutex<Option<mpsc::UnboundedSender<Outbound>>>,
}

impl_service_accessors!(DatagramServer);

pub fn create(options: Options) -> Arc<DatagramServer> {
    Arc::new(DatagramServer {
        handlers: HandlerSet::default(),
        lifecycle: Lifecycle::default(),
        options,
        outbound_tx: std::sync::Mutex::new(None),
    })
}

impl DatagramServer {
    fn enqueue(&self, msg: Outbound) {
        if let Some(tx) = self.outbound_tx.lock().unwrap().as_ref() {
            let _ = tx.send(msg);
        }
    }
}

impl Observable for DatagramServer {
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

impl Messaging for DatagramServer {
    fn publish(&self, bytes: Bytes) {
        self.enqueue(Outbound::Publish(bytes));
    }
    fn publish_except(&self, id: &Id, bytes: Bytes) {
        self.enqueue(Outbound::PublishExcept(id.clone(), bytes));
    }
    fn send(&self, id: &Id, bytes: Bytes) {
        self.enqueue(Outbound::Send(id.clone(), bytes));
    }
    fn send_many(&self, ids: &[Id], bytes: Bytes) {
        self.enqueue(Outbound::SendMany(ids.to_vec(), bytes));
    }
}

impl Runnable for DatagramServer {
    fn start(&self) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async move {
            let mut stop_rx = self.lifecycle.begin_start()?;
            let addr = format!("{}:{}", self.options.host, self.options.port);
            let socket = UdpSocket::bind(&addr)
                .await
                .map_err(|source| Error::Bind { addr: addr.clone(), source })?;
            let local = socket.local_addr()?;
            tracing::info!(%local, "datagram server ready");
            self.handlers.fire_ready(&Id::from(local));

            let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();
            *self.outbound_tx.lock().unwrap() = Some(outbound_tx);

            let mut peers: HashMap<Id, (SocketAddr, Instant)> = HashMap::new();
            let mut buf = vec![0u8; self.options.buffer.max(1)];
            let sweep_period = (self.options.timeout / 4).max(Duration::from_millis(10));
            let mut sweep = tokio::time::interval(sweep_period);

            loop {
                tokio::select! {
                    biased;
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                    _ = sweep.tick() => {
                        let now = Instant::now();
                        let expired: Vec<Id> = peers.iter()
                            .filter(|(_, (_, deadline))| now > *deadline)
                            .map(|(id, _)| id.clone())
                            .collect();
                        for id in expired {
                            peers.remove(&id);
                            self.handlers.fire_disconnect(&id);
                        }
                    }
                    received = socket.recv_from(&mut buf) => {
                        let Ok((n, src)) = received else { continue };
                        if n == 0 {
                            continue;
                        }
                        let id = Id::from(src);
                        match buf[0] {
                            TAG_KEEPALIVE => {
                                let deadline = Instant::now() + self.options.timeout;
                                if let Some(entry) = peers.get_mut(&id) {
                                    entry.1 = deadline;
                                } else {
                                    peers.insert(id.clone(), (src, deadline));
                                    self.handlers.fire_connect(&id);
                                }
                                let _ = socket.send_to(&frame_keepalive(), src).await;
                            }
                            TAG_USER => {
                                self.handlers.fire_message(&id, &buf[1..n]);
                            }
                            _ => {}
                        }
                    }
                    outgoing = outbound_rx.recv() => {
                        let Some(outgoing) = outgoing else { break };
                        self.dispatch_outbound(&socket, &peers, outgoing).await;
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

impl DatagramServer {
    async fn dispatch_outbound(
        &self,
        socket: &UdpSocket,
        peers: &HashMap<Id, (SocketAddr, Instant)>,
        outgoing: Outbound,
    ) {
        let framed_targets: Vec<(SocketAddr, Vec<u8>)> = match outgoing {
            Outbound::Publish(bytes) => {
                let framed = frame_user(&bytes);
                peers.values().map(|(addr, _)| (*addr, framed.clone())).collect()
            }
            Outbound::PublishExcept(except, bytes) => {
                let framed = frame_user(&bytes);
                peers
                    .iter()
                    .filter(|(id, _)| **id != except)
                    .map(|(_, (addr, _))| (*addr, framed.clone()))
                    .collect()
            }
            Outbound::Send(id, bytes) => peers
                .get(&id)
                .map(|(addr, _)| (*addr, frame_user(&bytes)))
                .into_iter()
                .collect(),
            Outbound::SendMany(ids, bytes) => {
                let framed = frame_user(&bytes);
                ids.iter()
                    .filter_map(|id| peers.get(id).map(|(addr, _)| (*addr, framed.clone())))
                    .collect()
            }
        };
        for (addr, framed) in framed_targets {
            let _ = socket.send_to(&framed, addr).await;
        }
    }
}
