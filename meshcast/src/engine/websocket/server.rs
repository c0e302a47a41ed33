use super::{drive_ws_connection, ServerStream};
use crate::engine::common::{ConnectionRegistry, Lifecycle};
use crate::error::Error;
use crate::handler::{ConnectHandler, DisconnectHandler, HandlerSet, MessageHandler, ReadyHandler};
use crate::id::Id;
use crate::service::{impl_service_accessors, BoxFuture, Messaging, Observable, Runnable};
use bytes::Bytes;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http;

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

pub struct WebSocketServer {
    handlers: Arc<HandlerSet>,
    registry: Arc<ConnectionRegistry>,
    lifecycle: Lifecycle,
    options: Options,
    tls: Option<Arc<TlsAcceptor>>,
}

impl_service_accessors!(WebSocketServer);

pub fn create(options: Options) -> Arc<WebSocketServer> {
    create_inner(options, None)
}

pub(crate) fn create_inner(options: Options, tls: Option<Arc<TlsAcceptor>>) -> Arc<WebSocketServer> {
    Arc::new(WebSocketServer {
        handlers: Arc::new(HandlerSet::default()),
        registry: Arc::new(ConnectionRegistry::default()),
        lifecycle: Lifecycle::default(),
        options,
        tls,
    })
}

impl Observable for WebSocketServer {
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

impl Messaging for WebSocketServer {
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

impl Runnable for WebSocketServer {
    fn start(&self) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async move {
            let mut stop_rx = self.lifecycle.begin_start()?;
            let addr = format!("{}:{}", self.options.host, self.options.port);
            let listener = TcpListener::bind(&addr)
                .await
                .map_err(|source| Error::Bind { addr: addr.clone(), source })?;
            let local = listener.local_addr()?;
            tracing::info!(%local, route = %self.options.route, "websocket server ready");
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
                        let (tcp, peer_addr) = match accepted {
                            Ok(pair) => pair,
                            Err(e) => { tracing::warn!(error = %e, "accept failed"); continue; }
                        };
                        self.spawn_upgrade(tcp, Id::from(peer_addr));
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

impl WebSocketServer {
    fn spawn_upgrade(&self, tcp: TcpStream, id: Id) {
        let handlers = self.handlers.clone();
        let registry = self.registry.clone();
        let route = self.options.route.clone();
        let tls = self.tls.clone();

        tokio::spawn(async move {
            let stream = match tls {
                None => ServerStream::Plain(tcp),
                Some(acceptor) => match acceptor.accept(tcp).await {
                    Ok(tls_stream) => ServerStream::Tls(Box::new(tls_stream)),
                    Err(e) => {
                        tracing::warn!(error = %e, "tls handshake failed");
                        return;
                    }
                },
            };

            let check_route = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                if req.uri().path() == route {
                    Ok(resp)
                } else {
                    let rejection = http::Response::builder()
                        .status(http::StatusCode::NOT_FOUND)
                        .body(Some("unknown websocket route".to_owned()))
                        .expect("building a rejection response cannot fail");
                    Err(rejection)
                }
            };

            let ws = match tokio_tungstenite::accept_hdr_async(stream, check_route).await {
                Ok(ws) => ws,
                Err(e) => {
                    tracing::debug!(error = %e, "websocket handshake failed");
                    return;
                }
            };

            let (tx, rx) = mpsc::unbounded_channel::<Bytes>();
            registry.insert(id.clone(), tx);
            handlers.fire_connect(&id);

            drive_ws_connection(ws, id.clone(), handlers.clone(), rx).await;
            registry.remove(&id);
        });
    }
}
