//! HTTP(S) web service engine (spec.md §4.9): hosts websocket upgrades on
//! registered routes and dispatches everything else to a single GET handler.

use crate::error::Error;
use crate::handler::{ConnectHandler, DisconnectHandler, HandlerSet, MessageHandler, ReadyHandler};
use crate::id::Id;
use crate::service::{BoxFuture, GetHandler, Messaging, Observable, Runnable, Service, Transaction};
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;

use super::common::ConnectionRegistry;

const SERVER_BANNER: &str = "meshcast";
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

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

#[derive(Debug, Clone)]
pub struct SecureOptions {
    pub cert_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub buffer: usize,
}

impl SecureOptions {
    pub fn new(cert_dir: impl Into<PathBuf>, host: impl Into<String>, port: u16) -> Self {
        SecureOptions {
            cert_dir: cert_dir.into(),
            host: host.into(),
            port,
            buffer: 8192,
        }
    }
}

/// A websocket sub-[`Service`] owned by the parent [`HttpServer`]; its
/// lifetime is the parent's (spec.md GLOSSARY: "Sub-Service").
pub struct WsSubService {
    handlers: Arc<HandlerSet>,
    registry: Arc<ConnectionRegistry>,
}

impl Default for WsSubService {
    fn default() -> Self {
        WsSubService {
            handlers: Arc::new(HandlerSet::default()),
            registry: Arc::new(ConnectionRegistry::default()),
        }
    }
}

impl Observable for WsSubService {
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

impl Messaging for WsSubService {
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

pub struct HttpServer {
    options: Options,
    tls: Option<RustlsConfig>,
    lifecycle: super::common::Lifecycle,
    ws_routes: Mutex<HashMap<String, Arc<WsSubService>>>,
    get_handler: Mutex<Option<Arc<GetHandler>>>,
}

pub fn create(options: Options) -> Arc<HttpServer> {
    Arc::new(HttpServer {
        options: Options { host: options.host, port: options.port, buffer: options.buffer },
        tls: None,
        lifecycle: super::common::Lifecycle::default(),
        ws_routes: Mutex::new(HashMap::new()),
        get_handler: Mutex::new(None),
    })
}

/// `cert-dir` must contain `cert.pem`, `key.pem`, `dh.pem` (spec.md §6);
/// `dh.pem` is only checked for presence — see the websocket TLS module for
/// the same contract.
pub async fn create_secure(options: SecureOptions) -> Result<Arc<HttpServer>, Error> {
    let cert_path = options.cert_dir.join("cert.pem");
    let key_path = options.cert_dir.join("key.pem");
    validate_dh_present(&options.cert_dir)?;

    let tls = RustlsConfig::from_pem_file(&cert_path, &key_path)
        .await
        .map_err(|e| Error::Tls(e.to_string()))?;

    Ok(Arc::new(HttpServer {
        options: Options { host: options.host, port: options.port, buffer: options.buffer },
        tls: Some(tls),
        lifecycle: super::common::Lifecycle::default(),
        ws_routes: Mutex::new(HashMap::new()),
        get_handler: Mutex::new(None),
    }))
}

fn validate_dh_present(cert_dir: &Path) -> Result<(), Error> {
    let dh_path = cert_dir.join("dh.pem");
    std::fs::metadata(&dh_path)
        .map(|_| ())
        .map_err(|e| Error::Tls(format!("reading {}: {e}", dh_path.display())))
}

impl crate::service::WebService for HttpServer {
    fn use_ws(&self, route: &str) -> Arc<dyn Service> {
        let mut routes = self.ws_routes.lock().unwrap();
        if routes.contains_key(route) {
            panic!("route {route:?} is already bound to a websocket sub-service");
        }
        let sub = Arc::new(WsSubService::default());
        routes.insert(route.to_owned(), sub.clone());
        sub
    }

    fn on_get(&self, handler: GetHandler) {
        *self.get_handler.lock().unwrap() = Some(Arc::new(handler));
    }
}

impl Runnable for HttpServer {
    fn start(&self) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async move {
            let mut stop_rx = self.lifecycle.begin_start()?;
            let addr = format!("{}:{}", self.options.host, self.options.port);
            let routes = self.ws_routes.lock().unwrap().clone();
            let get_handler = self.get_handler.lock().unwrap().clone();

            let mut router = Router::new();
            for (path, sub) in &routes {
                router = router.route(path, get(ws_route_handler).with_state(sub.clone()));
            }
            let router = router
                .fallback(fallback_handler)
                .with_state(get_handler)
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    DEFAULT_READ_TIMEOUT,
                ))
                .layer(
                    CorsLayer::permissive()
                        .allow_methods([axum::http::Method::GET]),
                )
                .layer(SetResponseHeaderLayer::overriding(
                    header::SERVER,
                    HeaderValue::from_static(SERVER_BANNER),
                ));

            let shutdown = async move {
                let _ = stop_rx.changed().await;
            };

            match &self.tls {
                None => {
                    let listener = TcpListener::bind(&addr)
                        .await
                        .map_err(|source| Error::Bind { addr: addr.clone(), source })?;
                    let local = listener.local_addr()?;
                    tracing::info!(%local, "http server ready");
                    self.handlers_fire_ready_for_routes(&routes, local);

                    axum::serve(
                        listener,
                        router.into_make_service_with_connect_info::<SocketAddr>(),
                    )
                    .with_graceful_shutdown(shutdown)
                    .await?;
                }
                Some(tls) => {
                    let socket_addr: SocketAddr = addr
                        .parse()
                        .map_err(|_| Error::Bind {
                            addr: addr.clone(),
                            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "bad address"),
                        })?;
                    self.handlers_fire_ready_for_routes(&routes, socket_addr);

                    axum_server::bind_rustls(socket_addr, tls.clone())
                        .serve(router.into_make_service_with_connect_info::<SocketAddr>())
                        .await?;
                }
            }

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

impl HttpServer {
    fn handlers_fire_ready_for_routes(&self, routes: &HashMap<String, Arc<WsSubService>>, local: SocketAddr) {
        for (path, sub) in routes {
            sub.handlers.fire_ready(&Id::new(format!("{local}{path}")));
        }
    }
}

async fn ws_route_handler(
    ws_upgrade: Result<WebSocketUpgrade, axum::extract::ws::rejection::WebSocketUpgradeRejection>,
    State(sub): State<Arc<WsSubService>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    match ws_upgrade {
        Ok(upgrade) => upgrade.on_upgrade(move |socket| drive_sub_connection(socket, Id::from(addr), sub)),
        Err(_) => (StatusCode::OK, ()).into_response(),
    }
}

async fn drive_sub_connection(ws: WebSocket, id: Id, sub: Arc<WsSubService>) {
    let (tx, mut outbound_rx) = mpsc::unbounded_channel::<Bytes>();
    sub.registry.insert(id.clone(), tx);
    sub.handlers.fire_connect(&id);

    let (mut sink, mut source) = ws.split();
    loop {
        tokio::select! {
            biased;
            outgoing = outbound_rx.recv() => {
                match outgoing {
                    None => break,
                    Some(bytes) => {
                        if sink.send(WsMessage::Binary(bytes)).await.is_err() {
                            break;
                        }
                    }
                }
            }
            incoming = source.next() => {
                match incoming {
                    None | Some(Err(_)) => break,
                    Some(Ok(WsMessage::Binary(bytes))) => sub.handlers.fire_message(&id, &bytes),
                    Some(Ok(WsMessage::Close(_))) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    sub.registry.remove(&id);
    sub.handlers.fire_disconnect(&id);
}

async fn fallback_handler(State(get_handler): State<Option<Arc<GetHandler>>>, uri: Uri) -> Response {
    let mut transaction = Transaction::new(uri.path());
    if let Some(handler) = get_handler.as_ref() {
        handler(&mut transaction);
    }

    if transaction.sent() {
        let content_type = transaction.content_type().to_owned();
        let body = transaction.into_body();
        ([(header::CONTENT_TYPE, content_type)], body).into_response()
    } else {
        (
            StatusCode::BAD_REQUEST,
            [(header::CONTENT_TYPE, "text/plain")],
            "",
        )
            .into_response()
    }
}
