//! TLS twins of the websocket transport (spec.md §4.8, §6): servers read
//! `cert.pem`, `key.pem`, and `dh.pem` from a configured directory.

use super::client::{self, WebSocketClient};
use super::server::{self, WebSocketServer};
use crate::error::Error;
use rustls_pemfile::{certs, private_key};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub cert_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub route: String,
    pub buffer: usize,
}

impl ServerOptions {
    pub fn new(cert_dir: impl Into<PathBuf>, host: impl Into<String>, port: u16) -> Self {
        ServerOptions {
            cert_dir: cert_dir.into(),
            host: host.into(),
            port,
            route: "/".to_owned(),
            buffer: 8192,
        }
    }
}

pub fn create_server(options: ServerOptions) -> Result<Arc<WebSocketServer>, Error> {
    let acceptor = build_acceptor(&options.cert_dir)?;
    let inner = server::Options {
        host: options.host,
        port: options.port,
        route: options.route,
        buffer: options.buffer,
    };
    Ok(server::create_inner(inner, Some(Arc::new(acceptor))))
}

pub fn create_client(options: client::Options) -> Arc<WebSocketClient> {
    client::create_inner(options, true)
}

/// `cert-dir` must contain `cert.pem`, `key.pem`, `dh.pem` (spec.md §6).
/// `dh.pem` is read and validated for presence to match the documented
/// contract; rustls has no Diffie-Hellman parameter input for its cipher
/// suites, so its contents are otherwise unused.
fn build_acceptor(cert_dir: &Path) -> Result<TlsAcceptor, Error> {
    let cert_path = cert_dir.join("cert.pem");
    let key_path = cert_dir.join("key.pem");
    let dh_path = cert_dir.join("dh.pem");

    let cert_bytes = std::fs::read(&cert_path)
        .map_err(|e| Error::Tls(format!("reading {}: {e}", cert_path.display())))?;
    let key_bytes = std::fs::read(&key_path)
        .map_err(|e| Error::Tls(format!("reading {}: {e}", key_path.display())))?;
    std::fs::metadata(&dh_path)
        .map_err(|e| Error::Tls(format!("reading {}: {e}", dh_path.display())))?;

    let cert_chain = certs(&mut cert_bytes.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| Error::Tls(format!("parsing {}: {e}", cert_path.display())))?;
    let private_key = private_key(&mut key_bytes.as_slice())
        .map_err(|e| Error::Tls(format!("parsing {}: {e}", key_path.display())))?
        .ok_or_else(|| Error::Tls(format!("no private key found in {}", key_path.display())))?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, private_key)
        .map_err(|e| Error::Tls(e.to_string()))?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}
