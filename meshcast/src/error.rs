//! Error types for the transport engines.
//!
//! Most public operations are fire-and-forget (`publish`/`send`) and cannot
//! fail observably — per the contract in spec.md §7, a `send` to an unknown
//! ID is a silent no-op. The cases that *do* surface an error are bind
//! failure, connect failure, TLS setup, and the two documented
//! programming-error conditions (ambiguous route, restart-before-stop).

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("websocket handshake failed: {0}")]
    Handshake(String),

    #[error("tls setup failed: {0}")]
    Tls(String),

    #[error(
        "start() called after stop() without an intervening restart(); restart the engine first"
    )]
    RestartBeforeStop,

    #[error("route {0:?} is already bound to a websocket sub-service or GET handler")]
    AmbiguousRoute(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
