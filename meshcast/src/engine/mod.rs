//! Transport engine implementations (spec.md §4.5–§4.9): one module per
//! namespace, each exposing a `create(options)` returning a composite
//! service.

pub(crate) mod common;

pub mod datagram;
pub mod http;
pub mod loopback;
pub mod stream;
pub mod websocket;
