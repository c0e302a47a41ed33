//! One publish/send/observe programming model over loopback, datagram,
//! stream, websocket, and HTTP(S)+websocket transports.
//!
//! Every transport namespace exposes `create(options)`, returning an owning
//! handle to a composite service. Register handlers with the functions in
//! [`handler`], then call [`service::Runnable::start`] on a dedicated task.

pub mod codec;
pub mod error;
pub mod handler;
pub mod id;
pub mod service;

mod engine;

pub use engine::{datagram, http, loopback, stream, websocket};
pub use error::{Error, Result};
pub use id::Id;
