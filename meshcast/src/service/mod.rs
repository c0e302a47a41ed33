//! Service contracts (spec.md §4.4): the polymorphic capability sets that
//! every transport engine composes into.
//!
//! The source library lets a single value implicitly convert into each
//! capability view (an owning proxy with several conversion operators).
//! Per Design Notes §9(b) that becomes explicit accessor methods here:
//! `as_messaging()`, `as_observable()`, `as_runnable()`, each returning a
//! borrowed trait-object view. A concrete engine "is" a `StandaloneService`
//! simply by implementing all of `Messaging + Observable + Runnable` and
//! forwarding those three accessors to itself — see [`impl_service_accessors`].

mod future;
mod http_transaction;
mod typed;

pub use future::BoxFuture;
pub use http_transaction::{send, Transaction};
pub use typed::{publish_except_value, publish_value, send_many_value, send_value};

use crate::error::Error;
use crate::handler::{ConnectHandler, DisconnectHandler, MessageHandler, ReadyHandler};
use crate::id::Id;
use bytes::Bytes;
use std::sync::Arc;

/// Handler registration surface (spec.md §4.2/§4.4).
///
/// These four methods are the only object-safe primitive; the ergonomic,
/// shape-specific adapters (`on_message_decoded::<T>`, …) live as free
/// functions in [`crate::handler`] and call through to these.
pub trait Observable: Send + Sync {
    fn add_ready(&self, handler: ReadyHandler);
    fn add_connect(&self, handler: ConnectHandler);
    fn add_disconnect(&self, handler: DisconnectHandler);
    fn add_message(&self, handler: MessageHandler);
}

/// Messaging operations (spec.md §4.4). All four enqueue work onto the
/// engine's strand and return immediately — none of these block.
pub trait Messaging: Send + Sync {
    /// Send to every known peer.
    fn publish(&self, bytes: Bytes);

    /// Send to every known peer other than `id`.
    fn publish_except(&self, id: &Id, bytes: Bytes);

    /// Unicast to `id`. A silent no-op if `id` is unknown.
    fn send(&self, id: &Id, bytes: Bytes);

    /// Multicast to every ID in `ids`. Unknown IDs are silently skipped.
    fn send_many(&self, ids: &[Id], bytes: Bytes);
}

/// `Messaging + Observable`: a complete capability set for a connection
/// owner that isn't itself runnable (e.g. a websocket sub-service hosted
/// by a [`WebService`]).
pub trait Service: Messaging + Observable {}
impl<T: Messaging + Observable + ?Sized> Service for T {}

/// `start`/`stop`/`restart` lifecycle (spec.md §4.4, §4.10).
///
/// `start` and `restart` are asynchronous but must be object-safe, so they
/// return a boxed future by hand rather than use `async fn` in a trait —
/// the same pattern the reference workspace uses for its own async trait
/// objects (see `rt-updater`'s `Checker` trait).
pub trait Runnable: Send + Sync {
    /// Runs until [`Runnable::stop`] is called from any thread. Binds
    /// sockets / opens the event loop on first entry.
    fn start(&self) -> BoxFuture<'_, Result<(), Error>>;

    /// Non-blocking, idempotent, safe from any thread.
    fn stop(&self);

    /// Drops the prior engine context and prepares for a fresh `start`.
    /// The caller must have joined the task that ran `start` first.
    fn restart(&self) -> BoxFuture<'_, Result<(), Error>>;
}

/// A complete, runnable unit — the top-level object every transport's
/// `create()` returns (except the HTTP engine, which returns a
/// [`WebService`] instead).
pub trait StandaloneService: Service + Runnable {}
impl<T: Service + Runnable + ?Sized> StandaloneService for T {}

/// The GET-handler surface of the HTTP(S) engine (spec.md §4.9).
pub type GetHandler = Box<dyn Fn(&mut Transaction) + Send + Sync>;

/// A [`Runnable`] that hosts websocket sub-services and plain GET routes.
pub trait WebService: Runnable {
    /// Allocate a websocket sub-[`Service`] bound to `route`. Panics if
    /// `route` is already bound to a GET handler or another sub-service —
    /// per spec.md §3, a route resolves to at most one of the two.
    fn use_ws(&self, route: &str) -> Arc<dyn Service>;

    /// Register a GET handler invoked for any request whose route is not
    /// bound to a websocket sub-service.
    fn on_get(&self, handler: GetHandler);
}

/// Expand to the mechanical `as_messaging`/`as_observable`/`as_runnable`
/// forwarders for a concrete engine type that already implements
/// `Messaging + Observable + Runnable` directly on itself.
macro_rules! impl_service_accessors {
    ($ty:ty) => {
        impl $ty {
            pub fn as_messaging(&self) -> &dyn $crate::service::Messaging {
                self
            }

            pub fn as_observable(&self) -> &dyn $crate::service::Observable {
                self
            }

            pub fn as_runnable(&self) -> &dyn $crate::service::Runnable {
                self
            }
        }
    };
}

pub(crate) use impl_service_accessors;
