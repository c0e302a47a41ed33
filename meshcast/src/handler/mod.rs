//! Handler adaptation (spec.md §4.2) and the tag-dispatch combinator
//! (spec.md §4.3).
//!
//! Rust has no analogue of the source library's compile-time
//! arity/type detection of user lambdas (spec.md §9, Design Notes). Per the
//! sanctioned substitution, each of the six accepted shapes gets its own
//! explicitly named free function (`on_message`, `on_message_bytes`,
//! `on_message_decoded::<T>`, …) that adapts a user closure into the
//! canonical `(Id, bytes)` form and registers it on an [`Observable`].
//! There is no shared entry point for these shapes to be ambiguous over.

mod dispatch;
mod set;

pub use dispatch::{map, mapping, TagMapping};
pub(crate) use set::HandlerSet;

use crate::codec::Decode;
use crate::id::Id;
use crate::service::Observable;
use std::panic::AssertUnwindSafe;

pub type ReadyHandler = Box<dyn Fn(&Id) + Send + Sync>;
pub type ConnectHandler = Box<dyn Fn(&Id) + Send + Sync>;
pub type DisconnectHandler = Box<dyn Fn(&Id) + Send + Sync>;
pub type MessageHandler = Box<dyn Fn(&Id, &[u8]) + Send + Sync>;

/// Run `f`, logging and swallowing a panic instead of letting it unwind
/// onto the engine's strand task. This is the Rust rendering of spec.md
/// §3's "a handler that throws must not crash the engine".
pub(crate) fn invoke_guarded<F: FnOnce()>(label: &'static str, f: F) {
    if std::panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::error!(handler = label, "handler panicked; engine continues");
    }
}

// ---------------------------------------------------------------------------
// Lifecycle handler adapters — accept (Id) or ()
// ---------------------------------------------------------------------------

/// Register an `on_ready` handler of shape `(Id)`.
pub fn on_ready(obs: &dyn Observable, f: impl Fn(&Id) + Send + Sync + 'static) {
    obs.add_ready(Box::new(f));
}

/// Register an `on_ready` handler of shape `()`, ignoring the ID.
pub fn on_ready_any(obs: &dyn Observable, f: impl Fn() + Send + Sync + 'static) {
    obs.add_ready(Box::new(move |_id| f()));
}

/// Register an `on_connect` handler of shape `(Id)`.
pub fn on_connect(obs: &dyn Observable, f: impl Fn(&Id) + Send + Sync + 'static) {
    obs.add_connect(Box::new(f));
}

/// Register an `on_connect` handler of shape `()`, ignoring the ID.
pub fn on_connect_any(obs: &dyn Observable, f: impl Fn() + Send + Sync + 'static) {
    obs.add_connect(Box::new(move |_id| f()));
}

/// Register an `on_disconnect` handler of shape `(Id)`.
pub fn on_disconnect(obs: &dyn Observable, f: impl Fn(&Id) + Send + Sync + 'static) {
    obs.add_disconnect(Box::new(f));
}

/// Register an `on_disconnect` handler of shape `()`, ignoring the ID.
pub fn on_disconnect_any(obs: &dyn Observable, f: impl Fn() + Send + Sync + 'static) {
    obs.add_disconnect(Box::new(move |_id| f()));
}

// ---------------------------------------------------------------------------
// Message handler adapters — the six shapes of spec.md §4.2's table
// ---------------------------------------------------------------------------

/// `(Id, bytes, u64)` — pass through unchanged. The canonical shape.
pub fn on_message(obs: &dyn Observable, f: impl Fn(&Id, &[u8]) + Send + Sync + 'static) {
    obs.add_message(Box::new(f));
}

/// `(Id)` — ignore the payload entirely.
pub fn on_message_id(obs: &dyn Observable, f: impl Fn(&Id) + Send + Sync + 'static) {
    obs.add_message(Box::new(move |id, _bytes| f(id)));
}

/// `(Id, T)` where `T: Decode` — deserialize the whole payload as `T`.
pub fn on_message_id_decoded<T: Decode + 'static>(
    obs: &dyn Observable,
    f: impl Fn(&Id, T) + Send + Sync + 'static,
) {
    obs.add_message(Box::new(move |id, bytes| f(id, T::read_from(bytes))));
}

/// `(bytes, u64)` — ignore the ID.
pub fn on_message_bytes(obs: &dyn Observable, f: impl Fn(&[u8]) + Send + Sync + 'static) {
    obs.add_message(Box::new(move |_id, bytes| f(bytes)));
}

/// `(T)` where `T: Decode` — ignore the ID, deserialize the payload.
pub fn on_message_decoded<T: Decode + 'static>(
    obs: &dyn Observable,
    f: impl Fn(T) + Send + Sync + 'static,
) {
    obs.add_message(Box::new(move |_id, bytes| f(T::read_from(bytes))));
}

/// `()` — ignore both the ID and the payload.
pub fn on_message_any(obs: &dyn Observable, f: impl Fn() + Send + Sync + 'static) {
    obs.add_message(Box::new(move |_id, _bytes| f()));
}
