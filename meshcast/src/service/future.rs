use std::future::Future;
use std::pin::Pin;

/// A boxed, `Send` future with borrowed lifetime `'a` — the same
/// hand-rolled object-safe-async-trait pattern the reference workspace
/// uses for `rt-updater`'s `Checker` trait, used here so [`Runnable`]
/// stays a plain object-safe trait without pulling in `async-trait`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
