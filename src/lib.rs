//! Lazy, at-most-once shared instances, one per type.
//!
//! A type opts in by implementing [`Singleton`]. It owns a private [`Slot`]
//! (declared with [`slot!`]) and supplies a `construct()` hook that only this
//! crate can call (it takes a [`ConstructToken`]). The blanket
//! [`Instance`] trait then gives it `T::instance()`, which:
//!
//! - constructs the instance on the first call and never at load time,
//! - runs at most one constructor at a time across all threads, and never
//!   again once one has succeeded,
//! - returns the very same `&'static T` on every call.
//!
//! Duplication is refused loudly: [`forbid_duplication!`] makes `Clone`
//! panic and `serde::Deserialize` fail with [`DuplicationForbidden`].
//!
//! # Examples
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use poly_singleton::{forbid_duplication, slot, ConstructToken, Instance, Singleton, Slot};
//!
//! static BUILDS: AtomicUsize = AtomicUsize::new(0);
//!
//! pub struct Config {
//!    loaded: bool,
//! }
//!
//! impl Singleton for Config {
//!    type Error = std::io::Error;
//!
//!    fn slot() -> &'static Slot<Self> {
//!       slot!(Config)
//!    }
//!
//!    fn construct(_: ConstructToken) -> Result<Self, Self::Error> {
//!       BUILDS.fetch_add(1, Ordering::Relaxed);
//!       Ok(Config { loaded: true })
//!    }
//! }
//!
//! forbid_duplication!(Config);
//!
//! assert!(!Config::is_constructed());
//! let first = Config::instance()?;
//! let second = Config::instance()?;
//! assert!(std::ptr::eq(first, second));
//! assert!(first.loaded);
//! assert_eq!(BUILDS.load(Ordering::Relaxed), 1);
//! # Ok::<(), std::io::Error>(())
//! ```
//!
//! # Features
//!
//! - `serde` (default): `forbid_duplication!` also guards `Deserialize`.
//! - `async-tokio` / `async-tokio-mt` (default): [`AsyncSingleton`] and
//!   async slot initialization. With `async-tokio-mt`, waiters fall back to
//!   `block_in_place` after yielding.

/// Duplication errors.
mod error;

/// Duplication guards used by [`forbid_duplication!`].
pub mod guard;

/// The singleton capability and accessor.
mod singleton;

/// Per-type storage cell.
mod slot;

/// Internal synchronization state.
mod state;

pub use error::{Duplication, DuplicationForbidden};
#[cfg(any(feature = "async-tokio", feature = "async-tokio-mt"))]
pub use singleton::{AsyncInstance, AsyncSingleton};
pub use singleton::{instance, ConstructToken, Instance, Singleton};
pub use slot::Slot;

#[doc(hidden)]
pub mod __private {
   #[cfg(feature = "serde")]
   pub use serde;
}
