//! The singleton capability and its accessor.
//!
//! A type opts in by implementing [`Singleton`]: it names its own [`Slot`]
//! and supplies a [`construct`](Singleton::construct) hook. The accessor
//! lives on [`Instance`], which is implemented for every `Singleton` and
//! cannot be overridden, so every type gets the same lazy, at-most-once
//! behavior.

use core::any::type_name;
#[cfg(any(feature = "async-tokio", feature = "async-tokio-mt"))]
use core::future::Future;

use crate::Slot;

/// Permission to run a singleton's [`construct`](Singleton::construct) hook.
///
/// Only [`Instance`] and [`AsyncInstance`] mint tokens. Code outside this
/// crate can name the type but cannot create a value of it, so it cannot
/// call the hook to build a second, independent instance.
///
/// ```rust,compile_fail
/// use std::convert::Infallible;
/// use poly_singleton::{slot, ConstructToken, Instance, Singleton, Slot};
///
/// pub struct Config;
///
/// impl Singleton for Config {
///    type Error = Infallible;
///
///    fn slot() -> &'static Slot<Self> {
///       slot!(Config)
///    }
///
///    fn construct(_: ConstructToken) -> Result<Self, Infallible> {
///       Ok(Config)
///    }
/// }
///
/// let _shared = Config::instance().unwrap();
/// // The token's field is private to poly_singleton.
/// let _second = <Config as Singleton>::construct(ConstructToken(())).unwrap();
/// ```
pub struct ConstructToken(());

impl ConstructToken {
   #[inline]
   const fn new() -> Self {
      Self(())
   }
}

/// A type with exactly one shared instance per process.
///
/// Implementors keep their fields private and offer no public constructor.
/// The hook itself demands a [`ConstructToken`], which only the accessors
/// can provide, so the only way to an instance is [`Instance::instance`].
///
/// ```rust
/// use std::convert::Infallible;
/// use poly_singleton::{slot, ConstructToken, Instance, Singleton, Slot};
///
/// pub struct Clock {
///    epoch: u64,
/// }
///
/// impl Singleton for Clock {
///    type Error = Infallible;
///
///    fn slot() -> &'static Slot<Self> {
///       slot!(Clock)
///    }
///
///    fn construct(_: ConstructToken) -> Result<Self, Infallible> {
///       Ok(Clock { epoch: 1_700_000_000 })
///    }
/// }
///
/// let a = Clock::instance().unwrap();
/// let b = Clock::instance().unwrap();
/// assert!(std::ptr::eq(a, b));
/// assert_eq!(a.epoch, 1_700_000_000);
/// ```
pub trait Singleton: Sized + Send + Sync + 'static {
   /// Error raised by [`construct`](Self::construct).
   type Error;

   /// The slot owned by this type. Must not be shared with any other type;
   /// use [`slot!`](crate::slot).
   fn slot() -> &'static Slot<Self>;

   /// Builds the shared instance. Runs lazily on first access, and again
   /// only if a previous run failed.
   fn construct(token: ConstructToken) -> Result<Self, Self::Error>;
}

/// Accessors available on every [`Singleton`].
pub trait Instance: Singleton {
   /// Returns the shared instance, constructing it on first call.
   ///
   /// Every successful call returns the same reference. If the hook fails,
   /// its error is returned unchanged and the slot stays empty.
   fn instance() -> Result<&'static Self, Self::Error>;

   /// Returns the shared instance if it has been constructed, without
   /// constructing it.
   fn try_instance() -> Option<&'static Self>;

   /// Whether the shared instance has been constructed.
   fn is_constructed() -> bool;
}

impl<T: Singleton> Instance for T {
   #[inline]
   fn instance() -> Result<&'static Self, Self::Error> {
      T::slot().get_or_try_init(traced_construct::<T>)
   }

   #[inline]
   fn try_instance() -> Option<&'static Self> {
      T::slot().get()
   }

   #[inline]
   fn is_constructed() -> bool {
      T::slot().is_populated()
   }
}

/// Free-function form of [`Instance::instance`].
#[inline]
pub fn instance<T: Singleton>() -> Result<&'static T, T::Error> {
   T::instance()
}

fn traced_construct<T: Singleton>() -> Result<T, T::Error> {
   tracing::debug!(singleton = type_name::<T>(), "constructing shared instance");
   let result = T::construct(ConstructToken::new());
   trace_outcome::<T, _>(&result);
   result
}

fn trace_outcome<T, E>(result: &Result<T, E>) {
   match result {
      Ok(_) => tracing::debug!(singleton = type_name::<T>(), "shared instance constructed"),
      Err(_) => tracing::warn!(
         singleton = type_name::<T>(),
         "construction failed, slot stays empty"
      ),
   }
}

/// A [`Singleton`] whose construction is asynchronous.
#[cfg(any(feature = "async-tokio", feature = "async-tokio-mt"))]
pub trait AsyncSingleton: Sized + Send + Sync + 'static {
   /// Error raised by [`construct`](Self::construct).
   type Error: Send;

   /// The slot owned by this type.
   fn slot() -> &'static Slot<Self>;

   /// Builds the shared instance. See [`ConstructToken`].
   fn construct(token: ConstructToken) -> impl Future<Output = Result<Self, Self::Error>> + Send;
}

/// Async accessor available on every [`AsyncSingleton`].
#[cfg(any(feature = "async-tokio", feature = "async-tokio-mt"))]
pub trait AsyncInstance: AsyncSingleton {
   /// Returns the shared instance, constructing it on first call.
   fn instance_async() -> impl Future<Output = Result<&'static Self, Self::Error>> + Send;
}

#[cfg(any(feature = "async-tokio", feature = "async-tokio-mt"))]
impl<T: AsyncSingleton> AsyncInstance for T {
   fn instance_async() -> impl Future<Output = Result<&'static Self, Self::Error>> + Send {
      async {
         T::slot()
            .get_or_try_init_async(|| async {
               tracing::debug!(singleton = type_name::<T>(), "constructing shared instance");
               let result = T::construct(ConstructToken::new()).await;
               trace_outcome::<T, _>(&result);
               result
            })
            .await
      }
   }
}

/// Expands to a `&'static Slot<$ty>` backed by a `static` private to the call site.
///
/// Each expansion declares a distinct `static`, so every type using it in its
/// own [`Singleton::slot`] gets an independent slot.
#[macro_export]
macro_rules! slot {
   ($ty:ty) => {{
      static SLOT: $crate::Slot<$ty> = $crate::Slot::new();
      &SLOT
   }};
}
