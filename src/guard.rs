//! Guards that make duplication of a singleton fail loudly.
//!
//! [`forbid_duplication!`](crate::forbid_duplication) wires these into
//! `Clone` and, with the `serde` feature, `serde::Deserialize`.

use core::any::type_name;

use crate::{Duplication, DuplicationForbidden};

/// Rejects a clone of singleton `T`.
///
/// Logs the attempt and panics with a [`DuplicationForbidden`] payload, which
/// callers catching the unwind can recover with `downcast_ref`.
#[cold]
#[track_caller]
pub fn reject_clone<T: ?Sized>() -> ! {
   let err = DuplicationForbidden::new::<T>(Duplication::Clone);
   tracing::error!(singleton = type_name::<T>(), route = %err.route, "{err}");
   std::panic::panic_any(err)
}

/// Rejects deserialization of singleton `T` with a `serde` error.
#[cfg(feature = "serde")]
#[cold]
pub fn reject_deserialize<T: ?Sized, E: serde::de::Error>() -> E {
   let err = DuplicationForbidden::new::<T>(Duplication::Deserialize);
   tracing::error!(singleton = type_name::<T>(), route = %err.route, "{err}");
   E::custom(err)
}

#[doc(hidden)]
#[cfg(feature = "serde")]
#[macro_export]
macro_rules! __forbid_deserialize {
   ($ty:ty) => {
      impl<'de> $crate::__private::serde::Deserialize<'de> for $ty {
         fn deserialize<D>(_deserializer: D) -> ::core::result::Result<Self, D::Error>
         where
            D: $crate::__private::serde::Deserializer<'de>,
         {
            ::core::result::Result::Err($crate::guard::reject_deserialize::<$ty, D::Error>())
         }
      }
   };
}

#[doc(hidden)]
#[cfg(not(feature = "serde"))]
#[macro_export]
macro_rules! __forbid_deserialize {
   ($ty:ty) => {};
}

/// Makes every duplication route of a singleton type fail loudly.
///
/// Implements `Clone` so that cloning panics with [`DuplicationForbidden`],
/// and with the `serde` feature implements `Deserialize` so that rebuilding
/// an instance from serialized state returns a
/// [`DuplicationForbidden`]-carrying error.
///
/// ```rust,should_panic
/// use std::convert::Infallible;
/// use poly_singleton::{forbid_duplication, slot, ConstructToken, Instance, Singleton, Slot};
///
/// pub struct Pool;
///
/// impl Singleton for Pool {
///    type Error = Infallible;
///    fn slot() -> &'static Slot<Self> {
///       slot!(Pool)
///    }
///    fn construct(_: ConstructToken) -> Result<Self, Infallible> {
///       Ok(Pool)
///    }
/// }
///
/// forbid_duplication!(Pool);
///
/// let _second = Pool::instance().unwrap().clone();
/// ```
#[macro_export]
macro_rules! forbid_duplication {
   ($ty:ty) => {
      impl ::core::clone::Clone for $ty {
         fn clone(&self) -> Self {
            $crate::guard::reject_clone::<$ty>()
         }
      }

      $crate::__forbid_deserialize!($ty);
   };
}
