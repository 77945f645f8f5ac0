//! Errors raised when code tries to make a second instance of a singleton.

use core::any::type_name;
use core::fmt;

use thiserror::Error;

/// The route by which a duplicate instance was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Duplication {
   /// `Clone::clone` on the shared instance.
   Clone,
   /// Rebuilding an instance from serialized state.
   Deserialize,
}

impl fmt::Display for Duplication {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(match self {
         Self::Clone => "cloning",
         Self::Deserialize => "deserialization",
      })
   }
}

/// A second, independent instance of a singleton type was requested.
///
/// This is a programming error. It is raised as a panic payload from
/// `Clone::clone` and as a `serde` error from `Deserialize`, and is never
/// meant to be handled and retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("singleton `{type_name}` cannot be duplicated by {route}")]
pub struct DuplicationForbidden {
   /// Fully qualified name of the singleton type.
   pub type_name: &'static str,
   /// How the duplicate was requested.
   pub route: Duplication,
}

impl DuplicationForbidden {
   /// Builds the error for singleton type `T`.
   #[inline]
   #[must_use]
   pub fn new<T: ?Sized>(route: Duplication) -> Self {
      Self {
         type_name: type_name::<T>(),
         route,
      }
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   struct Registry;

   #[test]
   fn message_names_type_and_route() {
      let err = DuplicationForbidden::new::<Registry>(Duplication::Deserialize);
      assert_eq!(err.route, Duplication::Deserialize);
      assert!(err.type_name.ends_with("Registry"));
      assert_eq!(
         err.to_string(),
         format!("singleton `{}` cannot be duplicated by deserialization", err.type_name)
      );
   }
}
