//! Per-type storage cell for a shared instance.
//!
//! A [`Slot<T>`] starts empty and is populated at most once. There is no way
//! to take the value back out or reset the slot: once populated it stays
//! populated for as long as the slot lives, which for a `static` is the whole
//! process.
//!
//! The fast path (already populated) is a single atomic load. The slow path
//! serializes constructors through [`SlotState`] so exactly one constructor
//! runs at a time; a failing constructor leaves the slot empty for the next
//! caller.

use core::any::type_name;
use core::cell::UnsafeCell;
use core::convert::Infallible;
#[cfg(any(feature = "async-tokio", feature = "async-tokio-mt"))]
use core::future::Future;
use core::sync::atomic::Ordering;
use core::{fmt, mem};

use crate::state::SlotState;

/// Storage for the one shared instance of `T`.
///
/// Usually declared as a `static` through [`slot!`](crate::slot) inside a
/// [`Singleton`](crate::Singleton) implementation, but usable on its own as a
/// write-once cell.
pub struct Slot<T> {
   value: UnsafeCell<mem::MaybeUninit<T>>,
   state: SlotState,
}

impl<T> Slot<T> {
   /// Creates an empty slot.
   #[inline]
   #[must_use]
   pub const fn new() -> Self {
      Self {
         value: UnsafeCell::new(mem::MaybeUninit::uninit()),
         state: SlotState::new(),
      }
   }

   /// Whether the slot holds its instance. Never blocks.
   #[inline]
   pub fn is_populated(&self) -> bool {
      self.state.is_populated(Ordering::Acquire)
   }

   /// Returns the instance if the slot is populated.
   ///
   /// Never blocks and never constructs.
   #[inline]
   pub fn get(&self) -> Option<&T> {
      if self.is_populated() {
         // SAFETY: Populated slots hold an initialized value that is never written again.
         Some(unsafe { self.get_unchecked() })
      } else {
         None
      }
   }

   /// Stores `candidate` if the slot is still empty and nobody is constructing.
   ///
   /// On failure the candidate is handed back untouched and the existing
   /// contents (if any) are kept.
   #[inline]
   pub fn try_set(&self, candidate: T) -> Result<&T, T> {
      let Some(guard) = self.state.try_acquire() else {
         return Err(candidate);
      };
      // SAFETY: The guard grants exclusive write access to an empty slot.
      let stored = unsafe { (*self.value.get()).write(candidate) };
      guard.commit(); // Publishes the write (Release) and wakes any waiters
      Ok(stored)
   }

   /// Returns the instance, constructing it with `f` first if the slot is empty.
   ///
   /// Concurrent callers block until the single running constructor finishes.
   ///
   /// # Panics
   ///
   /// If `f` re-enters this slot on the same thread.
   #[inline]
   pub fn get_or_init<F>(&self, f: F) -> &T
   where
      F: FnOnce() -> T,
   {
      match self.get_or_try_init(|| Ok::<T, Infallible>(f())) {
         Ok(value) => value,
         Err(never) => match never {},
      }
   }

   /// Returns the instance, constructing it with fallible `f` first if the slot is empty.
   ///
   /// On `Err` the error is returned unchanged and the slot stays empty, so a
   /// later call runs a constructor again.
   ///
   /// # Panics
   ///
   /// If `f` re-enters this slot on the same thread.
   pub fn get_or_try_init<F, E>(&self, f: F) -> Result<&T, E>
   where
      F: FnOnce() -> Result<T, E>,
   {
      // Fast path: one Acquire load, no locking.
      if let Some(value) = self.get() {
         return Ok(value);
      }
      // Cold path: take the construct right or wait for whoever holds it.
      self.try_initialize(f)?;
      debug_assert!(self.is_populated());
      // SAFETY: try_initialize returned Ok, so the slot is populated.
      Ok(unsafe { self.get_unchecked() })
   }

   /// Async counterpart of [`get_or_init`](Self::get_or_init).
   #[cfg(any(feature = "async-tokio", feature = "async-tokio-mt"))]
   #[inline]
   pub async fn get_or_init_async<F, Fut>(&self, f: F) -> &T
   where
      F: FnOnce() -> Fut,
      Fut: Future<Output = T>,
   {
      let result = self
         .get_or_try_init_async(|| async move { Ok::<T, Infallible>(f().await) })
         .await;
      match result {
         Ok(value) => value,
         Err(never) => match never {},
      }
   }

   /// Async counterpart of [`get_or_try_init`](Self::get_or_try_init).
   ///
   /// Reentrancy is not detected on this path.
   #[cfg(any(feature = "async-tokio", feature = "async-tokio-mt"))]
   pub async fn get_or_try_init_async<F, Fut, E>(&self, f: F) -> Result<&T, E>
   where
      F: FnOnce() -> Fut,
      Fut: Future<Output = Result<T, E>>,
   {
      if let Some(value) = self.get() {
         return Ok(value);
      }
      // Cold path: yields (or blocks in place) until the construct right is ours.
      self.try_initialize_async(f).await?;
      debug_assert!(self.is_populated());
      // SAFETY: try_initialize_async returned Ok, so the slot is populated.
      Ok(unsafe { self.get_unchecked() })
   }

   /// Returns the instance without checking that the slot is populated.
   ///
   /// # Safety
   ///
   /// The slot must be populated.
   #[inline]
   pub unsafe fn get_unchecked(&self) -> &T {
      debug_assert!(self.is_populated(), "get_unchecked called on empty Slot");
      // SAFETY: The caller guarantees the slot is populated.
      unsafe { (*self.value.get()).assume_init_ref() }
   }

   #[cold]
   fn try_initialize<F, E>(&self, f: F) -> Result<(), E>
   where
      F: FnOnce() -> Result<T, E>,
   {
      // We already hold the construct right, so acquiring it again would park
      // this thread on itself forever.
      if self.state.is_held_by_current_thread() {
         tracing::error!(slot = type_name::<T>(), "reentrant construction");
         panic!(
            "reentrant construction of `{}`: the constructor asked for its own instance",
            type_name::<T>()
         );
      }
      let Some(guard) = self.state.acquire() else {
         return Ok(()); // Populated while we waited
      };
      let value = f()?; // On error the guard drops and the slot stays empty
      // SAFETY: The guard grants exclusive write access to an empty slot.
      unsafe { (*self.value.get()).write(value) };
      guard.commit();
      Ok(())
   }

   #[cfg(any(feature = "async-tokio", feature = "async-tokio-mt"))]
   #[cold]
   async fn try_initialize_async<F, Fut, E>(&self, f: F) -> Result<(), E>
   where
      F: FnOnce() -> Fut,
      Fut: Future<Output = Result<T, E>>,
   {
      let Some(guard) = self.state.acquire_async().await else {
         return Ok(());
      };
      let value = f().await?; // On error (or cancellation) the guard drops and the slot stays empty
      // SAFETY: The guard grants exclusive write access to an empty slot.
      unsafe { (*self.value.get()).write(value) };
      guard.commit();
      Ok(())
   }
}

// SAFETY: Shared access hands out `&T` across threads (needs `T: Sync`) and the
// value may be written by one thread and dropped by another (needs `T: Send`).
// Writes are serialized by `SlotState`.
unsafe impl<T: Sync + Send> Sync for Slot<T> {}
// SAFETY: Moving the slot moves the `T` it may hold.
unsafe impl<T: Send> Send for Slot<T> {}

impl<T> Default for Slot<T> {
   #[inline]
   fn default() -> Self {
      Self::new()
   }
}

impl<T: fmt::Debug> fmt::Debug for Slot<T> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      let mut d = f.debug_tuple("Slot");
      match self.get() {
         Some(v) => d.field(v),
         None => d.field(&format_args!("<empty>")),
      };
      d.finish()
   }
}

impl<T> Drop for Slot<T> {
   #[inline]
   fn drop(&mut self) {
      if self.is_populated() {
         // SAFETY: Exclusive access and the value is initialized.
         unsafe { self.value.get_mut().assume_init_drop() };
      }
   }
}
