//! Internal synchronization state for singleton slots.
//!
//! A slot moves from *empty* to *populated* exactly once. The transient
//! *constructing* state is owned by a single [`ConstructGuard`]; dropping the
//! guard without committing (constructor error or panic) puts the slot back
//! to empty so another caller can retry.
//!
//! The state is packed into a single `AtomicU8`:
//! - Bit 0: POPULATED - Slot holds its instance (terminal)
//! - Bit 1: CONSTRUCTING - A constructor currently owns the slot
//! - Bit 2: WAITING - At least one thread is parked on the slot
//!
//! Waiters park on the address of the state word via `parking_lot_core`.

use core::mem;
use core::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use parking_lot_core::{DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN};

/// Returns an identifier unique to the calling thread for as long as it lives.
///
/// Never zero, so zero can stand for "no owner".
#[inline]
fn thread_token() -> usize {
   thread_local! {
      static TOKEN: u8 = const { 0 };
   }
   TOKEN.with(|t| t as *const u8 as usize)
}

/// Atomic state of a [`Slot`](crate::Slot).
pub(crate) struct SlotState {
   bits: AtomicU8,
   /// Thread token of a blocking constructor, zero otherwise.
   owner: AtomicUsize,
}

impl SlotState {
   const POPULATED: u8 = 1;
   const CONSTRUCTING: u8 = 2;
   const WAITING: u8 = 4;

   /// Creates the state of an empty slot.
   #[inline]
   pub(crate) const fn new() -> Self {
      Self {
         bits: AtomicU8::new(0),
         owner: AtomicUsize::new(0),
      }
   }

   /// Park/unpark key: the address of the state word.
   #[inline]
   fn key(&self) -> usize {
      self.bits.as_ptr() as usize
   }

   #[inline]
   fn notify_all(&self) {
      // SAFETY: Parking and unparking both key on the address of `bits`.
      unsafe {
         parking_lot_core::unpark_all(self.key(), DEFAULT_UNPARK_TOKEN);
      }
   }

   /// Parks the calling thread until the state word differs from `observed`.
   #[inline]
   fn wait(&self, observed: u8) {
      // SAFETY: See `notify_all`.
      unsafe {
         // park() runs the validate closure under the bucket lock before sleeping,
         // so a `finish`/`abandon` racing with us either changes the word first
         // (we don't sleep) or unparks after we are queued (we wake up).
         let _ = parking_lot_core::park(
            self.key(),
            || self.bits.load(Ordering::Acquire) == observed, // Still the same state?
            || {},                                            // Before sleep callback
            |_, _| {},                                        // No timeouts
            DEFAULT_PARK_TOKEN,
            None,
         );
         // Wakeups may be spurious; every caller re-checks the state in a loop.
      }
   }

   /// Whether the slot holds its instance.
   #[inline]
   pub(crate) fn is_populated(&self, ordering: Ordering) -> bool {
      self.bits.load(ordering) & Self::POPULATED != 0
   }

   /// Whether the calling thread is the one currently running the constructor.
   #[inline]
   pub(crate) fn is_held_by_current_thread(&self) -> bool {
      self.owner.load(Ordering::Relaxed) == thread_token()
   }

   /// Moves from constructing to populated and wakes waiters.
   fn finish(&self) {
      // Only the owning thread ever compares against its own token, so clearing
      // it needs no ordering with the state word.
      self.owner.store(0, Ordering::Relaxed);
      // Release pairs with the Acquire load in `is_populated`: whoever sees
      // POPULATED also sees the value written into the slot. Swapping in a bare
      // POPULATED clears CONSTRUCTING and WAITING in the same step.
      let prev = self.bits.swap(Self::POPULATED, Ordering::Release);
      debug_assert!(prev & Self::CONSTRUCTING != 0, "finish called without construct guard");
      // WAITING is read from the swapped-out word, not reloaded: any waiter that
      // set it did so before our swap and is either parked or about to fail
      // its park validation.
      if prev & Self::WAITING != 0 {
         self.notify_all();
      }
   }

   /// Moves from constructing back to empty and wakes waiters.
   fn abandon(&self) {
      self.owner.store(0, Ordering::Relaxed);
      // Back to empty. Release orders the failed constructor's side effects
      // before the next constructor's Acquire CAS in `acquire_step`.
      let prev = self.bits.swap(0, Ordering::Release);
      // Waiters must wake so one of them can retry construction.
      if prev & Self::WAITING != 0 {
         self.notify_all();
      }
   }

   /// One attempt at taking the construct right.
   ///
   /// - `Ok(None)`: the slot is already populated.
   /// - `Ok(Some(guard))`: the caller now owns construction.
   /// - `Err(state)`: someone else is constructing; `state` is the word to wait on.
   ///   With `nowait`, the WAITING bit is left untouched.
   fn acquire_step(&self, nowait: bool) -> Result<Option<ConstructGuard<'_>>, u8> {
      loop {
         // Relaxed is enough here: a POPULATED hit is re-read with Acquire by
         // `Slot::get`, and taking the construct right goes through the Acquire CAS.
         let current = self.bits.load(Ordering::Relaxed);
         if current & Self::POPULATED != 0 {
            return Ok(None);
         }

         if current & Self::CONSTRUCTING == 0 {
            // Keep WAITING as-is: waiters parked on an earlier attempt must still
            // be woken when this one finishes.
            match self.bits.compare_exchange_weak(
               current,
               current | Self::CONSTRUCTING,
               Ordering::Acquire, // See everything a previous, abandoned attempt did
               Ordering::Relaxed,
            ) {
               Ok(_) => return Ok(Some(ConstructGuard { state: self })),
               Err(_) => {
                  // Lost a race or spurious failure; re-read the word.
                  std::hint::spin_loop();
                  continue;
               }
            }
         }

         // Someone else is constructing. Announce that we will park so their
         // `finish`/`abandon` knows to unpark.
         if !nowait && current & Self::WAITING == 0 {
            let flagged = current | Self::WAITING;
            match self.bits.compare_exchange_weak(
               current,
               flagged,
               Ordering::Relaxed, // The flag itself publishes no data
               Ordering::Relaxed,
            ) {
               // Park on the word *with* the flag, or we would never sleep.
               Ok(_) => return Err(flagged),
               Err(_) => {
                  // The word moved (maybe to POPULATED); start over.
                  std::hint::spin_loop();
                  continue;
               }
            }
         }

         // Constructing, and either WAITING is already set or the caller won't wait.
         return Err(current);
      }
   }

   /// Takes the construct right, parking while another thread holds it.
   ///
   /// Returns `None` once the slot is populated. The returned guard records the
   /// calling thread as owner so reentrant construction can be detected.
   pub(crate) fn acquire(&self) -> Option<ConstructGuard<'_>> {
      let guard = match self.acquire_step(false) {
         Ok(guard) => guard,
         Err(mut observed) => loop {
            self.wait(observed);
            match self.acquire_step(false) {
               Ok(guard) => break guard,
               Err(state) => observed = state,
            }
         },
      };
      if let Some(guard) = &guard {
         guard.state.owner.store(thread_token(), Ordering::Relaxed);
      }
      guard
   }

   /// Takes the construct right from async code.
   ///
   /// Yields to the runtime while another task constructs. On a multi-threaded
   /// runtime it then falls back to a blocking wait under `block_in_place`;
   /// elsewhere it keeps yielding. No owner is recorded: tasks may migrate
   /// between worker threads while holding the guard.
   #[cfg(any(feature = "async-tokio", feature = "async-tokio-mt"))]
   pub(crate) async fn acquire_async(&self) -> Option<ConstructGuard<'_>> {
      loop {
         for _ in 0..16 {
            match self.acquire_step(false) {
               Ok(guard) => return guard,
               Err(observed) => {
                  // Give the constructing task a chance to run, and retry as
                  // soon as the word changes.
                  for _ in 0..32 {
                     tokio::task::yield_now().await;
                     if self.bits.load(Ordering::Relaxed) != observed {
                        break;
                     }
                  }
               }
            }
         }

         // block_in_place panics on a current-thread runtime, and parking the
         // only worker there would also stall the constructor we wait for.
         #[cfg(feature = "async-tokio-mt")]
         {
            if can_block_in_place() {
               return match self.acquire_step(false) {
                  Ok(guard) => guard,
                  Err(observed) => tokio::task::block_in_place(|| {
                     self.wait(observed);
                     self.acquire_unowned()
                  }),
               };
            }
         }
      }
   }

   /// Blocking acquire that does not record an owner.
   #[cfg(feature = "async-tokio-mt")]
   fn acquire_unowned(&self) -> Option<ConstructGuard<'_>> {
      match self.acquire_step(false) {
         Ok(guard) => guard,
         Err(mut observed) => loop {
            self.wait(observed);
            match self.acquire_step(false) {
               Ok(guard) => break guard,
               Err(state) => observed = state,
            }
         },
      }
   }

   /// Takes the construct right only if nobody holds it and the slot is empty.
   #[inline]
   pub(crate) fn try_acquire(&self) -> Option<ConstructGuard<'_>> {
      self.acquire_step(true).ok().flatten()
   }
}

/// Whether the current task runs on a multi-threaded tokio runtime.
#[cfg(feature = "async-tokio-mt")]
fn can_block_in_place() -> bool {
   use tokio::runtime::{Handle, RuntimeFlavor};

   Handle::try_current().is_ok_and(|handle| handle.runtime_flavor() == RuntimeFlavor::MultiThread)
}

/// Exclusive right to populate a slot.
///
/// [`commit`](Self::commit) marks the slot populated. Dropping the guard
/// instead returns the slot to empty.
pub(crate) struct ConstructGuard<'a> {
   state: &'a SlotState,
}

impl ConstructGuard<'_> {
   /// Marks the slot populated and wakes waiters.
   #[inline]
   pub(crate) fn commit(self) {
      self.state.finish();
      mem::forget(self);
   }
}

impl Drop for ConstructGuard<'_> {
   #[inline]
   fn drop(&mut self) {
      self.state.abandon();
   }
}
