use std::convert::Infallible;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;
use std::time::Duration;

use poly_singleton::{
   forbid_duplication, instance, slot, ConstructToken, Duplication, DuplicationForbidden, Instance,
   Singleton, Slot,
};

// Each test gets its own singleton types: statics are shared by the whole test binary.

static CONFIG_BUILDS: AtomicUsize = AtomicUsize::new(0);

pub struct Config {
   loaded: AtomicBool,
}

impl Singleton for Config {
   type Error = Infallible;

   fn slot() -> &'static Slot<Self> {
      slot!(Config)
   }

   fn construct(_: ConstructToken) -> Result<Self, Infallible> {
      CONFIG_BUILDS.fetch_add(1, Ordering::SeqCst);
      Ok(Config {
         loaded: AtomicBool::new(true),
      })
   }
}

forbid_duplication!(Config);

#[test]
fn test_config_constructed_once_and_shared() {
   let first = Config::instance().unwrap();
   let second = Config::instance().unwrap();
   let third = instance::<Config>().unwrap();

   assert_eq!(CONFIG_BUILDS.load(Ordering::SeqCst), 1);
   assert!(first.loaded.load(Ordering::SeqCst));
   assert!(std::ptr::eq(first, second));
   assert!(std::ptr::eq(second, third));
}

static LAZY_BUILDS: AtomicUsize = AtomicUsize::new(0);

struct Lazy;

impl Singleton for Lazy {
   type Error = Infallible;

   fn slot() -> &'static Slot<Self> {
      slot!(Lazy)
   }

   fn construct(_: ConstructToken) -> Result<Self, Infallible> {
      LAZY_BUILDS.fetch_add(1, Ordering::SeqCst);
      Ok(Lazy)
   }
}

#[test]
fn test_construction_is_lazy() {
   assert_eq!(LAZY_BUILDS.load(Ordering::SeqCst), 0);
   assert!(!Lazy::is_constructed());
   assert!(Lazy::try_instance().is_none());
   assert_eq!(LAZY_BUILDS.load(Ordering::SeqCst), 0);

   let built = Lazy::instance().unwrap();
   assert!(Lazy::is_constructed());
   assert!(std::ptr::eq(built, Lazy::try_instance().unwrap()));
   for _ in 0..5 {
      Lazy::instance().unwrap();
   }
   assert_eq!(LAZY_BUILDS.load(Ordering::SeqCst), 1);
}

static CLONED_BUILDS: AtomicUsize = AtomicUsize::new(0);

pub struct Cloned {
   marker: u32,
}

impl Singleton for Cloned {
   type Error = Infallible;

   fn slot() -> &'static Slot<Self> {
      slot!(Cloned)
   }

   fn construct(_: ConstructToken) -> Result<Self, Infallible> {
      CLONED_BUILDS.fetch_add(1, Ordering::SeqCst);
      Ok(Cloned { marker: 7 })
   }
}

forbid_duplication!(Cloned);

#[test]
fn test_clone_raises_duplication_forbidden() {
   let original = Cloned::instance().unwrap();

   let result = panic::catch_unwind(AssertUnwindSafe(|| original.clone()));
   let payload = match result {
      Ok(_) => panic!("cloning a singleton must fail"),
      Err(payload) => payload,
   };
   let err = payload
      .downcast_ref::<DuplicationForbidden>()
      .expect("panic payload should be DuplicationForbidden");
   assert_eq!(err.route, Duplication::Clone);
   assert!(err.type_name.ends_with("Cloned"));

   let after = Cloned::instance().unwrap();
   assert!(std::ptr::eq(original, after));
   assert_eq!(after.marker, 7);
   assert_eq!(CLONED_BUILDS.load(Ordering::SeqCst), 1);
}

static RESTORED_BUILDS: AtomicUsize = AtomicUsize::new(0);

pub struct Restored {
   generation: usize,
}

impl Singleton for Restored {
   type Error = Infallible;

   fn slot() -> &'static Slot<Self> {
      slot!(Restored)
   }

   fn construct(_: ConstructToken) -> Result<Self, Infallible> {
      let generation = RESTORED_BUILDS.fetch_add(1, Ordering::SeqCst);
      Ok(Restored { generation })
   }
}

forbid_duplication!(Restored);

#[test]
fn test_deserialize_raises_duplication_forbidden() {
   let original = Restored::instance().unwrap();

   let err = match serde_json::from_str::<Restored>(r#"{"generation": 3}"#) {
      Ok(_) => panic!("deserializing a singleton must fail"),
      Err(err) => err,
   };
   let expected = DuplicationForbidden::new::<Restored>(Duplication::Deserialize).to_string();
   assert!(err.to_string().contains(&expected), "unexpected error: {err}");

   let after = Restored::instance().unwrap();
   assert!(std::ptr::eq(original, after));
   assert_eq!(after.generation, 0);
   assert_eq!(RESTORED_BUILDS.load(Ordering::SeqCst), 1);
}

static FLAKY_ATTEMPTS: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, PartialEq)]
struct Unavailable(usize);

struct Flaky {
   attempt: usize,
}

impl Singleton for Flaky {
   type Error = Unavailable;

   fn slot() -> &'static Slot<Self> {
      slot!(Flaky)
   }

   fn construct(_: ConstructToken) -> Result<Self, Unavailable> {
      let attempt = FLAKY_ATTEMPTS.fetch_add(1, Ordering::SeqCst);
      if attempt < 2 {
         Err(Unavailable(attempt))
      } else {
         Ok(Flaky { attempt })
      }
   }
}

#[test]
fn test_construct_error_propagates_and_retries() {
   assert_eq!(Flaky::instance().err(), Some(Unavailable(0)));
   assert!(!Flaky::is_constructed());
   assert_eq!(Flaky::instance().err(), Some(Unavailable(1)));
   assert!(!Flaky::is_constructed());

   let built = Flaky::instance().expect("third attempt succeeds");
   assert_eq!(built.attempt, 2);
   assert!(std::ptr::eq(built, Flaky::instance().unwrap()));
   assert_eq!(FLAKY_ATTEMPTS.load(Ordering::SeqCst), 3);
}

struct Left(&'static str);
struct Right(&'static str);

impl Singleton for Left {
   type Error = Infallible;
   fn slot() -> &'static Slot<Self> {
      slot!(Left)
   }
   fn construct(_: ConstructToken) -> Result<Self, Infallible> {
      Ok(Left("left"))
   }
}

impl Singleton for Right {
   type Error = Infallible;
   fn slot() -> &'static Slot<Self> {
      slot!(Right)
   }
   fn construct(_: ConstructToken) -> Result<Self, Infallible> {
      Ok(Right("right"))
   }
}

#[test]
fn test_types_have_independent_slots() {
   assert!(!Right::is_constructed());
   assert_eq!(Left::instance().unwrap().0, "left");
   assert!(Left::is_constructed());
   assert!(!Right::is_constructed());
   assert_eq!(Right::instance().unwrap().0, "right");
   assert_ne!(
      Left::slot() as *const Slot<Left> as usize,
      Right::slot() as *const Slot<Right> as usize
   );
}

static CONTENDED_BUILDS: AtomicUsize = AtomicUsize::new(0);

struct Contended;

impl Singleton for Contended {
   type Error = Infallible;

   fn slot() -> &'static Slot<Self> {
      slot!(Contended)
   }

   fn construct(_: ConstructToken) -> Result<Self, Infallible> {
      CONTENDED_BUILDS.fetch_add(1, Ordering::SeqCst);
      thread::sleep(Duration::from_millis(25));
      Ok(Contended)
   }
}

#[test]
fn test_concurrent_access_constructs_once() {
   const THREADS: usize = 12;
   let barrier = Barrier::new(THREADS);

   let addresses: Vec<usize> = thread::scope(|s| {
      let handles: Vec<_> = (0..THREADS)
         .map(|_| {
            s.spawn(|| {
               barrier.wait();
               Contended::instance().unwrap() as *const Contended as usize
            })
         })
         .collect();
      handles.into_iter().map(|h| h.join().unwrap()).collect()
   });

   assert!(addresses.windows(2).all(|w| w[0] == w[1]));
   assert_eq!(CONTENDED_BUILDS.load(Ordering::SeqCst), 1);
}

struct Recursive;

impl Singleton for Recursive {
   type Error = Infallible;

   fn slot() -> &'static Slot<Self> {
      slot!(Recursive)
   }

   fn construct(_: ConstructToken) -> Result<Self, Infallible> {
      let _ = Recursive::instance()?;
      Ok(Recursive)
   }
}

#[test]
fn test_reentrant_construct_panics_instead_of_deadlocking() {
   let result = panic::catch_unwind(|| {
      let _ = Recursive::instance();
   });
   assert!(result.is_err());
   assert!(!Recursive::is_constructed());
}
