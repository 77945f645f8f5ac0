use std::convert::Infallible;
use std::panic;

use poly_singleton::{
   forbid_duplication, slot, ConstructToken, DuplicationForbidden, Instance, Singleton, Slot,
};

struct Registry {
   entries: usize,
}

impl Singleton for Registry {
   type Error = Infallible;

   fn slot() -> &'static Slot<Self> {
      slot!(Registry)
   }

   fn construct(_: ConstructToken) -> Result<Self, Infallible> {
      Ok(Registry { entries: 3 })
   }
}

forbid_duplication!(Registry);

fn main() {
   silence_panic_output();

   let registry = Registry::instance().unwrap();

   let cloned = panic::catch_unwind(|| registry.clone());
   if let Err(payload) = cloned {
      if let Some(err) = payload.downcast_ref::<DuplicationForbidden>() {
         println!("Clone refused: {err}");
      }
   }

   match serde_json::from_str::<Registry>("{\"entries\": 9}") {
      Ok(_) => unreachable!("deserialization must be refused"),
      Err(e) => println!("Deserialize refused: {e}"),
   }

   assert!(std::ptr::eq(registry, Registry::instance().unwrap()));
   println!("Still {} entries in the one registry", registry.entries);
}

/// Keeps the default panic hook from printing the expected clone panic.
fn silence_panic_output() {
   panic::set_hook(Box::new(|_| {}));
}
