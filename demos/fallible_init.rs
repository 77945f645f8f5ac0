use std::sync::atomic::{AtomicBool, Ordering};

use poly_singleton::{slot, ConstructToken, Instance, Singleton, Slot};

static FAIL: AtomicBool = AtomicBool::new(true);

struct Credentials {
   token: String,
}

impl Singleton for Credentials {
   type Error = &'static str;

   fn slot() -> &'static Slot<Self> {
      slot!(Credentials)
   }

   fn construct(_: ConstructToken) -> Result<Self, &'static str> {
      let fail = FAIL.load(Ordering::Relaxed);
      println!("Attempting construction (fail={fail})...");
      if fail {
         Err("credential store unreachable")
      } else {
         Ok(Credentials {
            token: "s3cr3t".to_string(),
         })
      }
   }
}

fn main() {
   // First attempt fails and leaves the slot empty
   match Credentials::instance() {
      Ok(_) => panic!("Should have failed"),
      Err(e) => println!("Caught error: {e}"),
   }
   assert!(!Credentials::is_constructed());

   // Second attempt succeeds
   FAIL.store(false, Ordering::Relaxed);
   let creds = Credentials::instance().expect("Should have succeeded");
   println!("Got token of length {}", creds.token.len());

   // Later calls return the stored instance even if construction would fail again
   FAIL.store(true, Ordering::Relaxed);
   assert!(std::ptr::eq(creds, Credentials::instance().unwrap()));
}
