use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};

use poly_singleton::{slot, ConstructToken, Instance, Singleton, Slot};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

struct Settings {
   name: String,
}

impl Singleton for Settings {
   type Error = Infallible;

   fn slot() -> &'static Slot<Self> {
      slot!(Settings)
   }

   fn construct(_: ConstructToken) -> Result<Self, Infallible> {
      // Runs only once
      COUNTER.fetch_add(1, Ordering::Relaxed);
      println!("Constructing settings...");
      std::thread::sleep(std::time::Duration::from_millis(50));
      Ok(Settings {
         name: "production".to_string(),
      })
   }
}

fn main() {
   let threads: Vec<_> = (0..5)
      .map(|_| {
         std::thread::spawn(|| {
            let settings = Settings::instance().unwrap();
            println!("Thread access: {} at {:p}", settings.name, settings);
         })
      })
      .collect();

   for t in threads {
      t.join().unwrap();
   }

   assert_eq!(COUNTER.load(Ordering::Relaxed), 1);
   println!("Final settings: {}", Settings::instance().unwrap().name);
}
