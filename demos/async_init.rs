use std::sync::atomic::{AtomicUsize, Ordering};

use poly_singleton::{slot, AsyncInstance, AsyncSingleton, ConstructToken, Slot};
use tokio::time::{sleep, Duration};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

struct Connection {
   endpoint: &'static str,
}

impl AsyncSingleton for Connection {
   type Error = std::io::Error;

   fn slot() -> &'static Slot<Self> {
      slot!(Connection)
   }

   async fn construct(_: ConstructToken) -> Result<Self, std::io::Error> {
      COUNTER.fetch_add(1, Ordering::Relaxed);
      println!("Connecting...");
      sleep(Duration::from_millis(50)).await;
      Ok(Connection {
         endpoint: "db.internal:5432",
      })
   }
}

#[tokio::main]
async fn main() {
   let tasks: Vec<_> = (0..5)
      .map(|_| {
         tokio::spawn(async {
            let conn = Connection::instance_async().await.unwrap();
            println!("Task access: {}", conn.endpoint);
         })
      })
      .collect();

   for t in tasks {
      t.await.unwrap();
   }

   assert_eq!(COUNTER.load(Ordering::Relaxed), 1);
}
