use std::time::{Duration, Instant};

use ahash::{HashMap, HashMapExt};
use codec::address::Address;

/// How long the root lets a client go silent before evicting it. Shorter
/// than the client's own round budget so a client behind a dead parent is
/// gone from the tree before it can resurface through a stale link.
pub const HELLO_TIMEOUT: Duration = Duration::from_secs(20);

/// The root's record of the last Hello seen from each client.
///
/// Seeded when the client is advertised so a fresh child is not swept
/// before its first Reunion round completes.
#[derive(Default)]
pub struct HelloLedger {
    last_hello: HashMap<Address, Instant>,
}

impl HelloLedger {
    pub fn new() -> Self {
        Self {
            last_hello: HashMap::with_capacity(64),
        }
    }

    pub fn record(&mut self, address: Address) {
        self.last_hello.insert(address, Instant::now());
    }

    /// Removes and returns every client whose last Hello is older than
    /// `timeout`.
    pub fn expired(&mut self, timeout: Duration) -> Vec<Address> {
        let expired: Vec<Address> = self
            .last_hello
            .iter()
            .filter(|(_, instant)| instant.elapsed() >= timeout)
            .map(|(address, _)| *address)
            .collect();

        for address in &expired {
            self.last_hello.remove(address);
        }

        expired
    }

    pub fn len(&self) -> usize {
        self.last_hello.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_hello.is_empty()
    }
}
