//! ## Canopy topology service
//!
//! Root-side state for the overlay: the live tree of known peers and the
//! per-client Hello ledger, plus the [`Observer`] trait through which the
//! embedding peer hears about protocol events.

pub mod graph;
pub mod ledger;

use self::{
    graph::NetworkGraph,
    ledger::{HELLO_TIMEOUT, HelloLedger},
};

use std::time::Duration;

use codec::address::Address;
use parking_lot::Mutex;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    UnknownNode(Address),
    AlreadyAttached(Address),
    RootImmortal,
    NoNeighbour,
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Protocol events, reported by the peer as they happen.
///
/// All callbacks default to no-ops; implementations pick the ones they
/// care about. The server installs a logging implementation, tests
/// install recording ones.
pub trait Observer: Send + Sync {
    /// A new client completed registration at the root.
    #[allow(unused_variables)]
    fn on_registered(&self, address: Address) {}

    /// The root placed a first-time client under `parent`.
    #[allow(unused_variables)]
    fn on_attached(&self, address: Address, parent: Address) {}

    /// The root revived a known subtree and hung it under `parent`.
    #[allow(unused_variables)]
    fn on_reattached(&self, address: Address, parent: Address) {}

    /// A Join added `address` as a tree neighbour.
    #[allow(unused_variables)]
    fn on_joined(&self, address: Address) {}

    /// A broadcast message was accepted from a tree neighbour.
    #[allow(unused_variables)]
    fn on_delivered(&self, source: Address, text: &str) {}

    /// The root swept a silent client out of the live tree.
    #[allow(unused_variables)]
    fn on_evicted(&self, address: Address) {}

    /// This client was told who its parent is.
    #[allow(unused_variables)]
    fn on_adopted(&self, parent: Address) {}

    /// A Reunion round came back; the client is in good standing.
    fn on_reunion_accepted(&self) {}

    /// A Reunion round timed out; the client is re-Advertising.
    fn on_reunion_failed(&self) {}
}

/// What [`Topology::assign`] did with the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Attached(Address),
    Reattached(Address),
}

impl Placement {
    pub fn parent(&self) -> Address {
        match self {
            Placement::Attached(parent) | Placement::Reattached(parent) => *parent,
        }
    }
}

/// The root's control-plane state: graph + ledger behind their own locks.
/// Mutations come only from the peer main loop and the Reunion daemon.
pub struct Topology {
    graph: Mutex<NetworkGraph>,
    ledger: Mutex<HelloLedger>,
}

impl Topology {
    pub fn new(root: Address) -> Self {
        Self {
            graph: Mutex::new(NetworkGraph::new(root)),
            ledger: Mutex::new(HelloLedger::new()),
        }
    }

    /// Handles one Advertise request: picks the shallowest live parent
    /// with a free slot, then attaches the sender (or revives and
    /// reparents its old subtree) and seeds its Hello ledger entry.
    pub fn assign(&self, sender: Address) -> Result<Placement, Error> {
        let mut graph = self.graph.lock();
        let neighbour = graph.find_live_node(sender).ok_or(Error::NoNeighbour)?;

        let placement = if graph.contains(sender) {
            graph.reattach(sender, neighbour)?;
            Placement::Reattached(neighbour)
        } else {
            graph.attach(sender, neighbour)?;
            Placement::Attached(neighbour)
        };

        self.ledger.lock().record(sender);
        Ok(placement)
    }

    /// Handles one Reunion Hello at the root: refresh the origin's ledger
    /// entry and make sure its own node is marked alive.
    pub fn record_hello(&self, origin: Address) -> Result<(), Error> {
        self.graph.lock().turn_on(origin, false)?;
        self.ledger.lock().record(origin);
        Ok(())
    }

    /// One daemon pass: evict every client silent past the Hello timeout.
    /// Evicted subtrees go dark but stay known for re-Advertise.
    pub fn sweep(&self) -> Vec<Address> {
        self.sweep_with(HELLO_TIMEOUT)
    }

    pub fn sweep_with(&self, timeout: Duration) -> Vec<Address> {
        let expired = self.ledger.lock().expired(timeout);

        if !expired.is_empty() {
            let mut graph = self.graph.lock();
            for address in &expired {
                // The ledger can only hold non-root clients, so removal
                // failures mean a node the graph never saw; skip them.
                let _ = graph.remove(*address);
            }
        }

        expired
    }

    pub fn contains(&self, address: Address) -> bool {
        self.graph.lock().contains(address)
    }

    pub fn depth(&self, address: Address) -> Option<u64> {
        self.graph.lock().depth(address)
    }

    pub fn parent_of(&self, address: Address) -> Option<Address> {
        self.graph.lock().parent_address(address)
    }

    pub fn children_of(&self, address: Address) -> Option<Vec<Address>> {
        self.graph.lock().children_of(address)
    }

    pub fn tracked_clients(&self) -> usize {
        self.ledger.lock().len()
    }
}
