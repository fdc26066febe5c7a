use crate::{
    server::link::Link,
    statistics::{Reporter, Statistics},
};

use std::mem;

use ahash::AHashMap;
use bytes::Bytes;
use codec::address::Address;
use tokio::sync::Mutex;

type Table = AHashMap<Address, Link>;

/// The peer's whole link state: the inbound queue fed by the listener,
/// and two outbound tables keyed by canonical address.
///
/// Tree links (`nodes`) carry Join, Message and Reunion traffic between
/// parent and child. Register links (`register_nodes`) are the control
/// channel to/from the root; keeping them in their own table lets a
/// client in Reunion-failure mode flush its lifeline to the root without
/// touching tree traffic that cannot get through anyway.
pub struct Stream {
    in_buf: parking_lot::Mutex<Vec<Bytes>>,
    nodes: Mutex<Table>,
    register_nodes: Mutex<Table>,
    statistics: Statistics,
    reporter: Reporter,
}

impl Stream {
    pub fn new(statistics: Statistics) -> Self {
        Self {
            in_buf: parking_lot::Mutex::new(Vec::new()),
            nodes: Mutex::new(Table::default()),
            register_nodes: Mutex::new(Table::default()),
            reporter: statistics.get_reporter(),
            statistics,
        }
    }

    /// Called by inbound connection tasks for every framed packet.
    pub fn push_inbound(&self, bytes: Bytes) {
        self.in_buf.lock().push(bytes);
    }

    /// Returns and clears the inbound queue, preserving arrival order.
    pub fn drain_in_buf(&self) -> Vec<Bytes> {
        mem::take(&mut *self.in_buf.lock())
    }

    /// Opens a link to `address` and stores it in the matching table.
    /// Adding an address that is already linked is a no-op. A connect
    /// failure is the caller's warning to log; the table stays unchanged.
    pub async fn add_node(&self, address: Address, is_register: bool) -> bool {
        let mut table = self.table(is_register).lock().await;
        if table.contains_key(&address) {
            return true;
        }

        match Link::connect(address, is_register).await {
            Ok(link) => {
                self.statistics.register(address);
                table.insert(address, link);
                true
            }
            Err(e) => {
                log::warn!(
                    "link connect failed: addr={address}, register={is_register}, err={e}"
                );
                false
            }
        }
    }

    pub async fn contains(&self, address: Address, is_register: bool) -> bool {
        self.table(is_register).lock().await.contains_key(&address)
    }

    /// Queues `bytes` on the link to `address`; unknown addresses are a
    /// warning, not an error.
    pub async fn enqueue(&self, address: Address, bytes: Bytes, is_register: bool) {
        match self.table(is_register).lock().await.get_mut(&address) {
            Some(link) => link.enqueue(bytes),
            None => log::warn!(
                "enqueue to unknown link: addr={address}, register={is_register}"
            ),
        }
    }

    /// Queues `bytes` on every tree link except `except`. Register links
    /// never carry broadcast traffic.
    pub async fn broadcast(&self, bytes: Bytes, except: Option<Address>) {
        for (address, link) in self.nodes.lock().await.iter_mut() {
            if Some(*address) != except {
                link.enqueue(bytes.clone());
            }
        }
    }

    /// Flushes the register table, and the tree table too unless
    /// `only_register`. A link whose flush fails is evicted together with
    /// anything still queued on it.
    pub async fn flush_all(&self, only_register: bool) {
        self.flush_table(&self.register_nodes).await;

        if !only_register {
            self.flush_table(&self.nodes).await;
        }
    }

    async fn flush_table(&self, table: &Mutex<Table>) {
        let mut dead = Vec::new();

        {
            let mut table = table.lock().await;
            for (address, link) in table.iter_mut() {
                if let Err(e) = link.flush(&self.reporter).await {
                    log::warn!("link flush failed, evicting: addr={address}, err={e}");
                    dead.push(*address);
                }
            }

            for address in &dead {
                table.remove(address);
            }
        }

        for address in dead {
            self.statistics.unregister(&address);
        }
    }

    fn table(&self, is_register: bool) -> &Mutex<Table> {
        if is_register {
            &self.register_nodes
        } else {
            &self.nodes
        }
    }
}
