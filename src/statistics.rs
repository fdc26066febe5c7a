use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use ahash::AHashMap;
use codec::address::Address;
use parking_lot::RwLock;

/// The type of information passed in the statistics channel.
#[derive(Debug, Clone, Copy)]
pub enum Stats {
    ReceivedBytes(usize),
    SendBytes(usize),
    ReceivedPkts(usize),
    SendPkts(usize),
    DroppedPkts(usize),
}

#[derive(Default)]
pub struct Count(AtomicUsize);

impl Count {
    fn add(&self, value: usize) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-link traffic counters.
#[derive(Default)]
pub struct Counts {
    pub received_bytes: Count,
    pub send_bytes: Count,
    pub received_pkts: Count,
    pub send_pkts: Count,
    pub dropped_pkts: Count,
}

impl Counts {
    fn add(&self, payload: &Stats) {
        match payload {
            Stats::ReceivedBytes(v) => self.received_bytes.add(*v),
            Stats::ReceivedPkts(v) => self.received_pkts.add(*v),
            Stats::SendBytes(v) => self.send_bytes.add(*v),
            Stats::SendPkts(v) => self.send_pkts.add(*v),
            Stats::DroppedPkts(v) => self.dropped_pkts.add(*v),
        }
    }
}

/// A plain-number snapshot of one link's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub received_bytes: usize,
    pub send_bytes: usize,
    pub received_pkts: usize,
    pub send_pkts: usize,
    pub dropped_pkts: usize,
}

/// Traffic statistics for every known peer link.
///
/// Cheap to clone; the reporter side only touches atomics, so transport
/// tasks can report without taking the table's write lock.
#[derive(Clone)]
pub struct Statistics(Arc<RwLock<AHashMap<Address, Counts>>>);

impl Default for Statistics {
    fn default() -> Self {
        Self(Arc::new(RwLock::new(AHashMap::with_capacity(64))))
    }
}

impl Statistics {
    pub fn get_reporter(&self) -> Reporter {
        Reporter(self.0.clone())
    }

    /// Add an address to the watch list.
    pub fn register(&self, address: Address) {
        self.0.write().entry(address).or_default();
    }

    /// Remove an address from the watch list.
    pub fn unregister(&self, address: &Address) {
        self.0.write().remove(address);
    }

    pub fn get(&self, address: &Address) -> Option<Snapshot> {
        self.0.read().get(address).map(Self::snapshot)
    }

    /// Sum of all per-link counters, for the periodic report line.
    pub fn totals(&self) -> Snapshot {
        let table = self.0.read();
        let mut totals = Snapshot::default();

        for counts in table.values() {
            totals.received_bytes += counts.received_bytes.get();
            totals.send_bytes += counts.send_bytes.get();
            totals.received_pkts += counts.received_pkts.get();
            totals.send_pkts += counts.send_pkts.get();
            totals.dropped_pkts += counts.dropped_pkts.get();
        }

        totals
    }

    fn snapshot(counts: &Counts) -> Snapshot {
        Snapshot {
            received_bytes: counts.received_bytes.get(),
            send_bytes: counts.send_bytes.get(),
            received_pkts: counts.received_pkts.get(),
            send_pkts: counts.send_pkts.get(),
            dropped_pkts: counts.dropped_pkts.get(),
        }
    }
}

/// Held by transport and dispatch tasks; reports land in the shared
/// table, unknown addresses are ignored.
#[derive(Clone)]
pub struct Reporter(Arc<RwLock<AHashMap<Address, Counts>>>);

impl Reporter {
    pub fn send(&self, address: &Address, reports: &[Stats]) {
        if let Some(counts) = self.0.read().get(address) {
            for report in reports {
                counts.add(report);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_only_touch_registered_links() {
        let statistics = Statistics::default();
        let reporter = statistics.get_reporter();
        let address: Address = "127.0.0.1:31315".parse().unwrap();

        reporter.send(&address, &[Stats::ReceivedPkts(1)]);
        assert_eq!(statistics.get(&address), None);

        statistics.register(address);
        reporter.send(&address, &[Stats::ReceivedPkts(1), Stats::ReceivedBytes(32)]);

        let snapshot = statistics.get(&address).unwrap();
        assert_eq!(snapshot.received_pkts, 1);
        assert_eq!(snapshot.received_bytes, 32);
        assert_eq!(statistics.totals().received_pkts, 1);

        statistics.unregister(&address);
        assert_eq!(statistics.get(&address), None);
    }
}
