use crate::statistics::Statistics;

use codec::address::Address;

/// The server's one [`service::Observer`] implementation: every protocol
/// event becomes a log line, and evictions clear the client's traffic
/// counters.
#[derive(Clone)]
pub struct Observer {
    statistics: Statistics,
}

impl Observer {
    pub fn new(statistics: Statistics) -> Self {
        Self { statistics }
    }
}

impl service::Observer for Observer {
    fn on_registered(&self, address: Address) {
        log::info!("client registered: addr={address}");
    }

    fn on_attached(&self, address: Address, parent: Address) {
        log::info!("client attached: addr={address}, parent={parent}");
    }

    fn on_reattached(&self, address: Address, parent: Address) {
        log::info!("client subtree revived: addr={address}, parent={parent}");
    }

    fn on_joined(&self, address: Address) {
        log::info!("tree neighbour joined: addr={address}");
    }

    fn on_delivered(&self, source: Address, text: &str) {
        log::info!("broadcast delivered: addr={source}, text={text:?}");
    }

    fn on_evicted(&self, address: Address) {
        self.statistics.unregister(&address);
        log::warn!("client evicted from live tree: addr={address}");
    }

    fn on_adopted(&self, parent: Address) {
        log::info!("parent assigned: parent={parent}");
    }

    fn on_reunion_accepted(&self) {
        log::debug!("reunion round accepted");
    }

    fn on_reunion_failed(&self) {
        log::warn!("reunion round failed, re-advertising through register link");
    }
}
