use crate::peer::{Peer, Role};

use codec::packet::{Packet, Payload};
use service::{Error, Observer, Placement};

/// Type 2: parent discovery.
///
/// At the root this is the placement path: pick a neighbour, attach (or
/// revive) the requester, and answer over the register link. At a client
/// the response names its parent and triggers the Join.
pub async fn process<T>(peer: &Peer<T>, packet: &Packet)
where
    T: Observer,
{
    let payload = match packet.payload() {
        Ok(payload) => payload,
        Err(e) => {
            log::warn!("bad advertise body: addr={}, err={e}", packet.source);
            return;
        }
    };

    match (&peer.role, payload) {
        (Role::Root { topology }, Payload::AdvertiseRequest) => {
            let source = packet.source;

            // The root does not leak topology to strangers.
            if !peer.stream.contains(source, true).await {
                log::warn!("advertise request from unregistered node: addr={source}");
                return;
            }

            match topology.assign(source) {
                Ok(placement) => {
                    let response = Packet::advertise_response(peer.address, placement.parent());
                    peer.stream.enqueue(source, response.encode(), true).await;

                    match placement {
                        Placement::Attached(parent) => peer.observer.on_attached(source, parent),
                        Placement::Reattached(parent) => {
                            peer.observer.on_reattached(source, parent)
                        }
                    }
                }
                // No response at all: the requester retries when its
                // Reunion round times out.
                Err(Error::NoNeighbour) => {
                    log::warn!("no neighbour available: addr={source}");
                }
                Err(e) => log::warn!("advertise placement failed: addr={source}, err={e}"),
            }
        }
        (Role::Client(state), Payload::AdvertiseResponse(parent)) => {
            if packet.source != state.root_address {
                log::warn!("advertise response from non-root peer: addr={}", packet.source);
                return;
            }

            // The parent assignment is what wakes the Reunion daemon up
            // on the first response of the process's life.
            *state.parent.lock() = Some(parent);
            state.reunion.lock().accept();
            peer.observer.on_adopted(parent);

            if peer.stream.add_node(parent, false).await {
                let join = Packet::join(peer.address);
                peer.stream.enqueue(parent, join.encode(), false).await;
            }
        }
        _ => log::warn!(
            "unexpected advertise packet: addr={}, body={:?}",
            packet.source,
            packet.body
        ),
    }
}
