use crate::peer::{Peer, Role};

use codec::packet::{Packet, Payload};
use service::Observer;

/// Type 5: the liveness protocol.
///
/// The route lives in the packet itself: a Hello collects addresses on
/// the way up, the root reverses the list once, and the Hello Back is
/// peeled hop by hop on the way down. No intermediate routing state.
pub async fn process<T>(peer: &Peer<T>, packet: &Packet)
where
    T: Observer,
{
    let payload = match packet.payload() {
        Ok(payload) => payload,
        Err(e) => {
            log::warn!("bad reunion body: addr={}, err={e}", packet.source);
            return;
        }
    };

    match payload {
        Payload::Hello(mut path) => {
            let Some(origin) = path.first().copied() else {
                log::warn!("reunion hello with empty path: addr={}", packet.source);
                return;
            };

            match &peer.role {
                Role::Root { topology } => {
                    if let Err(e) = topology.record_hello(origin) {
                        log::warn!("hello from unknown origin: addr={origin}, err={e}");
                        return;
                    }

                    // After the reversal the head of the list is our own
                    // direct child, the first hop back towards the origin.
                    path.reverse();
                    match Packet::hello_back(peer.address, &path) {
                        Ok(reply) => {
                            peer.stream.enqueue(path[0], reply.encode(), false).await;
                        }
                        Err(e) => log::warn!("hello back not encodable: err={e}"),
                    }
                }
                Role::Client(state) => {
                    let Some(parent) = *state.parent.lock() else {
                        log::warn!("relaying hello without a parent: origin={origin}");
                        return;
                    };

                    path.push(peer.address);
                    match Packet::hello(peer.address, &path) {
                        Ok(forwarded) => {
                            peer.stream.enqueue(parent, forwarded.encode(), false).await;
                        }
                        Err(e) => log::warn!("hello path overflow: origin={origin}, err={e}"),
                    }
                }
            }
        }
        Payload::HelloBack(path) => {
            if path.first() != Some(&peer.address) {
                log::warn!(
                    "hello back head is not us: addr={}, head={:?}",
                    packet.source,
                    path.first()
                );
                return;
            }

            if path.len() == 1 {
                // The round came home.
                match &peer.role {
                    Role::Client(state) => {
                        state.reunion.lock().accept();
                        peer.observer.on_reunion_accepted();
                    }
                    Role::Root { .. } => {
                        log::warn!("root terminated a hello back: addr={}", packet.source);
                    }
                }
                return;
            }

            match Packet::hello_back(peer.address, &path[1..]) {
                Ok(forwarded) => {
                    peer.stream.enqueue(path[1], forwarded.encode(), false).await;
                }
                Err(e) => log::warn!("hello back not encodable: err={e}"),
            }
        }
        _ => log::warn!(
            "unexpected reunion packet: addr={}, body={:?}",
            packet.source,
            packet.body
        ),
    }
}
