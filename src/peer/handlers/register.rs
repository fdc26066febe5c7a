use crate::peer::{Peer, Role};

use codec::packet::{Packet, Payload};
use service::Observer;

/// Type 1: registration with the root.
///
/// The request body carries the client's *listener* address, and that is
/// where the register link goes: the socket the request arrived on has an
/// ephemeral source port and cannot be dialled back.
pub async fn process<T>(peer: &Peer<T>, packet: &Packet)
where
    T: Observer,
{
    let payload = match packet.payload() {
        Ok(payload) => payload,
        Err(e) => {
            log::warn!("bad register body: addr={}, err={e}", packet.source);
            return;
        }
    };

    match (&peer.role, payload) {
        (Role::Root { .. }, Payload::RegisterRequest(listener)) => {
            if peer.stream.contains(listener, true).await {
                log::info!("already registered node wants to register again: addr={listener}");
                return;
            }

            if !peer.stream.add_node(listener, true).await {
                return;
            }

            let ack = Packet::register_ack(peer.address);
            peer.stream.enqueue(listener, ack.encode(), true).await;
            peer.observer.on_registered(listener);

            log::info!("register request accepted: addr={listener}");
        }
        (Role::Client(_), Payload::RegisterAck) => {
            log::info!("registration confirmed: root={}", packet.source);
        }
        _ => log::warn!(
            "unexpected register packet: addr={}, body={:?}",
            packet.source,
            packet.body
        ),
    }
}
