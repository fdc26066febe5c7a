use crate::peer::Peer;

use codec::packet::{Packet, Payload};
use service::Observer;

/// Type 3: the sender wants a tree edge to us. No reply; the edge is the
/// answer.
pub async fn process<T>(peer: &Peer<T>, packet: &Packet)
where
    T: Observer,
{
    match packet.payload() {
        Ok(Payload::Join) => {}
        _ => {
            log::warn!("bad join body: addr={}, body={:?}", packet.source, packet.body);
            return;
        }
    }

    let source = packet.source;
    if peer.stream.contains(source, false).await {
        log::info!("already joined peer wants to join again: addr={source}");
        return;
    }

    if peer.stream.add_node(source, false).await {
        peer.observer.on_joined(source);
        log::info!("join received: addr={source}");
    }
}
