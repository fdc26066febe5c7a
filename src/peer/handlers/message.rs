use crate::{peer::Peer, statistics::Stats};

use codec::packet::{Packet, Payload};
use service::Observer;

/// Type 4: application broadcast.
///
/// Accepted only from a tree neighbour, then re-minted with our own
/// source address and forwarded to every other tree neighbour. The
/// acyclic tree is what keeps this loop-free; there is no de-dup.
pub async fn process<T>(peer: &Peer<T>, packet: &Packet)
where
    T: Observer,
{
    let text = match packet.payload() {
        Ok(Payload::Message(text)) => text,
        _ => return,
    };

    let source = packet.source;
    if !peer.stream.contains(source, false).await {
        log::warn!("message from unknown source: addr={source}");
        peer.reporter.send(&source, &[Stats::DroppedPkts(1)]);
        return;
    }

    peer.observer.on_delivered(source, &text);

    let forwarded = Packet::message(peer.address, &text);
    peer.stream.broadcast(forwarded.encode(), Some(source)).await;
}
