use super::{ClientState, Peer, Phase, Role};

use std::{sync::Arc, time::Duration};

use codec::{address::Address, packet::Packet};
use service::Observer;

/// Cadence of the Reunion daemon.
pub const REUNION_INTERVAL: Duration = Duration::from_secs(4);

/// How long a client waits on an in-flight Hello round before declaring
/// it failed. A round crosses up to eight hops in each direction and
/// every hop can sit out a full dispatch tick at the relaying peer, plus
/// one daemon interval of slack on top.
pub const ROUND_BUDGET: Duration = Duration::from_secs(44);

/// Starts the Reunion daemon for this peer. Spawned at boot for the
/// root; a client waits for its first Advertise response.
pub fn spawn<T>(peer: &Arc<Peer<T>>)
where
    T: Observer + 'static,
{
    let peer = peer.clone();

    tokio::spawn(async move {
        loop {
            match &peer.role {
                Role::Root { topology } => {
                    for address in topology.sweep() {
                        log::warn!("reunion timeout, client evicted: addr={address}");
                        peer.observer.on_evicted(address);
                    }
                }
                Role::Client(state) => client_tick(&peer, state).await,
            }

            tokio::time::sleep(REUNION_INTERVAL).await;
        }
    });
}

enum Action {
    Hello(Address),
    ReAdvertise { first_failure: bool },
    Wait,
}

async fn client_tick<T>(peer: &Peer<T>, state: &ClientState)
where
    T: Observer,
{
    // Decide under the locks, talk to the stream afterwards.
    let action = {
        let mut reunion = state.reunion.lock();
        match reunion.phase {
            Phase::Accept => match *state.parent.lock() {
                Some(parent) => {
                    reunion.begin_round();
                    Action::Hello(parent)
                }
                None => Action::Wait,
            },
            Phase::Pending => {
                if reunion.round_expired(ROUND_BUDGET) {
                    let first_failure = !reunion.failed;
                    reunion.fail();
                    Action::ReAdvertise { first_failure }
                } else {
                    Action::Wait
                }
            }
        }
    };

    match action {
        Action::Hello(parent) => {
            // A fresh path only ever holds ourselves, so this cannot
            // overflow the two-digit hop count.
            if let Ok(packet) = Packet::hello(peer.address, &[peer.address]) {
                peer.stream.enqueue(parent, packet.encode(), false).await;
            }
        }
        Action::ReAdvertise { first_failure } => {
            if first_failure {
                log::warn!("reunion round failed: last parent={:?}", *state.parent.lock());
                peer.observer.on_reunion_failed();
            }

            // The main loop is in recovery mode now and only flushes the
            // register lifeline, which is exactly where this goes.
            let packet = Packet::advertise_request(peer.address);
            peer.stream
                .enqueue(state.root_address, packet.encode(), true)
                .await;
        }
        Action::Wait => {}
    }
}
