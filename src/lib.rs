pub mod config;
pub mod observer;
pub mod peer;
pub mod server;
pub mod statistics;

use self::{
    config::Config,
    observer::Observer,
    peer::{Peer, PeerOptions, commands::Command},
    statistics::Statistics,
};

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

#[rustfmt::skip]
static SOFTWARE: &str = concat!(
    "canopy-server.",
    env!("CARGO_PKG_VERSION")
);

/// Boots a peer from its configuration and runs it forever.
///
/// Opened up as a library function so integration tests can start peers
/// in-process instead of going through the binary.
pub async fn startup(
    config: Arc<Config>,
    commands: UnboundedReceiver<Command>,
) -> anyhow::Result<()> {
    let statistics = Statistics::default();
    let peer = Peer::new(
        PeerOptions {
            listen: config.overlay.listen,
            external: config.overlay.external,
            root: config.overlay.root,
        },
        commands,
        Observer::new(statistics.clone()),
        statistics,
    )
    .await?;

    log::info!(
        "{} started: addr={}, root={}",
        SOFTWARE,
        peer.address(),
        peer.is_root()
    );

    peer.run().await;
    Ok(())
}
