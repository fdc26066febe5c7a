pub mod commands;
pub mod daemon;
pub mod handlers;

use self::commands::Command;
use crate::{
    server::{self, stream::Stream},
    statistics::{Reporter, Statistics, Stats},
};

use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use codec::{
    address::Address,
    packet::{Kind, Packet},
};
use service::{Observer, Topology};
use tokio::sync::mpsc::UnboundedReceiver;

/// Cadence of the main dispatch loop.
pub const MAIN_LOOP_INTERVAL: Duration = Duration::from_secs(2);

pub struct PeerOptions {
    pub listen: SocketAddr,
    /// Address other peers should use to reach this node; defaults to the
    /// bound listener address.
    pub external: Option<SocketAddr>,
    /// The network root, or `None` to be the root.
    pub root: Option<SocketAddr>,
}

/// Role-specific state. The split is a tagged variant rather than two
/// peer types: the wire handling is shared, only the per-role state and
/// the handler arms differ.
pub enum Role {
    Root { topology: Topology },
    Client(ClientState),
}

pub struct ClientState {
    pub root_address: Address,
    /// `None` until the first Advertise response of the process's life;
    /// the Reunion daemon idles while it is.
    pub parent: parking_lot::Mutex<Option<Address>>,
    pub reunion: parking_lot::Mutex<ReunionState>,
}

impl ClientState {
    fn new(root_address: Address) -> Self {
        Self {
            root_address,
            parent: parking_lot::Mutex::new(None),
            reunion: parking_lot::Mutex::new(ReunionState::new()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Accept,
    Pending,
}

/// The client's two-phase liveness machine: `Accept` means a new Hello
/// may be sent, `Pending` means one is in flight. `failed` flips the
/// whole main loop into recovery mode until an Advertise response lands.
pub struct ReunionState {
    pub phase: Phase,
    pub last_sent: Option<Instant>,
    pub failed: bool,
}

impl ReunionState {
    fn new() -> Self {
        Self {
            phase: Phase::Accept,
            last_sent: None,
            failed: false,
        }
    }

    /// Arms a new round: the daemon just sent a Hello.
    pub fn begin_round(&mut self) {
        self.failed = false;
        self.last_sent = Some(Instant::now());
        self.phase = Phase::Pending;
    }

    /// Whether the in-flight round has outlived `budget`.
    pub fn round_expired(&self, budget: Duration) -> bool {
        self.phase == Phase::Pending
            && self
                .last_sent
                .map(|sent| sent.elapsed() >= budget)
                .unwrap_or(false)
    }

    /// A Hello Back made it home; back to good standing.
    pub fn accept(&mut self) {
        self.phase = Phase::Accept;
        self.failed = false;
    }

    pub fn fail(&mut self) {
        self.failed = true;
    }
}

/// One overlay participant: the listener-facing stream, the role state
/// and the two long-running loops (main dispatch + Reunion daemon).
pub struct Peer<T> {
    pub(crate) address: Address,
    pub(crate) role: Role,
    pub(crate) stream: Arc<Stream>,
    pub(crate) observer: T,
    pub(crate) reporter: Reporter,
    statistics: Statistics,
    commands: tokio::sync::Mutex<UnboundedReceiver<Command>>,
}

impl<T> Peer<T>
where
    T: Observer + 'static,
{
    /// Binds the listener, assembles the peer and starts its Reunion
    /// daemon. The canonical address is derived from the actually bound
    /// socket, so `listen` may use port 0.
    pub async fn new(
        options: PeerOptions,
        commands: UnboundedReceiver<Command>,
        observer: T,
        statistics: Statistics,
    ) -> anyhow::Result<Arc<Self>> {
        let stream = Arc::new(Stream::new(statistics.clone()));
        let bound = server::start(options.listen, &stream).await?;
        let address = Address::from(options.external.unwrap_or(bound));

        let role = match options.root {
            None => Role::Root {
                topology: Topology::new(address),
            },
            Some(root) => Role::Client(ClientState::new(Address::from(root))),
        };

        let this = Arc::new(Self {
            reporter: statistics.get_reporter(),
            commands: tokio::sync::Mutex::new(commands),
            address,
            role,
            stream,
            observer,
            statistics,
        });

        daemon::spawn(&this);
        Ok(this)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn is_root(&self) -> bool {
        matches!(self.role, Role::Root { .. })
    }

    /// The main loop. Never returns; drive it from a spawned task or the
    /// runtime's last future.
    pub async fn run(&self) {
        let mut ticks: u64 = 0;
        loop {
            if self.in_failure_mode() {
                self.failure_tick().await;
            } else {
                self.regular_tick().await;
            }

            ticks += 1;
            if ticks % 30 == 0 {
                log::debug!("traffic totals: {:?}", self.statistics.totals());
            }

            tokio::time::sleep(MAIN_LOOP_INTERVAL).await;
        }
    }

    fn in_failure_mode(&self) -> bool {
        match &self.role {
            Role::Client(state) => state.reunion.lock().failed,
            Role::Root { .. } => false,
        }
    }

    async fn regular_tick(&self) {
        for bytes in self.stream.drain_in_buf() {
            if let Some(packet) = self.decode(&bytes) {
                self.dispatch(&packet).await;
            }
        }

        for command in self.drain_commands().await {
            self.handle_command(command).await;
        }

        self.stream.flush_all(false).await;
    }

    /// Recovery mode: tree traffic cannot reach us anyway, so everything
    /// except an Advertise response is discarded and only the register
    /// lifeline is serviced.
    async fn failure_tick(&self) {
        for bytes in self.stream.drain_in_buf() {
            let Some(packet) = self.decode(&bytes) else {
                continue;
            };

            if packet.is_advertise_response() {
                handlers::advertise::process(self, &packet).await;
            } else {
                self.reporter
                    .send(&packet.source, &[Stats::DroppedPkts(1)]);
            }
        }

        for command in self.drain_commands().await {
            if command == Command::Advertise {
                self.handle_command(command).await;
            }
        }

        self.stream.flush_all(true).await;
    }

    async fn drain_commands(&self) -> Vec<Command> {
        let mut receiver = self.commands.lock().await;
        std::iter::from_fn(|| receiver.try_recv().ok()).collect()
    }

    /// Decodes and validates one inbound buffer; anything malformed is
    /// dropped with a warning.
    fn decode(&self, bytes: &[u8]) -> Option<Packet> {
        let packet = match Packet::decode(bytes) {
            Ok(packet) => packet,
            Err(e) => {
                log::warn!("received packet format was wrong: err={e}");
                return None;
            }
        };

        if !packet.is_well_formed() {
            log::warn!(
                "packet length field is not correct: addr={}, length={}, body={}",
                packet.source,
                packet.length,
                packet.body.len()
            );
            self.reporter
                .send(&packet.source, &[Stats::DroppedPkts(1)]);
            return None;
        }

        self.reporter.send(
            &packet.source,
            &[Stats::ReceivedPkts(1), Stats::ReceivedBytes(bytes.len())],
        );

        Some(packet)
    }

    async fn dispatch(&self, packet: &Packet) {
        match packet.kind {
            Kind::Register => handlers::register::process(self, packet).await,
            Kind::Advertise => handlers::advertise::process(self, packet).await,
            Kind::Join => handlers::join::process(self, packet).await,
            Kind::Message => handlers::message::process(self, packet).await,
            Kind::Reunion => handlers::reunion::process(self, packet).await,
        }
    }

    async fn handle_command(&self, command: Command) {
        let state = match &self.role {
            Role::Client(state) => state,
            Role::Root { .. } => {
                log::warn!("root ignores user commands: command={command:?}");
                return;
            }
        };

        match command {
            Command::Register => {
                if self.stream.add_node(state.root_address, true).await {
                    let packet = Packet::register_request(self.address, self.address);
                    self.stream
                        .enqueue(state.root_address, packet.encode(), true)
                        .await;
                }
            }
            Command::Advertise => {
                let packet = Packet::advertise_request(self.address);
                self.stream
                    .enqueue(state.root_address, packet.encode(), true)
                    .await;
            }
            Command::SendMessage(text) => {
                let packet = Packet::message(self.address, &text);
                self.stream.broadcast(packet.encode(), None).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reunion_phases() {
        let mut state = ReunionState::new();
        assert_eq!(state.phase, Phase::Accept);
        assert!(!state.round_expired(Duration::ZERO));

        state.begin_round();
        assert_eq!(state.phase, Phase::Pending);
        assert!(state.round_expired(Duration::ZERO));
        assert!(!state.round_expired(Duration::from_secs(44)));

        state.fail();
        assert!(state.failed);
        assert_eq!(state.phase, Phase::Pending);

        state.accept();
        assert_eq!(state.phase, Phase::Accept);
        assert!(!state.failed);
    }
}
