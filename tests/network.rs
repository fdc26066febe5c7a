use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::Result;
use canopy_server::{
    peer::{Peer, PeerOptions, commands},
    statistics::Statistics,
};
use codec::address::Address;
use service::Observer;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Registered(Address),
    Attached(Address, Address),
    Reattached(Address, Address),
    Joined(Address),
    Delivered(Address, String),
    Evicted(Address),
    Adopted(Address),
    ReunionAccepted,
}

/// Collects every protocol event so the test can watch the overlay form
/// without reaching into peer internals.
#[derive(Default, Clone)]
struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    fn contains(&self, event: &Event) -> bool {
        self.events.lock().unwrap().contains(event)
    }

    fn count(&self, filter: impl Fn(&Event) -> bool) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| filter(event))
            .count()
    }
}

impl Observer for Recorder {
    fn on_registered(&self, address: Address) {
        self.push(Event::Registered(address));
    }

    fn on_attached(&self, address: Address, parent: Address) {
        self.push(Event::Attached(address, parent));
    }

    fn on_reattached(&self, address: Address, parent: Address) {
        self.push(Event::Reattached(address, parent));
    }

    fn on_joined(&self, address: Address) {
        self.push(Event::Joined(address));
    }

    fn on_delivered(&self, source: Address, text: &str) {
        self.push(Event::Delivered(source, text.to_string()));
    }

    fn on_evicted(&self, address: Address) {
        self.push(Event::Evicted(address));
    }

    fn on_adopted(&self, parent: Address) {
        self.push(Event::Adopted(parent));
    }

    fn on_reunion_accepted(&self) {
        self.push(Event::ReunionAccepted);
    }
}

struct TestPeer {
    address: Address,
    recorder: Recorder,
    commands: UnboundedSender<commands::Command>,
}

async fn boot(root: Option<Address>) -> Result<TestPeer> {
    let (sender, receiver) = commands::channel();
    let recorder = Recorder::default();

    let peer = Peer::new(
        PeerOptions {
            listen: "127.0.0.1:0".parse()?,
            external: None,
            root: root.map(SocketAddr::from),
        },
        receiver,
        recorder.clone(),
        Statistics::default(),
    )
    .await?;

    let address = peer.address();
    tokio::spawn(async move { peer.run().await });

    Ok(TestPeer {
        address,
        recorder,
        commands: sender,
    })
}

/// Registers and advertises a client, then waits until the root placed it
/// and the expected parent saw its Join.
async fn connect(client: &TestPeer, root: &TestPeer, parent: &TestPeer) -> Result<()> {
    client.commands.send(commands::Command::Register)?;
    client.commands.send(commands::Command::Advertise)?;

    let expected = Event::Attached(client.address, parent.address);
    wait_for(
        || root.recorder.contains(&expected) && parent.recorder.contains(&Event::Joined(client.address)),
        Duration::from_secs(30),
    )
    .await;

    assert!(root.recorder.contains(&Event::Registered(client.address)));
    assert!(client.recorder.contains(&Event::Adopted(parent.address)));
    Ok(())
}

async fn wait_for(condition: impl Fn() -> bool, deadline: Duration) {
    let started = std::time::Instant::now();
    while !condition() {
        assert!(
            started.elapsed() < deadline,
            "condition not reached within {deadline:?}"
        );
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlay_forms_and_broadcasts() -> Result<()> {
    let root = boot(None).await?;
    let a = boot(Some(root.address)).await?;
    let b = boot(Some(root.address)).await?;
    let c = boot(Some(root.address)).await?;

    // First two clients take the root's slots; the third lands under the
    // first client, the shallowest node with room.
    connect(&a, &root, &root).await?;
    connect(&b, &root, &root).await?;
    connect(&c, &root, &a).await?;

    // A broadcast from the deepest node reaches everyone else exactly
    // once: c -> a -> root -> b.
    c.commands
        .send(commands::Command::SendMessage("hi".to_string()))?;

    for peer in [&a, &b, &root] {
        let recorder = peer.recorder.clone();
        wait_for(
            move || {
                recorder.count(|e| matches!(e, Event::Delivered(_, text) if text == "hi")) == 1
            },
            Duration::from_secs(30),
        )
        .await;
    }

    // The origin never hears its own message back.
    assert_eq!(c.recorder.count(|e| matches!(e, Event::Delivered(..))), 0);

    // b received it from the root, not from the origin.
    assert!(b.recorder.contains(&Event::Delivered(root.address, "hi".to_string())));

    // Give any stray duplicate time to surface; the tree has no cycles,
    // so the counts must hold at one.
    tokio::time::sleep(Duration::from_secs(5)).await;
    for peer in [&a, &b, &root] {
        assert_eq!(
            peer.recorder
                .count(|e| matches!(e, Event::Delivered(_, text) if text == "hi")),
            1
        );
    }

    // The two-hop client completes a full Hello round through its parent.
    wait_for(
        || c.recorder.contains(&Event::ReunionAccepted),
        Duration::from_secs(60),
    )
    .await;

    // Nobody was evicted while the rounds were flowing.
    assert_eq!(root.recorder.count(|e| matches!(e, Event::Evicted(_))), 0);

    Ok(())
}
