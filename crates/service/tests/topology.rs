use std::time::Duration;

use anyhow::Result;
use canopy_server_service::{Error, Placement, Topology, graph::NetworkGraph};
use codec::address::Address;

fn addr(port: u16) -> Address {
    Address::new([127, 0, 0, 1], port)
}

#[test]
fn placement_fills_shallow_slots_first() -> Result<()> {
    let topology = Topology::new(addr(1));

    // First two clients land under the root.
    assert_eq!(topology.assign(addr(2))?, Placement::Attached(addr(1)));
    assert_eq!(topology.assign(addr(3))?, Placement::Attached(addr(1)));

    // The root is full; the next two go to the left-most child in
    // insertion order.
    assert_eq!(topology.assign(addr(4))?, Placement::Attached(addr(2)));
    assert_eq!(topology.assign(addr(5))?, Placement::Attached(addr(2)));
    assert_eq!(topology.assign(addr(6))?, Placement::Attached(addr(3)));

    assert_eq!(topology.depth(addr(6)), Some(2));
    assert_eq!(topology.parent_of(addr(4)), Some(addr(2)));
    Ok(())
}

#[test]
fn fan_out_never_exceeds_two() -> Result<()> {
    let topology = Topology::new(addr(1));

    for port in 2..40 {
        topology.assign(addr(port))?;
    }

    for port in 1..40 {
        assert!(topology.children_of(addr(port)).unwrap().len() <= 2);
    }

    Ok(())
}

#[test]
fn sender_subtree_is_never_a_candidate() {
    let mut graph = NetworkGraph::new(addr(1));

    // root -> 2 -> {4, 5}, root -> 3.
    graph.attach(addr(2), addr(1)).unwrap();
    graph.attach(addr(3), addr(1)).unwrap();
    graph.attach(addr(4), addr(2)).unwrap();
    graph.attach(addr(5), addr(2)).unwrap();

    // 3 still has free slots, but a re-advertising 3 may not adopt itself.
    assert_eq!(graph.find_live_node(addr(3)), Some(addr(4)));

    // 2's whole subtree is skipped, not just 2.
    assert_eq!(graph.find_live_node(addr(2)), Some(addr(3)));
}

#[test]
fn dead_subtrees_do_not_take_children() {
    let mut graph = NetworkGraph::new(addr(1));

    graph.attach(addr(2), addr(1)).unwrap();
    graph.attach(addr(3), addr(1)).unwrap();
    graph.turn_off(addr(2), true).unwrap();

    assert_eq!(graph.find_live_node(addr(9)), Some(addr(3)));
}

#[test]
fn removal_detaches_and_revival_reparents_the_subtree() -> Result<()> {
    let mut graph = NetworkGraph::new(addr(1));

    graph.attach(addr(2), addr(1))?;
    graph.attach(addr(3), addr(1))?;
    graph.attach(addr(4), addr(2))?;

    graph.remove(addr(2))?;
    assert_eq!(graph.depth(addr(2)), None);
    assert_eq!(graph.depth(addr(4)), None);
    assert!(!graph.get(addr(4)).unwrap().alive);

    // The detached subtree keeps its shape for a later revival.
    assert_eq!(graph.children_of(addr(2)), Some(vec![addr(4)]));

    // The root got its slot back; the dark subtree is unreachable.
    assert_eq!(graph.find_live_node(addr(9)), Some(addr(1)));

    // Revival hangs the whole subtree under the new parent, alive again.
    graph.reattach(addr(2), addr(3))?;
    assert!(graph.get(addr(4)).unwrap().alive);
    assert_eq!(graph.depth(addr(4)), Some(3));
    assert_eq!(graph.parent_address(addr(2)), Some(addr(3)));

    Ok(())
}

#[test]
fn sweep_evicts_silent_clients() -> Result<()> {
    let topology = Topology::new(addr(1));

    topology.assign(addr(2))?;
    topology.assign(addr(3))?;

    // Nobody ever said Hello, so an immediate sweep evicts everyone.
    let mut evicted = topology.sweep_with(Duration::ZERO);
    evicted.sort();
    assert_eq!(evicted, vec![addr(2), addr(3)]);

    // Dark but remembered.
    assert!(topology.contains(addr(2)));
    assert_eq!(topology.depth(addr(2)), None);

    // A returning client is re-placed and tracked again.
    assert_eq!(topology.assign(addr(2))?, Placement::Reattached(addr(1)));
    assert_eq!(topology.depth(addr(2)), Some(1));

    Ok(())
}

#[test]
fn assignment_fails_when_tree_is_saturated() {
    let graph = {
        let mut graph = NetworkGraph::new(addr(1));
        graph.attach(addr(2), addr(1)).unwrap();
        graph.attach(addr(3), addr(1)).unwrap();
        graph.turn_off(addr(2), false).unwrap();
        graph.turn_off(addr(3), false).unwrap();
        graph
    };

    // Root full, both children dead: no candidate for a newcomer.
    assert_eq!(graph.find_live_node(addr(9)), None);
}

#[test]
fn hello_keeps_a_client_alive() -> Result<()> {
    let topology = Topology::new(addr(1));

    topology.assign(addr(2))?;
    topology.record_hello(addr(2))?;
    assert_eq!(topology.tracked_clients(), 1);

    assert!(topology.sweep().is_empty());
    assert_eq!(
        topology.record_hello(addr(9)),
        Err(Error::UnknownNode(addr(9)))
    );

    Ok(())
}
