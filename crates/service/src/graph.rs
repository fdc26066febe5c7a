use crate::Error;

use std::collections::VecDeque;

use ahash::{HashMap, HashMapExt};
use codec::address::Address;

/// Index of a node inside the graph arena.
pub type NodeId = usize;

/// Per-node fan-out bound enforced by placement.
pub const MAX_CHILDREN: usize = 2;

/// Deepest tree the placement algorithm can produce.
pub const MAX_DEPTH: u64 = 8;

#[derive(Debug)]
pub struct GraphNode {
    pub address: Address,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub alive: bool,
}

impl GraphNode {
    fn new(address: Address) -> Self {
        Self {
            address,
            parent: None,
            children: Vec::new(),
            alive: true,
        }
    }
}

/// The root's live view of the overlay tree.
///
/// Parent/child edges form ownership cycles, so nodes live in an arena and
/// the edges are indices into it. Detached nodes stay in the arena: a
/// client evicted after a Reunion timeout keeps its subtree shape and can
/// be re-attached wholesale when it re-Advertises.
pub struct NetworkGraph {
    nodes: Vec<GraphNode>,
    index: HashMap<Address, NodeId>,
}

impl NetworkGraph {
    /// The root node is id 0, always alive, never removable.
    pub fn new(root: Address) -> Self {
        let mut index = HashMap::with_capacity(64);
        index.insert(root, 0);

        Self {
            nodes: vec![GraphNode::new(root)],
            index,
        }
    }

    pub fn get(&self, address: Address) -> Option<&GraphNode> {
        self.index.get(&address).map(|id| &self.nodes[*id])
    }

    pub fn contains(&self, address: Address) -> bool {
        self.index.contains_key(&address)
    }

    /// The addresses of the node's children, in insertion order.
    pub fn children_of(&self, address: Address) -> Option<Vec<Address>> {
        let id = *self.index.get(&address)?;
        Some(
            self.nodes[id]
                .children
                .iter()
                .map(|child| self.nodes[*child].address)
                .collect(),
        )
    }

    /// The address of the node's current parent, if it has one.
    pub fn parent_address(&self, address: Address) -> Option<Address> {
        let id = *self.index.get(&address)?;
        let parent = self.nodes[id].parent?;
        Some(self.nodes[parent].address)
    }

    /// Edge distance from the root; `None` for unknown or detached nodes.
    pub fn depth(&self, address: Address) -> Option<u64> {
        let mut id = *self.index.get(&address)?;
        let mut depth = 0;

        while let Some(parent) = self.nodes[id].parent {
            id = parent;
            depth += 1;
        }

        (id == 0).then_some(depth)
    }

    /// Finds the parent slot for `sender`: breadth-first from the root,
    /// first alive node with a free child slot that is not the sender.
    /// The sender's node and dead nodes are skipped without enqueuing
    /// their children, so neither the sender's subtree nor anything
    /// below a dead node can take the newcomer.
    pub fn find_live_node(&self, sender: Address) -> Option<Address> {
        let mut queue = VecDeque::from([0]);

        while let Some(id) = queue.pop_front() {
            let node = &self.nodes[id];
            if node.address == sender || !node.alive {
                continue;
            }

            if node.children.len() < MAX_CHILDREN {
                return Some(node.address);
            }

            queue.extend(node.children.iter().copied());
        }

        None
    }

    /// Attaches a brand-new node as the last child of `parent`.
    pub fn attach(&mut self, address: Address, parent: Address) -> Result<(), Error> {
        if self.contains(address) {
            return Err(Error::AlreadyAttached(address));
        }

        let parent_id = *self
            .index
            .get(&parent)
            .ok_or(Error::UnknownNode(parent))?;

        let id = self.nodes.len();
        let mut node = GraphNode::new(address);
        node.parent = Some(parent_id);

        self.nodes.push(node);
        self.nodes[parent_id].children.push(id);
        self.index.insert(address, id);

        Ok(())
    }

    /// Revives a previously known node and hangs its whole subtree under a
    /// new parent. Used when an evicted client re-Advertises.
    pub fn reattach(&mut self, address: Address, parent: Address) -> Result<(), Error> {
        let id = *self
            .index
            .get(&address)
            .ok_or(Error::UnknownNode(address))?;
        let parent_id = *self
            .index
            .get(&parent)
            .ok_or(Error::UnknownNode(parent))?;

        self.detach(id);
        self.set_alive(id, true, true);

        self.nodes[id].parent = Some(parent_id);
        self.nodes[parent_id].children.push(id);

        Ok(())
    }

    /// Detaches the node from its parent and marks the whole subtree dead.
    /// The nodes stay in the arena for a later [`NetworkGraph::reattach`].
    pub fn remove(&mut self, address: Address) -> Result<(), Error> {
        let id = *self
            .index
            .get(&address)
            .ok_or(Error::UnknownNode(address))?;
        if id == 0 {
            return Err(Error::RootImmortal);
        }

        self.detach(id);
        self.nodes[id].parent = None;
        self.set_alive(id, false, true);

        Ok(())
    }

    pub fn turn_on(&mut self, address: Address, subtree: bool) -> Result<(), Error> {
        let id = *self
            .index
            .get(&address)
            .ok_or(Error::UnknownNode(address))?;
        self.set_alive(id, true, subtree);
        Ok(())
    }

    pub fn turn_off(&mut self, address: Address, subtree: bool) -> Result<(), Error> {
        let id = *self
            .index
            .get(&address)
            .ok_or(Error::UnknownNode(address))?;
        self.set_alive(id, false, subtree);
        Ok(())
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent {
            self.nodes[parent].children.retain(|child| *child != id);
        }
    }

    fn set_alive(&mut self, id: NodeId, alive: bool, subtree: bool) {
        self.nodes[id].alive = alive;

        if subtree {
            let children = self.nodes[id].children.clone();
            for child in children {
                self.set_alive(child, alive, true);
            }
        }
    }
}
