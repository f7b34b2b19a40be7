//! Spanning tree for O(depth) broadcast fan-out.
//!
//! Rebuilt on every membership change. Layout: the local node roots the
//! tree, remaining nodes are placed in sorted-ID order, and children are
//! assigned by index (node i parents 2i+1 and 2i+2).

use std::collections::{HashMap, HashSet};

use tracing::debug;

use swarmbus_protocol::NodeId;

#[derive(Debug, Default)]
pub struct BroadcastTree {
    root: Option<NodeId>,
    children: HashMap<NodeId, Vec<NodeId>>,
}

impl BroadcastTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the tree rooted at `root` over the given membership.
    /// `members` may or may not include the root; order does not matter.
    pub fn rebuild(&mut self, root: &NodeId, members: &[NodeId]) {
        let mut order: Vec<NodeId> = members.iter().filter(|id| *id != root).cloned().collect();
        order.sort();
        order.insert(0, root.clone());

        self.children.clear();
        for (i, node) in order.iter().enumerate() {
            let mut kids = Vec::new();
            for child_index in [2 * i + 1, 2 * i + 2] {
                if let Some(child) = order.get(child_index) {
                    kids.push(child.clone());
                }
            }
            if !kids.is_empty() {
                self.children.insert(node.clone(), kids);
            }
        }
        self.root = Some(root.clone());

        debug!(root = %root, nodes = order.len(), "broadcast tree rebuilt");
    }

    pub fn root(&self) -> Option<&NodeId> {
        self.root.as_ref()
    }

    pub fn children_of(&self, node: &NodeId) -> &[NodeId] {
        self.children.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Depth-first traversal from the root with cycle protection.
    /// Returns the visit order, root first.
    pub fn traverse(&self) -> Vec<NodeId> {
        let Some(root) = &self.root else {
            return Vec::new();
        };
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![root.clone()];
        while let Some(node) = stack.pop() {
            if !visited.insert(node.clone()) {
                continue;
            }
            // Push children in reverse so the leftmost child is visited first.
            for child in self.children_of(&node).iter().rev() {
                stack.push(child.clone());
            }
            order.push(node);
        }
        order
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }
}
