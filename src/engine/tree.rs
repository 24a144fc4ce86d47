use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use super::context::DissectionSession;

/// Session-wide node handle, stable across packets. Used by consumers to
/// look a node up again (field names repeat, ids never do).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position of a node inside its packet's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeIndex(usize);

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub field: String,
    pub value: String,
    /// Highlight span in the normalized capture text.
    pub chars: Range<usize>,
    /// Range into the packet buffer.
    pub bytes: Range<usize>,
    pub size: usize,
    pub children: Vec<NodeIndex>,
    pub parent: Option<NodeIndex>,
}

/// Arena holding one packet's dissection tree. Index 0 is the packet root;
/// every other node is attached to a parent as it is created.
#[derive(Debug, Clone)]
pub struct PacketTree {
    buffer: Arc<[u8]>,
    nodes: Vec<Node>,
}

impl PacketTree {
    pub fn new(
        session: &DissectionSession,
        label: String,
        buffer: Arc<[u8]>,
        chars: Range<usize>,
    ) -> Self {
        let len = buffer.len();
        let root = Node {
            id: session.next_id(),
            field: label,
            value: String::new(),
            chars,
            bytes: 0..len,
            size: len,
            children: Vec::new(),
            parent: None,
        };
        Self {
            buffer,
            nodes: vec![root],
        }
    }

    pub fn root(&self) -> NodeIndex {
        NodeIndex(0)
    }

    pub fn add(
        &mut self,
        session: &DissectionSession,
        parent: NodeIndex,
        field: String,
        value: String,
        chars: Range<usize>,
        bytes: Range<usize>,
    ) -> NodeIndex {
        debug_assert!(bytes.end <= self.buffer.len());
        let index = NodeIndex(self.nodes.len());
        self.nodes.push(Node {
            id: session.next_id(),
            field,
            value,
            chars,
            size: bytes.len(),
            bytes,
            children: Vec::new(),
            parent: Some(parent),
        });
        self.nodes[parent.0].children.push(index);
        index
    }

    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.nodes[index.0]
    }

    pub fn root_node(&self) -> &Node {
        &self.nodes[0]
    }

    /// Bytes a node stands for, borrowed from the shared packet buffer.
    pub fn bytes(&self, index: NodeIndex) -> &[u8] {
        &self.buffer[self.nodes[index.0].bytes.clone()]
    }

    pub fn children(&self, index: NodeIndex) -> &[NodeIndex] {
        &self.nodes[index.0].children
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn find(&self, id: NodeId) -> Option<NodeIndex> {
        self.nodes
            .iter()
            .position(|node| node.id == id)
            .map(NodeIndex)
    }

    /// First direct child of `parent` carrying the given label.
    pub fn child_named(&self, parent: NodeIndex, field: &str) -> Option<NodeIndex> {
        self.children(parent)
            .iter()
            .copied()
            .find(|child| self.nodes[child.0].field == field)
    }

    /// Depth-first walk from the root, yielding each node with its depth.
    pub fn walk(&self) -> Vec<(usize, NodeIndex)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(0, self.root())];
        while let Some((depth, index)) = stack.pop() {
            out.push((depth, index));
            for child in self.children(index).iter().rev() {
                stack.push((depth + 1, *child));
            }
        }
        out
    }

    pub fn checkpoint(&self) -> usize {
        self.nodes.len()
    }

    /// Drops every node created after `checkpoint` together with the child
    /// links pointing at them.
    pub fn rollback(&mut self, checkpoint: usize) {
        if checkpoint >= self.nodes.len() {
            return;
        }
        self.nodes.truncate(checkpoint.max(1));
        for node in &mut self.nodes {
            node.children.retain(|child| child.0 < checkpoint);
        }
    }
}
