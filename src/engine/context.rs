use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use super::error::DissectError;
use super::tree::{NodeId, NodeIndex, PacketTree};
use crate::text::PositionMapper;

#[derive(Debug, Clone)]
pub struct DissectConfig {
    pub max_packet_bytes: usize,
    pub decode_http: bool,
    pub workers: usize,
}

impl Default for DissectConfig {
    fn default() -> Self {
        Self {
            max_packet_bytes: 65_535,
            decode_http: true,
            workers: 1,
        }
    }
}

/// One parsing session: the node-id counter plus the configuration.
///
/// Ids are unique for the lifetime of the session. Loading a new capture
/// means constructing a new session; there is no in-place reset.
#[derive(Debug, Default)]
pub struct DissectionSession {
    config: DissectConfig,
    next_id: AtomicU64,
}

impl DissectionSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DissectConfig) -> Self {
        Self {
            config,
            next_id: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &DissectConfig {
        &self.config
    }

    pub fn next_id(&self) -> NodeId {
        NodeId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }
}

/// Everything a layer dissector needs while it emits fields for one packet.
pub struct DecodeContext<'a> {
    pub session: &'a DissectionSession,
    pub tree: &'a mut PacketTree,
    pub data: &'a [u8],
    pub positions: PositionMapper<'a>,
}

impl<'a> DecodeContext<'a> {
    pub fn new(
        session: &'a DissectionSession,
        tree: &'a mut PacketTree,
        data: &'a [u8],
        positions: PositionMapper<'a>,
    ) -> Self {
        Self {
            session,
            tree,
            data,
            positions,
        }
    }

    /// Adds a field covering `bytes`, highlighted from `cursor` onward.
    pub fn emit(
        &mut self,
        parent: NodeIndex,
        field: impl Into<String>,
        value: impl Into<String>,
        bytes: Range<usize>,
        cursor: usize,
    ) -> Result<NodeIndex, DissectError> {
        let chars = self.positions.span(cursor, bytes.len())?;
        Ok(self
            .tree
            .add(self.session, parent, field.into(), value.into(), chars, bytes))
    }

    /// Character offset right after the given node.
    pub fn end_of(&self, node: NodeIndex) -> usize {
        self.tree.node(node).chars.end
    }

    /// Runs one layer; on failure every node it added is dropped again so
    /// the tree only holds completed layers.
    pub fn layer<T>(
        &mut self,
        dissect: impl FnOnce(&mut Self) -> Result<T, DissectError>,
    ) -> Result<T, DissectError> {
        let checkpoint = self.tree.checkpoint();
        let result = dissect(self);
        if result.is_err() {
            self.tree.rollback(checkpoint);
        }
        result
    }
}
