use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tracing::{debug, info};

use super::{DissectedPacket, dissect_packet};
use crate::engine::context::DissectionSession;
use crate::engine::export::ExportNode;
use crate::engine::tree::{Node, NodeId};
use crate::packet::CapturePacket;
use crate::text::{SkippedLine, normalize, segment};

/// A fully loaded capture: the normalized text every highlight range points
/// into, the lines that were dropped, and one tree per packet.
#[derive(Debug, Clone, Default)]
pub struct Capture {
    pub text: String,
    pub skipped: Vec<SkippedLine>,
    pub packets: Vec<DissectedPacket>,
    /// Set when loading stopped early; `packets` then holds a prefix.
    pub cancelled: bool,
}

impl Capture {
    pub fn load(raw: &str, session: &DissectionSession) -> Self {
        Self::load_with_cancel(raw, session, &AtomicBool::new(false))
    }

    /// Like [`Capture::load`], checking `cancel` before each packet.
    pub fn load_with_cancel(raw: &str, session: &DissectionSession, cancel: &AtomicBool) -> Self {
        let normalized = normalize(raw);
        let text = normalized.text();
        let segmented = segment(&normalized.lines);
        let total = segmented.len();

        let workers = session.config().workers.max(1);
        let packets = if workers == 1 || total < 2 {
            dissect_sequential(session, &segmented, &text, cancel)
        } else {
            dissect_parallel(session, &segmented, &text, cancel, workers)
        };

        let cancelled = packets.len() < total;
        info!(
            packets = packets.len(),
            skipped_lines = normalized.skipped.len(),
            ids_issued = session.issued(),
            cancelled,
            "capture loaded"
        );

        Self {
            text,
            skipped: normalized.skipped,
            packets,
            cancelled,
        }
    }

    pub fn find(&self, id: NodeId) -> Option<(&DissectedPacket, &Node)> {
        self.packets.iter().find_map(|packet| {
            packet
                .tree
                .find(id)
                .map(|index| (packet, packet.tree.node(index)))
        })
    }

    /// `[char_start, char_end)` of the node in [`Capture::text`].
    pub fn highlight(&self, id: NodeId) -> Option<Range<usize>> {
        self.find(id).map(|(_, node)| node.chars.clone())
    }

    /// The slice of normalized text a node was decoded from.
    pub fn highlighted_text(&self, id: NodeId) -> Option<&str> {
        self.highlight(id).and_then(|range| self.text.get(range))
    }

    /// The whole forest in the interchange format, one entry per packet.
    pub fn export(&self) -> Vec<ExportNode> {
        self.packets
            .iter()
            .map(|packet| ExportNode::from_tree(&packet.tree))
            .collect()
    }

    pub fn failed(&self) -> impl Iterator<Item = &DissectedPacket> {
        self.packets.iter().filter(|packet| !packet.is_complete())
    }
}

fn dissect_sequential(
    session: &DissectionSession,
    packets: &[CapturePacket],
    text: &str,
    cancel: &AtomicBool,
) -> Vec<DissectedPacket> {
    let mut out = Vec::with_capacity(packets.len());
    for packet in packets {
        if cancel.load(Ordering::Relaxed) {
            debug!(packet = packet.index, "cancelled before packet");
            break;
        }
        out.push(dissect_packet(session, packet, text));
    }
    out
}

/// Splits the packets into contiguous chunks, one scoped thread each. Output
/// keeps packet order; after a cancellation only the leading run of fully
/// dissected chunks is kept so the result is still a prefix.
fn dissect_parallel(
    session: &DissectionSession,
    packets: &[CapturePacket],
    text: &str,
    cancel: &AtomicBool,
    workers: usize,
) -> Vec<DissectedPacket> {
    let chunk_size = packets.len().div_ceil(workers);
    debug!(workers, chunk_size, "dissecting in parallel");

    let chunks: Vec<(usize, Vec<DissectedPacket>)> = thread::scope(|scope| {
        let handles: Vec<_> = packets
            .chunks(chunk_size)
            .map(|chunk| {
                let handle = scope.spawn(move || dissect_sequential(session, chunk, text, cancel));
                (chunk.len(), handle)
            })
            .collect();

        handles
            .into_iter()
            .map(|(len, handle)| match handle.join() {
                Ok(done) => (len, done),
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    });

    let mut out = Vec::with_capacity(packets.len());
    for (len, done) in chunks {
        let complete = done.len() == len;
        out.extend(done);
        if !complete {
            break;
        }
    }
    out
}
