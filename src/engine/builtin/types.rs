use crate::engine::error::DissectError;
use crate::engine::tree::PacketTree;
use crate::packet::CapturePacket;

/// One segmented packet together with the layers that could be decoded.
///
/// When `error` is set the tree still holds every layer completed before
/// the failing one.
#[derive(Debug, Clone)]
pub struct DissectedPacket {
    pub packet: CapturePacket,
    pub tree: PacketTree,
    pub error: Option<DissectError>,
}

impl DissectedPacket {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}
