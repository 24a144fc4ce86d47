//! Dissects textual hex-dump captures into Ethernet / IPv4 / TCP / HTTP
//! field trees, each field carrying the character range it was read from.

pub mod engine;
pub mod layer;
pub mod packet;
pub mod text;

pub use engine::{
    Capture, DissectConfig, DissectError, DissectedPacket, DissectionSession, ExportNode, Node,
    NodeId, PacketTree,
};
pub use packet::CapturePacket;
pub use text::{NormalizedText, PositionMapper, normalize, segment};
