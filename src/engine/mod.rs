pub mod builtin;
pub mod constants;
pub mod context;
pub mod cursor;
pub mod error;
pub mod export;
pub mod tree;

pub use builtin::{Capture, DissectedPacket, dissect_packet};
pub use constants::{EtherType, IpProtocol};
pub use context::{DecodeContext, DissectConfig, DissectionSession};
pub use error::{DissectError, ExportError, PositionError, SkipReason};
pub use export::ExportNode;
pub use tree::{Node, NodeId, NodeIndex, PacketTree};
