use crate::engine::constants::EtherType;
use crate::engine::context::DecodeContext;
use crate::engine::cursor::Cursor;
use crate::engine::error::DissectError;
use crate::engine::tree::NodeIndex;
use crate::layer::fields;

pub const HEADER_LEN: usize = 14;

/// Ethernet II header: destination MAC, source MAC, EtherType.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetFrame {
    pub destination: [u8; 6],
    pub source: [u8; 6],
    pub ethertype: u16,
}

impl EthernetFrame {
    pub fn ether_type(&self) -> EtherType {
        EtherType::from(self.ethertype)
    }

    /// `IPv4 (0x0800)`
    pub fn type_label(&self) -> String {
        let ether_type = self.ether_type();
        format!("{} (0x{:04X})", ether_type.as_str(), ether_type.value())
    }
}

pub fn parse_ethernet(data: &[u8]) -> Result<EthernetFrame, DissectError> {
    let mut cursor = Cursor::new(data);
    let insufficient = || DissectError::InsufficientBytes {
        protocol: "Ethernet",
        needed: HEADER_LEN,
        available: data.len(),
    };

    let destination_bytes = cursor.read_exact(6).ok_or_else(insufficient)?;
    let source_bytes = cursor.read_exact(6).ok_or_else(insufficient)?;

    let mut destination = [0u8; 6];
    destination.copy_from_slice(destination_bytes);

    let mut source = [0u8; 6];
    source.copy_from_slice(source_bytes);

    let ethertype = cursor.read_u16_be().ok_or_else(insufficient)?;

    Ok(EthernetFrame {
        destination,
        source,
        ethertype,
    })
}

#[derive(Debug, Clone)]
pub struct EthernetLayer {
    pub frame: EthernetFrame,
    pub payload_offset: usize,
    pub char_end: usize,
}

/// Emits the `Ethernet II` subtree for the first 14 bytes of the packet.
pub fn dissect_ethernet(
    ctx: &mut DecodeContext<'_>,
    parent: NodeIndex,
    cursor: usize,
) -> Result<EthernetLayer, DissectError> {
    let frame = parse_ethernet(ctx.data)?;
    let dst = fields::mac(&frame.destination);
    let src = fields::mac(&frame.source);
    let ether_type = frame.type_label();

    let layer = ctx.emit(
        parent,
        "Ethernet II",
        format!("Src: {src}, Dst: {dst}, Type: {ether_type}"),
        0..HEADER_LEN,
        cursor,
    )?;
    let dst_node = ctx.emit(layer, "Dst MAC", dst, 0..6, cursor)?;
    let src_node = ctx.emit(layer, "Src MAC", src, 6..12, ctx.end_of(dst_node))?;
    ctx.emit(layer, "Type", ether_type, 12..14, ctx.end_of(src_node))?;

    Ok(EthernetLayer {
        frame,
        payload_offset: HEADER_LEN,
        char_end: ctx.end_of(layer),
    })
}
