use std::net::Ipv4Addr;
use std::ops::Range;

use crate::engine::constants::{IpProtocol, ipv4_option};
use crate::engine::context::DecodeContext;
use crate::engine::cursor::Cursor;
use crate::engine::error::DissectError;
use crate::engine::tree::NodeIndex;
use crate::layer::fields;
use crate::layer::options::{self, OptionWalker, RawOption};

pub const MIN_HEADER_LEN: usize = 20;

/// IPv4 Header
///
/// The IPv4 header format is defined in RFC 791:
///
///   +---------------------------------------------------------------+
///   | Version (4) | IHL (4) | Type of Service (8)                    |
///   +---------------------------------------------------------------+
///   |                     Total Length (16)                         |
///   +---------------------------------------------------------------+
///   |                   Identification (16)                         |
///   +---------------------------------------------------------------+
///   |Flags (3)|         Fragment Offset (13)                        |
///   +---------------------------------------------------------------+
///   |   TTL (8)   |   Protocol (8)    |    Header Checksum (16)     |
///   +---------------------------------------------------------------+
///   |                   Source IP Address (32)                      |
///   +---------------------------------------------------------------+
///   |                Destination IP Address (32)                    |
///   +---------------------------------------------------------------+
///   |             Options (if IHL > 5; Variable length)             |
///   +---------------------------------------------------------------+
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Header {
    pub version: u8,
    /// Internet Header Length in 32-bit words.
    pub ihl: u8,
    pub type_of_service: u8,
    pub total_length: u16,
    pub identification: u16,
    /// Flags (top 3 bits) and fragment offset (low 13 bits), as on the wire.
    pub flags_fragment: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
}

impl Ipv4Header {
    pub fn header_len(&self) -> usize {
        (self.ihl as usize) * 4
    }

    pub fn reserved_bit(&self) -> bool {
        self.flags_fragment & 0x8000 != 0
    }

    pub fn dont_fragment(&self) -> bool {
        self.flags_fragment & 0x4000 != 0
    }

    pub fn more_fragments(&self) -> bool {
        self.flags_fragment & 0x2000 != 0
    }

    /// Fragment offset in bytes.
    pub fn fragment_offset(&self) -> usize {
        ((self.flags_fragment & 0x1fff) as usize) * 8
    }

    pub fn ip_protocol(&self) -> IpProtocol {
        IpProtocol::from(self.protocol)
    }
}

/// Decodes the header starting at `offset`. A header length under 20 bytes
/// is a malformed capture.
pub fn parse_ipv4_header(data: &[u8], offset: usize) -> Result<Ipv4Header, DissectError> {
    let insufficient = |needed: usize| DissectError::InsufficientBytes {
        protocol: "IPv4",
        needed,
        available: data.len(),
    };
    let mut cursor =
        Cursor::with_pos(data, offset).ok_or_else(|| insufficient(offset + MIN_HEADER_LEN))?;
    let fixed = cursor
        .read_exact(MIN_HEADER_LEN)
        .ok_or_else(|| insufficient(offset + MIN_HEADER_LEN))?;

    let header = Ipv4Header {
        version: fixed[0] >> 4,
        ihl: fixed[0] & 0x0f,
        type_of_service: fixed[1],
        total_length: u16::from_be_bytes([fixed[2], fixed[3]]),
        identification: u16::from_be_bytes([fixed[4], fixed[5]]),
        flags_fragment: u16::from_be_bytes([fixed[6], fixed[7]]),
        ttl: fixed[8],
        protocol: fixed[9],
        checksum: u16::from_be_bytes([fixed[10], fixed[11]]),
        source: Ipv4Addr::new(fixed[12], fixed[13], fixed[14], fixed[15]),
        destination: Ipv4Addr::new(fixed[16], fixed[17], fixed[18], fixed[19]),
    };

    let header_len = header.header_len();
    if header_len < MIN_HEADER_LEN {
        return Err(DissectError::HeaderTooShort {
            protocol: "IPv4",
            minimum: MIN_HEADER_LEN,
            found: header_len,
        });
    }
    if offset + header_len > data.len() {
        return Err(insufficient(offset + header_len));
    }

    Ok(header)
}

#[derive(Debug, Clone)]
pub struct Ipv4Layer {
    pub header: Ipv4Header,
    pub payload_offset: usize,
    pub char_end: usize,
}

/// Emits the `IPv4` subtree for the header at `offset`, highlighted from
/// `cursor` (the end of the Ethernet layer).
pub fn dissect_ipv4(
    ctx: &mut DecodeContext<'_>,
    parent: NodeIndex,
    offset: usize,
    cursor: usize,
) -> Result<Ipv4Layer, DissectError> {
    let header = parse_ipv4_header(ctx.data, offset)?;
    let header_len = header.header_len();
    let at = |start: usize, len: usize| offset + start..offset + start + len;

    let layer = ctx.emit(
        parent,
        "IPv4",
        format!("Src: {}, Dst: {}", header.source, header.destination),
        at(0, header_len),
        cursor,
    )?;

    let version = ctx.emit(layer, "Version", header.version.to_string(), at(0, 1), cursor)?;
    ctx.emit(
        layer,
        "Header Length",
        format!("{} bytes ({})", header_len, header.ihl),
        at(0, 1),
        cursor,
    )?;
    let tos = ctx.emit(
        layer,
        "Type of service",
        fields::hex(&[header.type_of_service]),
        at(1, 1),
        ctx.end_of(version),
    )?;
    let total_length = ctx.emit(
        layer,
        "Total Length",
        format!(
            "{} ({} bytes)",
            fields::hex(&header.total_length.to_be_bytes()),
            header.total_length
        ),
        at(2, 2),
        ctx.end_of(tos),
    )?;
    let identification = ctx.emit(
        layer,
        "Identification",
        format!(
            "{} ({})",
            fields::hex(&header.identification.to_be_bytes()),
            header.identification
        ),
        at(4, 2),
        ctx.end_of(total_length),
    )?;

    let flags_cursor = ctx.end_of(identification);
    let word = header.flags_fragment as u32;
    let flags = ctx.emit(
        layer,
        "Flags",
        fields::hex(&header.flags_fragment.to_be_bytes()),
        at(6, 2),
        flags_cursor,
    )?;
    for (shift, label, set) in [
        (15, "Reserved bit", header.reserved_bit()),
        (14, "Don't fragment", header.dont_fragment()),
        (13, "More fragments", header.more_fragments()),
    ] {
        ctx.emit(
            flags,
            fields::bit_pattern(16, shift, 1, word),
            format!("{label}: {}", fields::set_label(set)),
            at(6, 2),
            flags_cursor,
        )?;
    }
    let fragment_offset = ctx.emit(
        layer,
        "Fragment offset",
        header.fragment_offset().to_string(),
        at(6, 2),
        flags_cursor,
    )?;

    let ttl = ctx.emit(
        layer,
        "Time to live",
        format!("{} ({})", fields::hex(&[header.ttl]), header.ttl),
        at(8, 1),
        ctx.end_of(fragment_offset),
    )?;
    let protocol = ctx.emit(
        layer,
        "Protocol",
        format!(
            "{} ({}/{})",
            fields::hex(&[header.protocol]),
            header.ip_protocol().as_str(),
            header.ip_protocol().value()
        ),
        at(9, 1),
        ctx.end_of(ttl),
    )?;
    let checksum = ctx.emit(
        layer,
        "Header checksum",
        fields::hex(&header.checksum.to_be_bytes()),
        at(10, 2),
        ctx.end_of(protocol),
    )?;
    let source = ctx.emit(
        layer,
        "Source IP",
        header.source.to_string(),
        at(12, 4),
        ctx.end_of(checksum),
    )?;
    let destination = ctx.emit(
        layer,
        "Destination IP",
        header.destination.to_string(),
        at(16, 4),
        ctx.end_of(source),
    )?;

    if header_len > MIN_HEADER_LEN {
        let options_cursor = ctx.end_of(destination);
        dissect_options(
            ctx,
            layer,
            offset + MIN_HEADER_LEN,
            header_len - MIN_HEADER_LEN,
            options_cursor,
        )?;
    }

    Ok(Ipv4Layer {
        header,
        payload_offset: offset + header_len,
        char_end: ctx.end_of(layer),
    })
}

fn dissect_options(
    ctx: &mut DecodeContext<'_>,
    layer: NodeIndex,
    start: usize,
    declared: usize,
    cursor: usize,
) -> Result<(), DissectError> {
    let options_node = ctx.emit(layer, "IP Options", "", start..start + declared, cursor)?;
    let data = ctx.data;
    let mut walker = OptionWalker::new("IPv4", data, start, declared, MIN_HEADER_LEN);
    let mut cursor = cursor;

    for option in walker.by_ref() {
        cursor = emit_option(ctx, options_node, &option?, cursor)?;
    }
    walker.finish()
}

fn option_name(kind: u8) -> &'static str {
    match kind {
        ipv4_option::END_OF_LIST => "End of Options List",
        ipv4_option::NO_OPERATION => "No Operation",
        ipv4_option::RECORD_ROUTE => "Record Route",
        ipv4_option::TIMESTAMP => "Time Stamp",
        ipv4_option::LOOSE_SOURCE_ROUTE => "Loose Source Route",
        ipv4_option::STRICT_SOURCE_ROUTE => "Strict Source Route",
        _ => "Untreated Option",
    }
}

fn emit_option(
    ctx: &mut DecodeContext<'_>,
    options_node: NodeIndex,
    option: &RawOption,
    cursor: usize,
) -> Result<usize, DissectError> {
    let bytes = option.bytes();
    let kind = option.kind();
    let value = match option {
        RawOption::Tlv { .. } => format!("{} bytes", bytes.len()),
        _ => String::new(),
    };
    let node = ctx.emit(options_node, option_name(kind), value, bytes.clone(), cursor)?;

    match option {
        RawOption::EndOfList { at } | RawOption::NoOperation { at } => {
            options::emit_type(ctx, node, *at, cursor)?;
        }
        RawOption::Tlv { kind, bytes } => {
            let after_length = options::emit_type_and_length(ctx, node, bytes, cursor)?;
            let value_bytes = bytes.start + 2..bytes.end;
            match *kind {
                ipv4_option::RECORD_ROUTE => {
                    emit_route(ctx, node, value_bytes, after_length, "Recorded Route")?
                }
                ipv4_option::LOOSE_SOURCE_ROUTE | ipv4_option::STRICT_SOURCE_ROUTE => {
                    emit_route(ctx, node, value_bytes, after_length, "Source Route")?
                }
                ipv4_option::TIMESTAMP => emit_timestamp(ctx, node, value_bytes, after_length)?,
                _ => options::emit_data(ctx, node, value_bytes, after_length)?,
            }
        }
    }

    Ok(ctx.end_of(node))
}

/// Route options: a pointer byte, then packed 4-byte addresses.
fn emit_route(
    ctx: &mut DecodeContext<'_>,
    node: NodeIndex,
    value: Range<usize>,
    cursor: usize,
    label: &'static str,
) -> Result<(), DissectError> {
    if value.is_empty() {
        return Ok(());
    }
    let pointer = ctx.data[value.start];
    let pointer_node = ctx.emit(
        node,
        "Pointer",
        pointer.to_string(),
        value.start..value.start + 1,
        cursor,
    )?;

    let data = ctx.data;
    let mut cursor = ctx.end_of(pointer_node);
    let Some(mut reader) = Cursor::with_pos(&data[..value.end], value.start + 1) else {
        return Ok(());
    };
    while let Some(address) = reader.take(4) {
        let ip = fields::ipv4(&data[address.clone()])
            .map(|ip| ip.to_string())
            .unwrap_or_default();
        let route = ctx.emit(node, label, ip, address, cursor)?;
        cursor = ctx.end_of(route);
    }
    Ok(())
}

/// Timestamp option: pointer, overflow/flag nibbles, then the raw entries.
fn emit_timestamp(
    ctx: &mut DecodeContext<'_>,
    node: NodeIndex,
    value: Range<usize>,
    cursor: usize,
) -> Result<(), DissectError> {
    if value.len() < 2 {
        return options::emit_data(ctx, node, value, cursor);
    }
    let pointer = ctx.data[value.start];
    let pointer_node = ctx.emit(
        node,
        "Pointer",
        pointer.to_string(),
        value.start..value.start + 1,
        cursor,
    )?;
    let overflow_flag = ctx.data[value.start + 1];
    let overflow_node = ctx.emit(
        node,
        "Overflow/Flag",
        format!("Overflow: {}, Flag: {}", overflow_flag >> 4, overflow_flag & 0x0f),
        value.start + 1..value.start + 2,
        ctx.end_of(pointer_node),
    )?;
    let data_cursor = ctx.end_of(overflow_node);
    options::emit_data(ctx, node, value.start + 2..value.end, data_cursor)
}
