use std::ops::Range;

use crate::engine::constants::tcp_option;
use crate::engine::context::DecodeContext;
use crate::engine::cursor::Cursor;
use crate::engine::error::DissectError;
use crate::engine::tree::NodeIndex;
use crate::layer::fields;
use crate::layer::options::{self, OptionWalker, RawOption};

pub const MIN_HEADER_LEN: usize = 20;

/// The 12 bits following the data offset: 3 reserved bits and 9 flags.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TcpFlags {
    pub reserved: u8,
    pub ns: bool,  // 0x100
    pub cwr: bool, // 0x080
    pub ece: bool, // 0x040
    pub urg: bool, // 0x020
    pub ack: bool, // 0x010
    pub psh: bool, // 0x008
    pub rst: bool, // 0x004
    pub syn: bool, // 0x002
    pub fin: bool, // 0x001
}

impl TcpFlags {
    /// Decodes the low 12 bits of the data-offset/flags word.
    pub fn from_word(word: u16) -> Self {
        Self {
            reserved: ((word >> 9) & 0x07) as u8,
            ns: word & 0x100 != 0,
            cwr: word & 0x80 != 0,
            ece: word & 0x40 != 0,
            urg: word & 0x20 != 0,
            ack: word & 0x10 != 0,
            psh: word & 0x08 != 0,
            rst: word & 0x04 != 0,
            syn: word & 0x02 != 0,
            fin: word & 0x01 != 0,
        }
    }

    pub fn bits(&self) -> u16 {
        ((self.reserved as u16) << 9)
            | (self.ns as u16) << 8
            | (self.cwr as u16) << 7
            | (self.ece as u16) << 6
            | (self.urg as u16) << 5
            | (self.ack as u16) << 4
            | (self.psh as u16) << 3
            | (self.rst as u16) << 2
            | (self.syn as u16) << 1
            | (self.fin as u16)
    }

    /// Names of the set flags, most significant first.
    pub fn names(&self) -> Vec<&'static str> {
        [
            (self.ns, "NS"),
            (self.cwr, "CWR"),
            (self.ece, "ECE"),
            (self.urg, "URG"),
            (self.ack, "ACK"),
            (self.psh, "PSH"),
            (self.rst, "RST"),
            (self.syn, "SYN"),
            (self.fin, "FIN"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect()
    }
}

/// Fixed 20-byte TCP header. `data_offset` counts 32-bit words; options
/// are decoded straight into the tree, not kept here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    pub sequence_number: u32,
    pub acknowledgment_number: u32,
    pub data_offset: u8,
    pub flags: TcpFlags,
    pub window_size: u16,
    pub checksum: u16,
    pub urgent_pointer: u16,
}

impl TcpHeader {
    pub fn header_len(&self) -> usize {
        (self.data_offset as usize) * 4
    }
}

pub fn parse_tcp_header(data: &[u8], offset: usize) -> Result<TcpHeader, DissectError> {
    let insufficient = |needed: usize| DissectError::InsufficientBytes {
        protocol: "TCP",
        needed,
        available: data.len(),
    };
    let fixed_end = offset + MIN_HEADER_LEN;
    let mut cursor = Cursor::with_pos(data, offset).ok_or_else(|| insufficient(fixed_end))?;

    let source_port = cursor.read_u16_be().ok_or_else(|| insufficient(fixed_end))?;
    let destination_port = cursor.read_u16_be().ok_or_else(|| insufficient(fixed_end))?;
    let sequence_number = cursor.read_u32_be().ok_or_else(|| insufficient(fixed_end))?;
    let acknowledgment_number = cursor.read_u32_be().ok_or_else(|| insufficient(fixed_end))?;
    let offset_flags = cursor.read_u16_be().ok_or_else(|| insufficient(fixed_end))?;
    let window_size = cursor.read_u16_be().ok_or_else(|| insufficient(fixed_end))?;
    let checksum = cursor.read_u16_be().ok_or_else(|| insufficient(fixed_end))?;
    let urgent_pointer = cursor.read_u16_be().ok_or_else(|| insufficient(fixed_end))?;

    let header = TcpHeader {
        source_port,
        destination_port,
        sequence_number,
        acknowledgment_number,
        data_offset: (offset_flags >> 12) as u8,
        flags: TcpFlags::from_word(offset_flags & 0x0fff),
        window_size,
        checksum,
        urgent_pointer,
    };

    let header_len = header.header_len();
    if header_len < MIN_HEADER_LEN {
        return Err(DissectError::HeaderTooShort {
            protocol: "TCP",
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
pub struct TcpLayer {
    pub header: TcpHeader,
    pub payload_offset: usize,
    pub char_end: usize,
}

const FLAG_FIELDS: [(u32, u32, &str); 10] = [
    (9, 3, "Reserved"),
    (8, 1, "Nonce"),
    (7, 1, "Congestion Window Reduced"),
    (6, 1, "ECN-Echo"),
    (5, 1, "Urgent"),
    (4, 1, "Acknowledgment"),
    (3, 1, "Push"),
    (2, 1, "Reset"),
    (1, 1, "Syn"),
    (0, 1, "Fin"),
];

/// Emits the `TCP` subtree for the segment at `offset`, highlighted from
/// `cursor` (the end of the IPv4 layer).
pub fn dissect_tcp(
    ctx: &mut DecodeContext<'_>,
    parent: NodeIndex,
    offset: usize,
    cursor: usize,
) -> Result<TcpLayer, DissectError> {
    let header = parse_tcp_header(ctx.data, offset)?;
    let header_len = header.header_len();
    let at = |start: usize, len: usize| offset + start..offset + start + len;

    let layer = ctx.emit(
        parent,
        "TCP",
        format!(
            "Src Port: {}, Dst Port: {}, Seq: {}, Ack: {}",
            header.source_port,
            header.destination_port,
            header.sequence_number,
            header.acknowledgment_number
        ),
        at(0, header_len),
        cursor,
    )?;

    let source_port = ctx.emit(
        layer,
        "Source Port",
        header.source_port.to_string(),
        at(0, 2),
        cursor,
    )?;
    let destination_port = ctx.emit(
        layer,
        "Destination Port",
        header.destination_port.to_string(),
        at(2, 2),
        ctx.end_of(source_port),
    )?;
    let sequence = ctx.emit(
        layer,
        "Sequence Number",
        header.sequence_number.to_string(),
        at(4, 4),
        ctx.end_of(destination_port),
    )?;
    let acknowledgment = ctx.emit(
        layer,
        "Acknowledgment Number",
        header.acknowledgment_number.to_string(),
        at(8, 4),
        ctx.end_of(sequence),
    )?;

    let flags_cursor = ctx.end_of(acknowledgment);
    ctx.emit(
        layer,
        "Header Length",
        format!("{} bytes ({})", header_len, header.data_offset),
        at(12, 1),
        flags_cursor,
    )?;

    let bits = header.flags.bits();
    let names = header.flags.names();
    let summary = if names.is_empty() {
        format!("0x{:03X}", bits)
    } else {
        format!("0x{:03X} ({})", bits, names.join(", "))
    };
    let flags = ctx.emit(layer, "Flags", summary, at(12, 2), flags_cursor)?;
    for (shift, width, label) in FLAG_FIELDS {
        let set = (bits as u32 >> shift) & ((1 << width) - 1) != 0;
        ctx.emit(
            flags,
            fields::bit_pattern(12, shift, width, bits as u32),
            format!("{label}: {}", fields::set_label(set)),
            at(12, 2),
            flags_cursor,
        )?;
    }

    let window = ctx.emit(
        layer,
        "Window Size Value",
        format!(
            "{} ({})",
            fields::hex(&header.window_size.to_be_bytes()),
            header.window_size
        ),
        at(14, 2),
        ctx.end_of(flags),
    )?;
    let checksum = ctx.emit(
        layer,
        "Checksum",
        fields::hex(&header.checksum.to_be_bytes()),
        at(16, 2),
        ctx.end_of(window),
    )?;
    let urgent = ctx.emit(
        layer,
        "Urgent Pointer",
        format!(
            "{} ({})",
            fields::hex(&header.urgent_pointer.to_be_bytes()),
            header.urgent_pointer
        ),
        at(18, 2),
        ctx.end_of(checksum),
    )?;

    if header_len > MIN_HEADER_LEN {
        let options_cursor = ctx.end_of(urgent);
        dissect_options(
            ctx,
            layer,
            offset + MIN_HEADER_LEN,
            header_len - MIN_HEADER_LEN,
            options_cursor,
        )?;
    }

    Ok(TcpLayer {
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
    let options_node = ctx.emit(layer, "TCP Options", "", start..start + declared, cursor)?;
    let data = ctx.data;
    let mut walker = OptionWalker::new("TCP", data, start, declared, MIN_HEADER_LEN);
    let mut cursor = cursor;

    for option in walker.by_ref() {
        cursor = emit_option(ctx, options_node, &option?, cursor)?;
    }
    walker.finish()
}

fn option_name(kind: u8) -> &'static str {
    match kind {
        tcp_option::END_OF_LIST => "End of Options List",
        tcp_option::NO_OPERATION => "No Operation",
        tcp_option::MAXIMUM_SEGMENT_SIZE => "Maximum Segment Size",
        tcp_option::WINDOW_SCALE => "Window Scale",
        tcp_option::TIMESTAMPS => "Timestamps",
        _ => "Untreated Option",
    }
}

/// Option values decoded when the length matches the kind's fixed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KnownOption {
    MaximumSegmentSize(u16),
    WindowScale(u8),
    Timestamps { value: u32, echo: u32 },
}

impl KnownOption {
    /// Reads the value part of the option at `bytes`, past type and length.
    fn decode(data: &[u8], kind: u8, bytes: &Range<usize>) -> Option<Self> {
        let value_len = bytes.len().checked_sub(2)?;
        let mut reader = Cursor::with_pos(&data[..bytes.end], bytes.start + 2)?;
        match (kind, value_len) {
            (tcp_option::MAXIMUM_SEGMENT_SIZE, 2) => {
                reader.read_u16_be().map(Self::MaximumSegmentSize)
            }
            (tcp_option::WINDOW_SCALE, 1) => reader.read_u8().map(Self::WindowScale),
            (tcp_option::TIMESTAMPS, 8) => Some(Self::Timestamps {
                value: reader.read_u32_be()?,
                echo: reader.read_u32_be()?,
            }),
            _ => None,
        }
    }
}

/// Summary shown on the option node itself.
fn option_summary(data: &[u8], kind: u8, bytes: &Range<usize>) -> String {
    match KnownOption::decode(data, kind, bytes) {
        Some(KnownOption::MaximumSegmentSize(mss)) => format!("{mss} bytes"),
        Some(KnownOption::WindowScale(shift)) => {
            format!("{} (multiply by {})", shift, 1u32 << shift.min(14))
        }
        Some(KnownOption::Timestamps { value, echo }) => format!("TSval {value}, TSecr {echo}"),
        None => format!("{} bytes", bytes.len()),
    }
}

fn emit_option(
    ctx: &mut DecodeContext<'_>,
    options_node: NodeIndex,
    option: &RawOption,
    cursor: usize,
) -> Result<usize, DissectError> {
    let kind = option.kind();
    let bytes = match option {
        RawOption::EndOfList { at } | RawOption::NoOperation { at } => {
            let node = ctx.emit(options_node, option_name(kind), "", option.bytes(), cursor)?;
            options::emit_type(ctx, node, *at, cursor)?;
            return Ok(ctx.end_of(node));
        }
        RawOption::Tlv { bytes, .. } => bytes.clone(),
    };

    let summary = option_summary(ctx.data, kind, &bytes);
    let node = ctx.emit(options_node, option_name(kind), summary, bytes.clone(), cursor)?;
    let value_cursor = options::emit_type_and_length(ctx, node, &bytes, cursor)?;
    let value = bytes.start + 2..bytes.end;

    match KnownOption::decode(ctx.data, kind, &bytes) {
        Some(KnownOption::MaximumSegmentSize(mss)) => {
            ctx.emit(node, "MSS Value", mss.to_string(), value, value_cursor)?;
        }
        Some(KnownOption::WindowScale(shift)) => {
            ctx.emit(node, "Shift Count", shift.to_string(), value, value_cursor)?;
        }
        Some(KnownOption::Timestamps { value: ts_value, echo }) => {
            let split = value.start + 4;
            let ts_node = ctx.emit(
                node,
                "Timestamp Value",
                ts_value.to_string(),
                value.start..split,
                value_cursor,
            )?;
            ctx.emit(
                node,
                "Timestamp Echo Reply",
                echo.to_string(),
                split..value.end,
                ctx.end_of(ts_node),
            )?;
        }
        None => options::emit_data(ctx, node, value, value_cursor)?,
    }

    Ok(ctx.end_of(node))
}
