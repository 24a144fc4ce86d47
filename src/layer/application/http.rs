//! Plain-text HTTP header block on top of a TCP payload.

use std::ops::Range;

use crate::engine::context::DecodeContext;
use crate::engine::error::DissectError;
use crate::engine::tree::NodeIndex;

const CRLF: &[u8] = b"\r\n";
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Position of the first `CR LF CR LF` in `payload`.
pub fn find_header_end(payload: &[u8]) -> Option<usize> {
    payload
        .windows(HEADER_TERMINATOR.len())
        .position(|window| window == HEADER_TERMINATOR)
}

/// Line ranges of the header block, relative to `payload`. Each range keeps
/// its trailing `CR LF`; the blank terminating line is not included.
pub fn header_lines(payload: &[u8], end: usize) -> Vec<Range<usize>> {
    let block = &payload[..end + CRLF.len()];
    let mut lines = Vec::new();
    let mut start = 0;
    while start < block.len() {
        let line_end = block[start..]
            .windows(CRLF.len())
            .position(|window| window == CRLF)
            .map_or(block.len(), |at| start + at + CRLF.len());
        lines.push(start..line_end);
        start = line_end;
    }
    lines
}

/// Emits an `HTTP` node with one unnamed child per header line, or returns
/// `None` when the payload carries no complete header block.
pub fn dissect_http(
    ctx: &mut DecodeContext<'_>,
    parent: NodeIndex,
    offset: usize,
    cursor: usize,
) -> Result<Option<NodeIndex>, DissectError> {
    let data = ctx.data;
    let payload = data.get(offset..).unwrap_or_default();
    let Some(end) = find_header_end(payload) else {
        return Ok(None);
    };

    let block_len = end + HEADER_TERMINATOR.len();
    let http = ctx.emit(parent, "HTTP", "", offset..offset + block_len, cursor)?;

    let mut line_cursor = cursor;
    for line in header_lines(payload, end) {
        let text_end = line.end.saturating_sub(CRLF.len()).max(line.start);
        let text: String = payload[line.start..text_end]
            .iter()
            .map(|b| *b as char)
            .collect();
        let node = ctx.emit(
            http,
            "",
            text,
            offset + line.start..offset + line.end,
            line_cursor,
        )?;
        line_cursor = ctx.end_of(node);
    }

    Ok(Some(http))
}
