use super::normalize::TraceLine;
use crate::packet::CapturePacket;

/// Groups normalized lines into packets. A line with offset 0 closes the
/// packet accumulated so far; the last packet is always emitted, so empty
/// input still yields a single zero-length `Packet 0`.
pub fn segment(lines: &[TraceLine]) -> Vec<CapturePacket> {
    let mut packets = Vec::new();
    let mut start = 0;
    let mut end = 0;
    let mut bytes = Vec::new();

    for line in lines {
        if line.offset == 0 && start != end {
            let index = packets.len();
            packets.push(CapturePacket::new(index, std::mem::take(&mut bytes), start..end));
            start = end;
        }
        bytes.extend_from_slice(&line.bytes);
        // +1 for the line break joining canonical lines
        end += line.text.len() + 1;
    }

    // the final line has no trailing break
    let end = end.saturating_sub(1).max(start);
    let index = packets.len();
    packets.push(CapturePacket::new(index, bytes, start..end));
    packets
}
