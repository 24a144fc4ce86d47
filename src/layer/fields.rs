//! Display helpers shared by the dissectors.

use std::net::Ipv4Addr;

/// `AA:BB:CC:DD:EE:FF`
pub fn mac(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// `0x` followed by the bytes as uppercase hex digits.
pub fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for b in bytes {
        out.push_str(&format!("{:02X}", b));
    }
    out
}

pub fn ipv4(bytes: &[u8]) -> Option<Ipv4Addr> {
    let octets: [u8; 4] = bytes.try_into().ok()?;
    Some(Ipv4Addr::from(octets))
}

pub fn set_label(set: bool) -> &'static str {
    if set { "Set" } else { "Not set" }
}

/// Renders the bits `shift..shift + bits` of a `width`-bit word, everything
/// else as dots, in groups of four from the most significant bit:
/// `bit_pattern(16, 14, 1, 0x4000)` gives `.1.. .... .... ....`.
pub fn bit_pattern(width: u32, shift: u32, bits: u32, value: u32) -> String {
    let mut out = String::with_capacity((width + width / 4) as usize);
    for position in 0..width {
        if position > 0 && position % 4 == 0 {
            out.push(' ');
        }
        let bit = width - 1 - position;
        if bit >= shift && bit < shift + bits {
            out.push(if (value >> bit) & 1 == 1 { '1' } else { '0' });
        } else {
            out.push('.');
        }
    }
    out
}
