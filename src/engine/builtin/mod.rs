mod capture;
mod types;

use std::sync::Arc;

use tracing::{debug, warn};

use super::constants::{EtherType, IpProtocol};
use super::context::{DecodeContext, DissectionSession};
use super::error::DissectError;
use super::tree::PacketTree;
use crate::layer::application::http::dissect_http;
use crate::layer::datalink::ethernet::dissect_ethernet;
use crate::layer::network::ipv4::dissect_ipv4;
use crate::layer::transport::tcp::dissect_tcp;
use crate::packet::CapturePacket;
use crate::text::PositionMapper;

pub use self::capture::Capture;
pub use self::types::DissectedPacket;

/// Dissects one packet against the normalized capture `text` it was
/// segmented from. Errors stop the chain but never discard finished layers.
pub fn dissect_packet(
    session: &DissectionSession,
    packet: &CapturePacket,
    text: &str,
) -> DissectedPacket {
    let mut tree = PacketTree::new(
        session,
        packet.label(),
        Arc::clone(&packet.bytes),
        packet.chars.clone(),
    );
    let error = dissect_layers(session, packet, text, &mut tree).err();
    if let Some(err) = &error {
        warn!(packet = packet.index, error = %err, "packet dissection aborted");
    }

    DissectedPacket {
        packet: packet.clone(),
        tree,
        error,
    }
}

fn dissect_layers(
    session: &DissectionSession,
    packet: &CapturePacket,
    text: &str,
    tree: &mut PacketTree,
) -> Result<(), DissectError> {
    let config = session.config();
    if packet.len() > config.max_packet_bytes {
        return Err(DissectError::PacketTooLarge {
            size: packet.len(),
            limit: config.max_packet_bytes,
        });
    }
    if packet.is_empty() {
        debug!(packet = packet.index, "empty packet, nothing to dissect");
        return Ok(());
    }

    let data: &[u8] = &packet.bytes;
    let root = tree.root();
    let mut ctx = DecodeContext::new(session, tree, data, PositionMapper::new(text));

    let ethernet = ctx.layer(|ctx| dissect_ethernet(ctx, root, packet.chars.start))?;
    let ether_type = ethernet.frame.ether_type();
    if ether_type != EtherType::Ipv4 {
        debug!(packet = packet.index, ether_type = ether_type.as_str(), "stopping after Ethernet");
        return Ok(());
    }

    let ipv4 =
        ctx.layer(|ctx| dissect_ipv4(ctx, root, ethernet.payload_offset, ethernet.char_end))?;
    let protocol = ipv4.header.ip_protocol();
    if protocol != IpProtocol::Tcp {
        debug!(packet = packet.index, protocol = protocol.as_str(), "stopping after IPv4");
        return Ok(());
    }

    let tcp = ctx.layer(|ctx| dissect_tcp(ctx, root, ipv4.payload_offset, ipv4.char_end))?;
    if !config.decode_http || tcp.payload_offset >= data.len() {
        return Ok(());
    }

    let http = ctx.layer(|ctx| dissect_http(ctx, root, tcp.payload_offset, tcp.char_end))?;
    if http.is_none() {
        debug!(packet = packet.index, "TCP payload carries no HTTP header block");
    }
    Ok(())
}

#[cfg(test)]
mod tests;
