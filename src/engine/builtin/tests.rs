use std::collections::HashSet;
use std::sync::atomic::AtomicBool;

use super::*;
use crate::engine::context::DissectConfig;
use crate::engine::export::{self, ExportNode};
use crate::engine::tree::{NodeId, NodeIndex};

const HTTP_GET: &str = include_str!("../../../tests/fixtures/http_get.txt");

/// Formats bytes the way a capture tool prints them, 16 per line.
fn to_trace(bytes: &[u8]) -> String {
    bytes
        .chunks(16)
        .enumerate()
        .map(|(i, chunk)| {
            let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
            format!("{:04x}  {}", i * 16, hex.join(" "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn ipv4_frame(ihl: u8, options: &[u8]) -> Vec<u8> {
    let mut frame = vec![
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, // dst mac
        0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, // src mac
        0x08, 0x00, // ipv4
        0x40 | ihl, 0x00, 0x00, 0x20, // version/ihl, tos, total length
        0x00, 0x01, 0x40, 0x00, // id, flags
        64, 17, 0x00, 0x00, // ttl, udp, checksum
        10, 0, 0, 1, // src ip
        10, 0, 0, 2, // dst ip
    ];
    frame.extend_from_slice(options);
    frame.extend_from_slice(&[0x14, 0xe9, 0x14, 0xe9, 0x00, 0x08, 0x00, 0x00]);
    frame
}

fn tcp_frame(options: &[u8]) -> Vec<u8> {
    let mut frame = ipv4_frame(5, &[]);
    frame.truncate(34);
    frame[23] = 6; // tcp
    let data_offset = (5 + options.len() / 4) as u8;
    frame.extend_from_slice(&[
        0x04, 0xd2, 0x00, 0x50, // ports 1234 -> 80
        0x00, 0x00, 0x00, 0x01, // seq
        0x00, 0x00, 0x00, 0x00, // ack
        data_offset << 4, 0x02, // SYN
        0xff, 0xff, 0x00, 0x00, // window, checksum
        0x00, 0x00, // urgent pointer
    ]);
    frame.extend_from_slice(options);
    frame
}

fn load_frame(frame: &[u8]) -> Capture {
    let capture = Capture::load(&to_trace(frame), &DissectionSession::new());
    assert!(capture.packets[0].is_complete(), "{:?}", capture.packets[0].error);
    capture
}

fn child(tree: &PacketTree, parent: NodeIndex, field: &str) -> NodeIndex {
    tree.child_named(parent, field)
        .unwrap_or_else(|| panic!("missing `{field}`"))
}

fn fields_of(tree: &PacketTree, parent: NodeIndex) -> Vec<&str> {
    tree.children(parent)
        .iter()
        .map(|index| tree.node(*index).field.as_str())
        .collect()
}

#[test]
fn fixture_segments_into_three_packets() {
    let session = DissectionSession::new();
    let capture = Capture::load(HTTP_GET, &session);

    assert!(capture.skipped.is_empty());
    assert!(!capture.cancelled);
    let spans: Vec<_> = capture
        .packets
        .iter()
        .map(|p| (p.packet.len(), p.packet.chars.clone()))
        .collect();
    assert_eq!(spans, vec![(113, 0..379), (50, 379..549), (42, 549..689)]);
    assert_eq!(capture.text.len(), 689);
    assert!(capture.packets.iter().all(DissectedPacket::is_complete));
}

#[test]
fn http_get_chains_every_layer() {
    let session = DissectionSession::new();
    let capture = Capture::load(HTTP_GET, &session);
    let tree = &capture.packets[0].tree;
    let root = tree.root();

    assert_eq!(tree.root_node().field, "Packet 0");
    assert_eq!(fields_of(tree, root), vec!["Ethernet II", "IPv4", "TCP", "HTTP"]);

    let ethernet = child(tree, root, "Ethernet II");
    assert_eq!(fields_of(tree, ethernet), vec!["Dst MAC", "Src MAC", "Type"]);
    assert_eq!(tree.node(ethernet).chars, 5..47);
    let dst = child(tree, ethernet, "Dst MAC");
    assert_eq!(tree.node(dst).value, "00:1A:2B:3C:4D:5E");
    assert_eq!(tree.node(dst).chars, 5..23);
    let ether_type = child(tree, ethernet, "Type");
    assert_eq!(tree.node(ether_type).value, "IPv4 (0x0800)");
    assert_eq!(tree.node(ether_type).chars, 41..47);

    let ipv4 = child(tree, root, "IPv4");
    assert_eq!(tree.node(ipv4).chars, 47..117);
    assert_eq!(tree.node(ipv4).size, 20);
    assert!(tree.child_named(ipv4, "IP Options").is_none());
    let protocol = child(tree, ipv4, "Protocol");
    assert_eq!(tree.node(protocol).value, "0x06 (TCP/6)");
    assert_eq!(tree.node(child(tree, ipv4, "Destination IP")).value, "93.184.216.34");
}

#[test]
fn tcp_layer_decodes_flags_and_timestamps() {
    let session = DissectionSession::new();
    let capture = Capture::load(HTTP_GET, &session);
    let tree = &capture.packets[0].tree;
    let tcp = child(tree, tree.root(), "TCP");

    assert_eq!(tree.node(tcp).chars, 117..223);
    assert_eq!(tree.node(tcp).size, 32);
    assert_eq!(
        tree.node(tcp).value,
        "Src Port: 51234, Dst Port: 80, Seq: 1000, Ack: 2000"
    );
    assert_eq!(tree.node(child(tree, tcp, "Header Length")).value, "32 bytes (8)");
    assert_eq!(tree.node(child(tree, tcp, "Window Size Value")).value, "0x1000 (4096)");

    let flags = child(tree, tcp, "Flags");
    assert_eq!(tree.node(flags).value, "0x018 (ACK, PSH)");
    let values: Vec<&str> = tree
        .children(flags)
        .iter()
        .map(|index| tree.node(*index).value.as_str())
        .collect();
    assert_eq!(values.len(), 10);
    assert!(values.contains(&"Acknowledgment: Set"));
    assert!(values.contains(&"Push: Set"));
    assert!(values.contains(&"Syn: Not set"));
    let ack = tree.children(flags)[5];
    assert_eq!(tree.node(ack).field, ".... ...1 ....");

    let options = child(tree, tcp, "TCP Options");
    assert_eq!(tree.node(options).chars, 182..223);
    assert_eq!(
        fields_of(tree, options),
        vec!["No Operation", "No Operation", "Timestamps"]
    );
    let timestamps = child(tree, options, "Timestamps");
    assert_eq!(tree.node(timestamps).value, "TSval 1, TSecr 2");
    assert_eq!(
        fields_of(tree, timestamps),
        vec!["Type", "Length", "Timestamp Value", "Timestamp Echo Reply"]
    );
}

#[test]
fn http_lines_are_unnamed_children() {
    let session = DissectionSession::new();
    let capture = Capture::load(HTTP_GET, &session);
    let tree = &capture.packets[0].tree;
    let http = child(tree, tree.root(), "HTTP");

    assert_eq!(tree.node(http).size, 47);
    assert_eq!(tree.node(http).chars, 223..379);
    let lines: Vec<(&str, &str, usize)> = tree
        .children(http)
        .iter()
        .map(|index| {
            let node = tree.node(*index);
            (node.field.as_str(), node.value.as_str(), node.size)
        })
        .collect();
    assert_eq!(
        lines,
        vec![
            ("", "GET /index.html HTTP/1.1", 26),
            ("", "Host: example.com", 19),
        ]
    );
    let host = tree.children(http)[1];
    assert_eq!(tree.node(host).chars, 306..368);
}

#[test]
fn ipv4_header_length_six_has_one_four_byte_option() {
    let session = DissectionSession::new();
    let capture = Capture::load(HTTP_GET, &session);
    let tree = &capture.packets[1].tree;
    let ipv4 = child(tree, tree.root(), "IPv4");

    let options = child(tree, ipv4, "IP Options");
    assert_eq!(tree.node(options).size, 4);
    assert_eq!(tree.node(options).chars, 496..508);
    assert_eq!(tree.children(options).len(), 1);

    let option = tree.children(options)[0];
    assert_eq!(tree.node(option).field, "Untreated Option");
    assert_eq!(tree.node(option).size, 4);
    assert_eq!(fields_of(tree, option), vec!["Type", "Length", "Data"]);

    // UDP is not dissected further
    assert_eq!(fields_of(tree, tree.root()), vec!["Ethernet II", "IPv4"]);
}

#[test]
fn arp_stops_after_ethernet() {
    let session = DissectionSession::new();
    let capture = Capture::load(HTTP_GET, &session);
    let tree = &capture.packets[2].tree;

    assert_eq!(fields_of(tree, tree.root()), vec!["Ethernet II"]);
    assert_eq!(tree.len(), 5);
    let ethernet = child(tree, tree.root(), "Ethernet II");
    assert_eq!(tree.node(child(tree, ethernet, "Type")).value, "ARP (0x0806)");
}

#[test]
fn ids_are_unique_across_packets() {
    let session = DissectionSession::new();
    let capture = Capture::load(HTTP_GET, &session);

    let ids: HashSet<_> = capture
        .packets
        .iter()
        .flat_map(|p| p.tree.walk().into_iter().map(|(_, index)| p.tree.node(index).id))
        .collect();
    let total: usize = capture.packets.iter().map(|p| p.tree.len()).sum();
    assert_eq!(ids.len(), total);
    assert_eq!(session.issued(), total as u64);
}

#[test]
fn highlight_looks_nodes_up_by_id() {
    let session = DissectionSession::new();
    let capture = Capture::load(HTTP_GET, &session);
    let tree = &capture.packets[0].tree;
    let tcp = child(tree, tree.root(), "TCP");
    let source_port = tree.node(child(tree, tcp, "Source Port"));

    assert_eq!(source_port.value, "51234");
    assert_eq!(capture.highlight(source_port.id), Some(117..123));
    assert_eq!(capture.highlighted_text(source_port.id), Some("c8 22 "));

    let (packet, node) = capture.find(source_port.id).expect("id was issued");
    assert_eq!(packet.packet.index, 0);
    assert_eq!(node.field, "Source Port");
    assert!(capture.highlight(NodeId(u64::MAX)).is_none());
}

#[test]
fn two_line_example_gives_two_short_packets() {
    let session = DissectionSession::new();
    let capture = Capture::load("00 AA BB\n00 CC DD", &session);

    assert_eq!(capture.packets.len(), 2);
    for packet in &capture.packets {
        assert_eq!(packet.packet.len(), 2);
        // too short for Ethernet, only the packet root remains
        assert_eq!(packet.tree.len(), 1);
        assert!(matches!(
            packet.error,
            Some(DissectError::InsufficientBytes { protocol: "Ethernet", .. })
        ));
    }
    assert_eq!(capture.failed().count(), 2);
}

#[test]
fn options_mismatch_rolls_back_the_layer() {
    // a 4-byte options area holding an 8-byte option
    let frame = ipv4_frame(6, &[0x94, 0x08, 0, 0]);
    let session = DissectionSession::new();
    let capture = Capture::load(&to_trace(&frame), &session);
    let packet = &capture.packets[0];

    assert_eq!(
        packet.error,
        Some(DissectError::OptionsMismatch {
            protocol: "IPv4",
            declared: 24,
            found: 28
        })
    );
    assert_eq!(fields_of(&packet.tree, packet.tree.root()), vec!["Ethernet II"]);
    assert_eq!(packet.tree.len(), 5);
}

#[test]
fn padding_after_end_of_list_is_a_mismatch() {
    let frame = ipv4_frame(6, &[0, 0, 0, 0]);
    let session = DissectionSession::new();
    let capture = Capture::load(&to_trace(&frame), &session);

    assert_eq!(
        capture.packets[0].error,
        Some(DissectError::OptionsMismatch {
            protocol: "IPv4",
            declared: 24,
            found: 21
        })
    );
}

#[test]
fn short_ipv4_header_is_fatal() {
    let frame = ipv4_frame(4, &[]);
    let session = DissectionSession::new();
    let capture = Capture::load(&to_trace(&frame), &session);

    assert_eq!(
        capture.packets[0].error,
        Some(DissectError::HeaderTooShort {
            protocol: "IPv4",
            minimum: 20,
            found: 16
        })
    );
}

#[test]
fn http_can_be_switched_off() {
    let session = DissectionSession::with_config(DissectConfig {
        decode_http: false,
        ..DissectConfig::default()
    });
    let capture = Capture::load(HTTP_GET, &session);
    let tree = &capture.packets[0].tree;
    assert_eq!(fields_of(tree, tree.root()), vec!["Ethernet II", "IPv4", "TCP"]);
}

#[test]
fn oversized_packets_are_rejected() {
    let session = DissectionSession::with_config(DissectConfig {
        max_packet_bytes: 64,
        ..DissectConfig::default()
    });
    let capture = Capture::load(HTTP_GET, &session);

    assert_eq!(
        capture.packets[0].error,
        Some(DissectError::PacketTooLarge {
            size: 113,
            limit: 64
        })
    );
    assert_eq!(capture.packets[0].tree.len(), 1);
    assert!(capture.packets[1].is_complete());
}

#[test]
fn malformed_lines_are_skipped_not_fatal() {
    let raw = "0000 aa bb\n0010 cc dd\n";
    let session = DissectionSession::new();
    let capture = Capture::load(raw, &session);

    assert_eq!(capture.skipped.len(), 1);
    assert_eq!(capture.skipped[0].line_number, 1);
    assert_eq!(capture.packets.len(), 1);
    assert_eq!(capture.packets[0].packet.len(), 2);
}

#[test]
fn cancellation_keeps_a_prefix() {
    let session = DissectionSession::new();
    let cancel = AtomicBool::new(true);
    let capture = Capture::load_with_cancel(HTTP_GET, &session, &cancel);

    assert!(capture.cancelled);
    assert!(capture.packets.is_empty());
    assert_eq!(session.issued(), 0);
}

#[test]
fn parallel_load_matches_sequential() {
    let sequential = Capture::load(HTTP_GET, &DissectionSession::new());
    let session = DissectionSession::with_config(DissectConfig {
        workers: 3,
        ..DissectConfig::default()
    });
    let parallel = Capture::load(HTTP_GET, &session);

    assert_eq!(parallel.export(), sequential.export());
    let ids: HashSet<_> = parallel
        .packets
        .iter()
        .flat_map(|p| p.tree.walk().into_iter().map(|(_, index)| p.tree.node(index).id))
        .collect();
    assert_eq!(ids.len() as u64, session.issued());
}

#[test]
fn export_round_trips() {
    let session = DissectionSession::new();
    let capture = Capture::load(HTTP_GET, &session);
    let exported = capture.export();

    let json = export::to_json(&exported, false).expect("serializes");
    let back: Vec<ExportNode> = export::from_json(&json).expect("parses");
    assert_eq!(back, exported);

    let http = &back[0].children[3];
    assert_eq!(http.field, "HTTP");
    assert!(http.value.is_empty());
    assert_eq!(http.children[0].field, "");
    assert_eq!(http.children[0].value, "GET /index.html HTTP/1.1");
    assert!(http.children[0].children.is_empty());
    assert!(!json.contains("\"Children\":[]"));
}

#[test]
fn dissect_packet_keeps_the_packet() {
    let session = DissectionSession::new();
    let frame = ipv4_frame(5, &[]);
    let text = crate::text::normalize(&to_trace(&frame)).text();
    let packet = CapturePacket::new(0, frame.clone(), 0..text.len());

    let dissected = dissect_packet(&session, &packet, &text);
    assert!(dissected.is_complete());
    assert_eq!(&*dissected.packet.bytes, frame.as_slice());
    assert_eq!(Arc::strong_count(&packet.bytes), 3);
}

#[test]
fn record_route_lists_addresses() {
    let capture = load_frame(&ipv4_frame(7, &[7, 7, 4, 1, 2, 3, 4, 0]));
    let tree = &capture.packets[0].tree;
    let ipv4 = child(tree, tree.root(), "IPv4");
    let options = child(tree, ipv4, "IP Options");

    assert_eq!(fields_of(tree, options), vec!["Record Route", "End of Options List"]);
    let route = child(tree, options, "Record Route");
    assert_eq!(tree.node(route).value, "7 bytes");
    assert_eq!(
        fields_of(tree, route),
        vec!["Type", "Length", "Pointer", "Recorded Route"]
    );
    assert_eq!(tree.node(child(tree, route, "Pointer")).value, "4");

    let address = tree.node(child(tree, route, "Recorded Route"));
    assert_eq!(address.value, "1.2.3.4");
    assert_eq!(address.size, 4);
    assert_eq!(capture.highlighted_text(address.id), Some("01 02 03 04 "));
}

#[test]
fn source_route_options_share_the_route_layout() {
    for (kind, name) in [(131, "Loose Source Route"), (137, "Strict Source Route")] {
        let capture = load_frame(&ipv4_frame(7, &[kind, 7, 4, 10, 0, 0, 9, 1]));
        let tree = &capture.packets[0].tree;
        let options = child(tree, child(tree, tree.root(), "IPv4"), "IP Options");

        assert_eq!(fields_of(tree, options), vec![name, "No Operation"]);
        let route = child(tree, options, name);
        assert_eq!(
            fields_of(tree, route),
            vec!["Type", "Length", "Pointer", "Source Route"]
        );
        assert_eq!(tree.node(child(tree, route, "Source Route")).value, "10.0.0.9");
    }
}

#[test]
fn timestamp_option_splits_pointer_and_flags() {
    let capture = load_frame(&ipv4_frame(7, &[68, 8, 5, 0x01, 0, 0, 0, 0]));
    let tree = &capture.packets[0].tree;
    let options = child(tree, child(tree, tree.root(), "IPv4"), "IP Options");
    let stamp = child(tree, options, "Time Stamp");

    assert_eq!(
        fields_of(tree, stamp),
        vec!["Type", "Length", "Pointer", "Overflow/Flag", "Data"]
    );
    assert_eq!(tree.node(child(tree, stamp, "Pointer")).value, "5");
    assert_eq!(
        tree.node(child(tree, stamp, "Overflow/Flag")).value,
        "Overflow: 0, Flag: 1"
    );
    assert_eq!(tree.node(child(tree, stamp, "Data")).value, "0x00000000");
}

#[test]
fn tcp_mss_and_window_scale_get_value_children() {
    let capture = load_frame(&tcp_frame(&[2, 4, 0x05, 0xb4, 1, 3, 3, 7]));
    let tree = &capture.packets[0].tree;
    assert_eq!(fields_of(tree, tree.root()), vec!["Ethernet II", "IPv4", "TCP"]);
    let tcp = child(tree, tree.root(), "TCP");
    assert_eq!(tree.node(child(tree, tcp, "Flags")).value, "0x002 (SYN)");

    let options = child(tree, tcp, "TCP Options");
    assert_eq!(
        fields_of(tree, options),
        vec!["Maximum Segment Size", "No Operation", "Window Scale"]
    );

    let mss = child(tree, options, "Maximum Segment Size");
    assert_eq!(tree.node(mss).value, "1460 bytes");
    assert_eq!(fields_of(tree, mss), vec!["Type", "Length", "MSS Value"]);
    let mss_value = tree.node(child(tree, mss, "MSS Value"));
    assert_eq!(mss_value.value, "1460");
    assert_eq!(capture.highlighted_text(mss_value.id), Some("05 b4 "));

    let scale = child(tree, options, "Window Scale");
    assert_eq!(tree.node(scale).value, "7 (multiply by 128)");
    assert_eq!(tree.node(child(tree, scale, "Shift Count")).value, "7");
}
