//! hexsect
//!
//! Loads a textual hex-dump capture and prints its dissection forest.

use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use hexsect::engine::export;
use hexsect::engine::NodeIndex;
use hexsect::{Capture, DissectConfig, DissectionSession, PacketTree};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hexsect")]
#[command(about = "Dissect a hex-dump capture into Ethernet/IPv4/TCP/HTTP fields", long_about = None)]
struct Args {
    /// Capture file: lines of `<hex offset> <hex byte> ...`
    file: PathBuf,

    /// Print the JSON export instead of the tree
    #[arg(long)]
    json: bool,

    /// Single-line JSON (with --json)
    #[arg(long, requires = "json")]
    compact: bool,

    /// Print a hex dump of each packet before its tree
    #[arg(long)]
    hexdump: bool,

    /// Packets dissected in parallel
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Stop after TCP
    #[arg(long)]
    no_http: bool,

    /// Log layer decisions (debug level)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let raw = fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read capture {}", args.file.display()))?;

    let session = DissectionSession::with_config(DissectConfig {
        decode_http: !args.no_http,
        workers: args.workers.max(1),
        ..DissectConfig::default()
    });
    let capture = Capture::load(&raw, &session);

    if !capture.skipped.is_empty() {
        warn!(count = capture.skipped.len(), "some capture lines were skipped");
    }

    if args.json {
        export::write_json(io::stdout().lock(), &capture.export(), !args.compact)
            .context("Failed to write JSON export")?;
        return Ok(());
    }

    for dissected in &capture.packets {
        if args.hexdump {
            println!("{}", dissected.packet);
        }
        display_tree(&dissected.tree);
        if let Some(err) = &dissected.error {
            println!("  !! {err}");
        }
        println!();
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "hexsect=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn display_tree(tree: &PacketTree) {
    let root = tree.root_node();
    println!(
        "{} {} [{} bytes, chars {}..{}]",
        root.id,
        root.field,
        root.size,
        root.chars.start,
        root.chars.end
    );
    let children = tree.children(tree.root());
    for (i, child) in children.iter().enumerate() {
        display_node(tree, *child, "", i + 1 == children.len());
    }
}

fn display_node(tree: &PacketTree, index: NodeIndex, prefix: &str, is_last: bool) {
    let connector = if is_last { "└─" } else { "├─" };
    let extension = if is_last { "  " } else { "│ " };
    let node = tree.node(index);

    let label = match (node.field.is_empty(), node.value.is_empty()) {
        (true, _) => node.value.clone(),
        (false, true) => node.field.clone(),
        (false, false) => format!("{}: {}", node.field, node.value),
    };
    println!(
        "{prefix}{connector} {} {label} [{} bytes, chars {}..{}]",
        node.id, node.size, node.chars.start, node.chars.end
    );

    let child_prefix = format!("{prefix}{extension}");
    let children = tree.children(index);
    for (i, child) in children.iter().enumerate() {
        display_node(tree, *child, &child_prefix, i + 1 == children.len());
    }
}
