//! The network layer (Layer 3): IPv4 with options.

pub mod ipv4;
