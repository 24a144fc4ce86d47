//! The datalink layer (Layer 2): Ethernet II framing.

pub mod ethernet;
