//! Protocol dissectors, one module per layer, chained by the engine.

pub mod application; // Layer 7 - HTTP
pub mod datalink; // Layer 2 - Ethernet frames
pub mod fields;
pub mod network; // Layer 3 - IPv4
pub mod options;
pub mod transport; // Layer 4 - TCP
