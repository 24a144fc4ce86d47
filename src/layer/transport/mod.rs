//! The transport layer (Layer 4): TCP with options.

pub mod tcp;
