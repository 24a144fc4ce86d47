pub mod owned;

pub use owned::CapturePacket;
