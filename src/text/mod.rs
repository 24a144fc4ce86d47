//! Text side of the pipeline: turning a pasted hex dump into canonical
//! lines, cutting those lines into packets, and mapping packet bytes back
//! to character offsets in the canonical text.

pub mod normalize;
pub mod position;
pub mod segment;

pub use normalize::{LineOutcome, NormalizedText, SkippedLine, TraceLine, classify_lines, normalize};
pub use position::PositionMapper;
pub use segment::segment;
