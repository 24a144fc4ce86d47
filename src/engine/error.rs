use thiserror::Error;

/// Why a single capture line was dropped during normalization.
///
/// Skipped lines never abort the capture; they are collected next to the
/// normalized output so callers can report them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("offset token `{token}` is not a hexadecimal number")]
    InvalidOffset { token: String },
    #[error("expected {expected} bytes, got {found}")]
    MissingBytes { expected: usize, found: usize },
    #[error("next line offset {next:#x} is lower than offset {offset:#x}")]
    OffsetRegression { offset: usize, next: usize },
}

/// Failure to map a packet byte onto the normalized text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("no byte boundary after character {cursor}; capture text is truncated")]
    NoByteBoundary { cursor: usize },
    #[error("byte at character {cursor} lies past the end of the text ({len} characters)")]
    PastEndOfText { cursor: usize, len: usize },
}

/// Fatal, packet-level dissection failure. Layers built before the failing
/// one stay in the packet tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DissectError {
    #[error("{protocol} header must be at least {minimum} bytes, got {found}")]
    HeaderTooShort {
        protocol: &'static str,
        minimum: usize,
        found: usize,
    },
    #[error("{protocol}: needed {needed} bytes, only {available} available")]
    InsufficientBytes {
        protocol: &'static str,
        needed: usize,
        available: usize,
    },
    #[error(
        "{protocol} header length ({declared}) did not coincide with end of options list (found at byte {found})"
    )]
    OptionsMismatch {
        protocol: &'static str,
        declared: usize,
        found: usize,
    },
    #[error("{protocol} option {kind} declares invalid length {length}")]
    InvalidOptionLength {
        protocol: &'static str,
        kind: u8,
        length: usize,
    },
    #[error("packet of {size} bytes exceeds the {limit} byte limit")]
    PacketTooLarge { size: usize, limit: usize },
    #[error(transparent)]
    Position(#[from] PositionError),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
