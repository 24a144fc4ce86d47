//! The length-prefixed option loop shared by IPv4 and TCP.
//!
//! Kind 0 ends the list, kind 1 is a single padding byte, every other kind
//! is `kind, length, value[length - 2]`. The walk must stop exactly at the
//! declared options length.

use std::ops::Range;

use tracing::trace;

use crate::engine::context::DecodeContext;
use crate::engine::error::DissectError;
use crate::engine::tree::NodeIndex;
use crate::layer::fields;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawOption {
    EndOfList { at: usize },
    NoOperation { at: usize },
    Tlv { kind: u8, bytes: Range<usize> },
}

impl RawOption {
    pub fn kind(&self) -> u8 {
        match self {
            Self::EndOfList { .. } => 0,
            Self::NoOperation { .. } => 1,
            Self::Tlv { kind, .. } => *kind,
        }
    }

    /// Bytes of the whole option, type byte included.
    pub fn bytes(&self) -> Range<usize> {
        match self {
            Self::EndOfList { at } | Self::NoOperation { at } => *at..*at + 1,
            Self::Tlv { bytes, .. } => bytes.clone(),
        }
    }
}

#[derive(Debug)]
pub struct OptionWalker<'a> {
    protocol: &'static str,
    data: &'a [u8],
    start: usize,
    declared: usize,
    /// Fixed header bytes preceding the options, used in error messages.
    fixed_len: usize,
    consumed: usize,
    finished: bool,
}

impl<'a> OptionWalker<'a> {
    pub fn new(
        protocol: &'static str,
        data: &'a [u8],
        start: usize,
        declared: usize,
        fixed_len: usize,
    ) -> Self {
        Self {
            protocol,
            data,
            start,
            declared,
            fixed_len,
            consumed: 0,
            finished: false,
        }
    }

    fn insufficient(&self, needed: usize) -> DissectError {
        DissectError::InsufficientBytes {
            protocol: self.protocol,
            needed,
            available: self.data.len(),
        }
    }

    fn step(&mut self) -> Result<RawOption, DissectError> {
        let at = self.start + self.consumed;
        let kind = *self.data.get(at).ok_or_else(|| self.insufficient(at + 1))?;
        match kind {
            0 => {
                self.consumed += 1;
                self.finished = true;
                Ok(RawOption::EndOfList { at })
            }
            1 => {
                self.consumed += 1;
                Ok(RawOption::NoOperation { at })
            }
            _ => {
                let length = *self
                    .data
                    .get(at + 1)
                    .ok_or_else(|| self.insufficient(at + 2))? as usize;
                if length < 2 {
                    return Err(DissectError::InvalidOptionLength {
                        protocol: self.protocol,
                        kind,
                        length,
                    });
                }
                if at + length > self.data.len() {
                    return Err(self.insufficient(at + length));
                }
                self.consumed += length;
                Ok(RawOption::Tlv {
                    kind,
                    bytes: at..at + length,
                })
            }
        }
    }

    /// Checks the walk ended exactly on the declared header length.
    pub fn finish(&self) -> Result<(), DissectError> {
        if self.consumed != self.declared {
            return Err(DissectError::OptionsMismatch {
                protocol: self.protocol,
                declared: self.fixed_len + self.declared,
                found: self.fixed_len + self.consumed,
            });
        }
        Ok(())
    }
}

impl Iterator for OptionWalker<'_> {
    type Item = Result<RawOption, DissectError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.consumed >= self.declared {
            return None;
        }
        let item = self.step();
        match &item {
            Ok(option) => trace!(protocol = self.protocol, kind = option.kind(), bytes = ?option.bytes(), "option"),
            Err(_) => self.finished = true,
        }
        Some(item)
    }
}

/// Emits the `Type` child of an option and returns the cursor after it.
pub fn emit_type(
    ctx: &mut DecodeContext<'_>,
    option_node: NodeIndex,
    at: usize,
    cursor: usize,
) -> Result<usize, DissectError> {
    let kind = ctx.data[at];
    let node = ctx.emit(
        option_node,
        "Type",
        format!("{} ({})", fields::hex(&[kind]), kind),
        at..at + 1,
        cursor,
    )?;
    Ok(ctx.end_of(node))
}

/// Emits `Type` and `Length` children of a length-prefixed option and
/// returns the cursor after the length byte.
pub fn emit_type_and_length(
    ctx: &mut DecodeContext<'_>,
    option_node: NodeIndex,
    bytes: &Range<usize>,
    cursor: usize,
) -> Result<usize, DissectError> {
    let cursor = emit_type(ctx, option_node, bytes.start, cursor)?;
    let length = ctx.data[bytes.start + 1];
    let node = ctx.emit(
        option_node,
        "Length",
        format!("{} ({} bytes)", fields::hex(&[length]), length),
        bytes.start + 1..bytes.start + 2,
        cursor,
    )?;
    Ok(ctx.end_of(node))
}

/// Emits the undecoded remainder of an option as a hex `Data` child.
pub fn emit_data(
    ctx: &mut DecodeContext<'_>,
    node: NodeIndex,
    value: Range<usize>,
    cursor: usize,
) -> Result<(), DissectError> {
    if value.is_empty() {
        return Ok(());
    }
    let hex = fields::hex(&ctx.data[value.clone()]);
    ctx.emit(node, "Data", hex, value, cursor)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(data: &[u8], declared: usize) -> (Vec<RawOption>, Result<(), DissectError>) {
        let mut walker = OptionWalker::new("TCP", data, 0, declared, 20);
        let mut options = Vec::new();
        for option in walker.by_ref() {
            match option {
                Ok(option) => options.push(option),
                Err(err) => return (options, Err(err)),
            }
        }
        let done = walker.finish();
        (options, done)
    }

    #[test]
    fn walks_nop_padding_and_tlv() {
        let data = [0x01, 0x01, 0x08, 0x0a, 0, 0, 0, 1, 0, 0, 0, 2];
        let (options, done) = walk(&data, 12);
        assert_eq!(done, Ok(()));
        assert_eq!(
            options,
            vec![
                RawOption::NoOperation { at: 0 },
                RawOption::NoOperation { at: 1 },
                RawOption::Tlv {
                    kind: 8,
                    bytes: 2..12
                },
            ]
        );
    }

    #[test]
    fn end_of_list_must_be_the_last_byte() {
        let (options, done) = walk(&[0x01, 0x00, 0x00, 0x00], 4);
        assert_eq!(options.len(), 2);
        assert_eq!(
            done,
            Err(DissectError::OptionsMismatch {
                protocol: "TCP",
                declared: 24,
                found: 22
            })
        );

        let (_, done) = walk(&[0x01, 0x01, 0x01, 0x00], 4);
        assert_eq!(done, Ok(()));
    }

    #[test]
    fn overrunning_option_is_a_mismatch() {
        // MSS claims 4 bytes but only 2 are declared as options
        let (options, done) = walk(&[0x02, 0x04, 0x05, 0xb4], 2);
        assert_eq!(options.len(), 1);
        assert!(matches!(done, Err(DissectError::OptionsMismatch { declared: 22, found: 24, .. })));
    }

    #[test]
    fn zero_length_option_is_rejected() {
        let (_, done) = walk(&[0x05, 0x00, 0x00, 0x00], 4);
        assert_eq!(
            done,
            Err(DissectError::InvalidOptionLength {
                protocol: "TCP",
                kind: 5,
                length: 0
            })
        );
    }
}
