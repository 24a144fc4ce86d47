use std::ops::Range;

use crate::engine::error::PositionError;

/// Characters one byte occupies in the canonical text: two hex digits and
/// the separator that follows them.
pub const CHARS_PER_BYTE: usize = 3;

/// Maps packet bytes onto character offsets of the normalized text.
///
/// Each line reads `<offset> XX XX ...`, so a byte costs three characters
/// except where a line break and the next offset label sit in between.
#[derive(Debug, Clone, Copy)]
pub struct PositionMapper<'a> {
    text: &'a [u8],
}

impl<'a> PositionMapper<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text: text.as_bytes(),
        }
    }

    fn touches_newline(&self, cursor: usize) -> bool {
        self.text.get(cursor) == Some(&b'\n')
            || (cursor > 0 && self.text.get(cursor - 1) == Some(&b'\n'))
    }

    /// Moves a cursor sitting at the start of the text, on a line break or
    /// right after one, to the first byte token of that line. Any other
    /// cursor is returned unchanged.
    pub fn align(&self, cursor: usize) -> Result<usize, PositionError> {
        if cursor != 0 && !self.touches_newline(cursor) {
            return Ok(cursor);
        }
        let from = cursor.min(self.text.len());
        self.text[from..]
            .iter()
            .position(|&c| c == b' ')
            .map(|space| from + space + 1)
            .ok_or(PositionError::NoByteBoundary { cursor })
    }

    /// Advances an aligned cursor past `count` bytes, re-aligning before
    /// each byte so offset labels are skipped.
    pub fn shift(&self, cursor: usize, count: usize) -> Result<usize, PositionError> {
        let mut cursor = cursor;
        for _ in 0..count {
            cursor = self.align(cursor)?;
            if cursor + 2 > self.text.len() {
                return Err(PositionError::PastEndOfText {
                    cursor,
                    len: self.text.len(),
                });
            }
            cursor = (cursor + CHARS_PER_BYTE).min(self.text.len());
        }
        Ok(cursor)
    }

    /// Highlight span for `count` bytes starting at `cursor`. The start is
    /// aligned so a span never begins on an offset label.
    pub fn span(&self, cursor: usize, count: usize) -> Result<Range<usize>, PositionError> {
        if count == 0 {
            return Ok(cursor..cursor);
        }
        let start = self.align(cursor)?;
        let end = self.shift(start, count)?;
        Ok(start..end)
    }
}
