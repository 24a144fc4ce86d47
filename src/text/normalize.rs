use tracing::warn;

use crate::engine::error::SkipReason;

/// One retained capture line: its offset and the data bytes it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceLine {
    pub offset: usize,
    pub bytes: Vec<u8>,
    /// Canonical form: offset token and byte tokens joined by single spaces.
    /// The position mapper walks exactly this text.
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based line number in the raw input.
    pub line_number: usize,
    pub text: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Parsed(TraceLine),
    Skipped(SkippedLine),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedText {
    pub lines: Vec<TraceLine>,
    pub skipped: Vec<SkippedLine>,
}

impl NormalizedText {
    /// The canonical text every character offset refers to.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn is_byte_token(token: &str) -> bool {
    token.len() == 2 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

fn parse_offset(token: &str) -> Option<usize> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    usize::from_str_radix(digits, 16).ok()
}

fn split_lines(raw: &str) -> impl Iterator<Item = &str> {
    raw.split("\r\n").flat_map(|chunk| chunk.split(['\r', '\n']))
}

struct Candidate<'a> {
    line_number: usize,
    raw: &'a str,
    tokens: Vec<&'a str>,
}

/// Classifies every line that looks like part of a trace. Blank lines and
/// lines without a single byte token are not trace lines and are dropped
/// silently; trace lines that cannot be used come back as `Skipped`.
pub fn classify_lines(raw: &str) -> Vec<LineOutcome> {
    let candidates: Vec<Candidate<'_>> = split_lines(raw)
        .enumerate()
        .filter_map(|(index, line)| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.iter().any(|token| is_byte_token(token)) {
                Some(Candidate {
                    line_number: index + 1,
                    raw: line,
                    tokens,
                })
            } else {
                None
            }
        })
        .collect();

    candidates
        .iter()
        .enumerate()
        .map(|(i, candidate)| {
            let next_offset = candidates
                .get(i + 1)
                .and_then(|next| parse_offset(next.tokens[0]));
            match parse_line(&candidate.tokens, next_offset) {
                Ok(line) => LineOutcome::Parsed(line),
                Err(reason) => LineOutcome::Skipped(SkippedLine {
                    line_number: candidate.line_number,
                    text: candidate.raw.to_string(),
                    reason,
                }),
            }
        })
        .collect()
}

fn parse_line(tokens: &[&str], next_offset: Option<usize>) -> Result<TraceLine, SkipReason> {
    let offset_token = tokens[0];
    let offset = parse_offset(offset_token).ok_or_else(|| SkipReason::InvalidOffset {
        token: offset_token.to_string(),
    })?;
    let data = &tokens[1..];

    // A following offset of 0 starts a new packet, so this line is the last
    // of its packet and, like the final line, takes every byte token.
    let byte_tokens: Vec<&str> = match next_offset {
        Some(next) if next != 0 => {
            let expected = next
                .checked_sub(offset)
                .ok_or(SkipReason::OffsetRegression { offset, next })?;
            let window = &data[..expected.min(data.len())];
            let found: Vec<&str> = window
                .iter()
                .copied()
                .filter(|token| is_byte_token(token))
                .collect();
            if found.len() != expected {
                return Err(SkipReason::MissingBytes {
                    expected,
                    found: found.len(),
                });
            }
            found
        }
        _ => data
            .iter()
            .copied()
            .filter(|token| is_byte_token(token))
            .collect(),
    };

    let mut bytes = Vec::with_capacity(byte_tokens.len());
    for token in &byte_tokens {
        let value = u8::from_str_radix(token, 16).map_err(|_| SkipReason::MissingBytes {
            expected: byte_tokens.len(),
            found: bytes.len(),
        })?;
        bytes.push(value);
    }

    let mut text = String::with_capacity(offset_token.len() + byte_tokens.len() * 3);
    text.push_str(offset_token);
    for token in &byte_tokens {
        text.push(' ');
        text.push_str(token);
    }

    Ok(TraceLine {
        offset,
        bytes,
        text,
    })
}

/// Normalizes raw capture text, logging and collecting every dropped line.
pub fn normalize(raw: &str) -> NormalizedText {
    let mut out = NormalizedText::default();
    for outcome in classify_lines(raw) {
        match outcome {
            LineOutcome::Parsed(line) => out.lines.push(line),
            LineOutcome::Skipped(skipped) => {
                warn!(
                    line = skipped.line_number,
                    reason = %skipped.reason,
                    "part of the capture was ignored"
                );
                out.skipped.push(skipped);
            }
        }
    }
    out
}
