use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// A packet recovered from the capture text. The byte buffer is allocated
/// once and shared, read-only, by every node dissected from it.
#[derive(Debug, Clone)]
pub struct CapturePacket {
    pub index: usize,
    pub bytes: Arc<[u8]>,
    /// Span of the packet's lines in the normalized text.
    pub chars: Range<usize>,
}

impl CapturePacket {
    pub fn new(index: usize, bytes: Vec<u8>, chars: Range<usize>) -> Self {
        Self {
            index,
            bytes: Arc::from(bytes),
            chars,
        }
    }

    pub fn label(&self) -> String {
        format!("Packet {}", self.index)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Display for CapturePacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut offset = 0;

        while offset < self.bytes.len() {
            write!(f, "{:04x}   ", offset)?;

            let mut hex_part = String::new();
            let mut ascii_part = String::new();

            for i in 0..16 {
                if offset + i < self.bytes.len() {
                    let byte = self.bytes[offset + i];
                    hex_part.push_str(&format!("{:02x} ", byte));

                    ascii_part.push(if (32..=126).contains(&byte) {
                        byte as char
                    } else {
                        '.'
                    });
                } else {
                    hex_part.push_str("   ");
                }
            }

            writeln!(f, "{:<48}  {}", hex_part, ascii_part)?;
            offset += 16;
        }

        Ok(())
    }
}
