//! Byte-stream framing per spec §4.9 "Framing semantics" / §6.3.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::config::FramingMode;
use crate::error::FifoError;

/// Encode one message's payload bytes for `mode`.
pub fn encode_frame(mode: FramingMode, custom_delimiter: &[u8], payload: &[u8]) -> Vec<u8> {
    match mode {
        FramingMode::Newline | FramingMode::JsonLines => {
            let mut out = Vec::with_capacity(payload.len() + 1);
            out.extend_from_slice(payload);
            out.push(b'\n');
            out
        }
        FramingMode::LengthPrefixed => {
            let mut out = Vec::with_capacity(payload.len() + 4);
            out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
            out.extend_from_slice(payload);
            out
        }
        FramingMode::CustomDelimiter => {
            let mut out = Vec::with_capacity(payload.len() + custom_delimiter.len());
            out.extend_from_slice(payload);
            out.extend_from_slice(custom_delimiter);
            out
        }
        FramingMode::NullTerminated => {
            let mut out = Vec::with_capacity(payload.len() + 1);
            out.extend_from_slice(payload);
            out.push(0);
            out
        }
    }
}

pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    mode: FramingMode,
    custom_delimiter: &[u8],
    payload: &[u8],
) -> Result<(), FifoError> {
    let frame = encode_frame(mode, custom_delimiter, payload);
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Incrementally assembles frames out of a byte stream, buffering partial
/// reads across calls (needed for multi-byte `CUSTOM_DELIMITER` boundaries
/// and length-prefixed payloads split across TCP/pipe reads).
pub struct FrameReader {
    buf: Vec<u8>,
    max_message_size: usize,
}

impl FrameReader {
    pub fn new(max_message_size: usize) -> Self {
        FrameReader {
            buf: Vec::new(),
            max_message_size,
        }
    }

    /// Read and return the next complete frame's payload, or `Ok(None)` on
    /// clean EOF with no partial frame pending.
    pub async fn next_frame<R: AsyncReadExt + Unpin>(
        &mut self,
        reader: &mut R,
        mode: FramingMode,
        custom_delimiter: &[u8],
    ) -> Result<Option<Vec<u8>>, FifoError> {
        loop {
            if let Some(frame) = self.try_extract(mode, custom_delimiter)? {
                return Ok(Some(frame));
            }
            let mut chunk = [0u8; 4096];
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                return Ok(None);
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    fn try_extract(&mut self, mode: FramingMode, custom_delimiter: &[u8]) -> Result<Option<Vec<u8>>, FifoError> {
        match mode {
            FramingMode::Newline | FramingMode::JsonLines => {
                if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                    let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
                    line.pop();
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                    Ok(Some(line))
                } else {
                    Ok(None)
                }
            }
            FramingMode::NullTerminated => {
                if let Some(pos) = self.buf.iter().position(|&b| b == 0) {
                    let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
                    line.pop();
                    Ok(Some(line))
                } else {
                    Ok(None)
                }
            }
            FramingMode::CustomDelimiter => {
                if custom_delimiter.is_empty() {
                    return Err(FifoError::Framing("CUSTOM_DELIMITER requires a non-empty delimiter".into()));
                }
                if let Some(pos) = find_subslice(&self.buf, custom_delimiter) {
                    let payload = self.buf[..pos].to_vec();
                    self.buf.drain(..pos + custom_delimiter.len());
                    Ok(Some(payload))
                } else {
                    Ok(None)
                }
            }
            FramingMode::LengthPrefixed => {
                if self.buf.len() < 4 {
                    return Ok(None);
                }
                let len = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]) as usize;
                if len > self.max_message_size {
                    self.buf.clear();
                    return Err(FifoError::Framing(format!(
                        "length-prefixed frame of {len} bytes exceeds max {}",
                        self.max_message_size
                    )));
                }
                if self.buf.len() < 4 + len {
                    return Ok(None);
                }
                let payload = self.buf[4..4 + len].to_vec();
                self.buf.drain(..4 + len);
                Ok(Some(payload))
            }
        }
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn reads_newline_frames() {
        let mut cursor = Cursor::new(b"hello\nworld\n".to_vec());
        let mut fr = FrameReader::new(1024);
        let a = fr.next_frame(&mut cursor, FramingMode::Newline, &[]).await.unwrap();
        assert_eq!(a, Some(b"hello".to_vec()));
        let b = fr.next_frame(&mut cursor, FramingMode::Newline, &[]).await.unwrap();
        assert_eq!(b, Some(b"world".to_vec()));
    }

    #[tokio::test]
    async fn reads_length_prefixed_frame_split_across_reads() {
        let payload = b"0123456789012345678901234567890123456789012345678901234567890123"; // 64 bytes
        assert_eq!(payload.len(), 64);
        let mut bytes = (payload.len() as u32).to_be_bytes().to_vec();
        bytes.extend_from_slice(payload);
        let mut cursor = Cursor::new(bytes);
        let mut fr = FrameReader::new(1024);
        let frame = fr
            .next_frame(&mut cursor, FramingMode::LengthPrefixed, &[])
            .await
            .unwrap();
        assert_eq!(frame, Some(payload.to_vec()));
    }

    #[tokio::test]
    async fn oversized_length_prefix_is_a_framing_error() {
        let mut bytes = 0xFFFF_FFFFu32.to_be_bytes().to_vec();
        bytes.extend_from_slice(b"junk");
        let mut cursor = Cursor::new(bytes);
        let mut fr = FrameReader::new(1024);
        let result = fr.next_frame(&mut cursor, FramingMode::LengthPrefixed, &[]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn reads_custom_delimiter_frame() {
        let mut cursor = Cursor::new(b"abc###def###".to_vec());
        let mut fr = FrameReader::new(1024);
        let a = fr
            .next_frame(&mut cursor, FramingMode::CustomDelimiter, b"###")
            .await
            .unwrap();
        assert_eq!(a, Some(b"abc".to_vec()));
        let b = fr
            .next_frame(&mut cursor, FramingMode::CustomDelimiter, b"###")
            .await
            .unwrap();
        assert_eq!(b, Some(b"def".to_vec()));
    }
}
