use std::time::Duration;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// `"OW"`, the first two bytes of every frame.
pub const MAGIC: [u8; 2] = *b"OW";

/// Magic plus little-endian `u32` length.
pub const HEADER_SIZE: usize = MAGIC.len() + 4;

/// 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// The text carried by one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    text: String,
}

impl Frame {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Bytes this frame occupies on the wire, header included.
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.text.len()
    }
}

/// Append one frame holding `text` to `dst`.
///
/// ```text
/// +------+------+-----------------+------------------------+
/// | 'O'  | 'W'  | len: u32 LE     | len bytes of UTF-8     |
/// +------+------+-----------------+------------------------+
/// ```
pub fn encode_frame(text: &str, dst: &mut BytesMut) -> Result<()> {
    let len = u32::try_from(text.len()).map_err(|_| FrameError::PayloadTooLarge {
        size: text.len(),
        max: u32::MAX as usize,
    })?;
    dst.reserve(HEADER_SIZE + text.len());
    dst.put_slice(&MAGIC);
    dst.put_u32_le(len);
    dst.put_slice(text.as_bytes());
    Ok(())
}

/// Take one frame off the front of `src`.
///
/// `Ok(None)` means more bytes are needed; nothing is consumed. Header
/// problems are reported as soon as the header is complete. A payload that
/// is not UTF-8 is consumed before the error is returned, so the next call
/// starts at the following frame.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    let Some(mut header) = src.get(..HEADER_SIZE) else {
        return Ok(None);
    };
    if header[..MAGIC.len()] != MAGIC {
        return Err(FrameError::InvalidMagic);
    }
    header.advance(MAGIC.len());
    let len = header.get_u32_le() as usize;
    if len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: len,
            max: max_payload,
        });
    }
    if src.len() < HEADER_SIZE + len {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(len);
    let text = String::from_utf8(payload.to_vec())?;
    Ok(Some(Frame { text }))
}

/// Limits and socket timeouts used by [`FrameReader`](crate::FrameReader)
/// and [`FrameWriter`](crate::FrameWriter).
#[derive(Debug, Clone)]
pub struct FrameConfig {
    pub max_payload_size: usize,
    /// Applied to the socket by `FrameReader::with_config_socket`. `None`
    /// blocks indefinitely.
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(len: u32) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u32_le(len);
        buf
    }

    #[test]
    fn envelope_text_survives_framing() {
        let text = r#"{"$type":"Vec<i32>","$value":[1,2,3]}"#;
        let mut buf = BytesMut::new();
        encode_frame(text, &mut buf).unwrap();

        assert_eq!(&buf[..2], b"OW");
        assert_eq!(&buf[2..6], &(text.len() as u32).to_le_bytes());

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(frame.as_str(), text);
        assert_eq!(frame.wire_size(), HEADER_SIZE + text.len());
        assert!(buf.is_empty());
    }

    #[test]
    fn waits_for_complete_header_and_payload() {
        let mut buf = BytesMut::from(&b"OW\x05"[..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());

        let mut buf = header(5);
        buf.put_slice(b"ab");
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());
        assert_eq!(buf.len(), HEADER_SIZE + 2);

        buf.put_slice(b"cde");
        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(frame.into_text(), "abcde");
    }

    #[test]
    fn length_counts_bytes_not_chars() {
        let mut buf = BytesMut::new();
        encode_frame("größe", &mut buf).unwrap();
        assert_eq!(&buf[2..6], &7u32.to_le_bytes());
        assert_eq!(decode_frame(&mut buf, 7).unwrap().unwrap().as_str(), "größe");
    }

    #[test]
    fn rejects_foreign_bytes_and_oversized_frames() {
        let mut garbage = BytesMut::from(&b"\x00\x00\x00\x00\x00\x00"[..]);
        assert!(matches!(
            decode_frame(&mut garbage, DEFAULT_MAX_PAYLOAD),
            Err(FrameError::InvalidMagic)
        ));

        let mut big = header(DEFAULT_MAX_PAYLOAD as u32 + 1);
        assert!(matches!(
            decode_frame(&mut big, DEFAULT_MAX_PAYLOAD),
            Err(FrameError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn bad_utf8_frame_is_dropped_and_stream_stays_aligned() {
        let mut buf = header(2);
        buf.put_slice(&[0xC3, 0x28]);
        encode_frame("", &mut buf).unwrap();

        assert!(matches!(
            decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD),
            Err(FrameError::InvalidUtf8(_))
        ));
        let empty = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(empty, Frame::new(""));
    }
}
