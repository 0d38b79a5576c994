use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use objwire_transport::Socket;

use crate::codec::{encode_frame, FrameConfig, HEADER_SIZE};
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

/// Writes text frames to a byte stream, flushing after each one.
pub struct FrameWriter<T> {
    stream: T,
    scratch: BytesMut,
    max_payload_size: usize,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(stream: T) -> Self {
        Self::with_config(stream, FrameConfig::default())
    }

    pub fn with_config(stream: T, config: FrameConfig) -> Self {
        Self {
            stream,
            scratch: BytesMut::new(),
            max_payload_size: config.max_payload_size,
        }
    }

    /// Frame `text`, write it whole and flush.
    ///
    /// Text over the configured limit is refused before anything reaches the
    /// stream. A stream that accepts zero bytes is reported as
    /// [`FrameError::ConnectionClosed`].
    pub fn send(&mut self, text: &str) -> Result<()> {
        if text.len() > self.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: text.len(),
                max: self.max_payload_size,
            });
        }

        self.scratch.clear();
        self.scratch.reserve(HEADER_SIZE + text.len());
        encode_frame(text, &mut self.scratch)?;

        self.stream
            .write_all(&self.scratch)
            .and_then(|()| self.stream.flush())
            .map_err(|err| match err.kind() {
                ErrorKind::WriteZero => FrameError::ConnectionClosed,
                _ => FrameError::Io(err),
            })
    }

    #[cfg(test)]
    fn into_inner(self) -> T {
        self.stream
    }
}

impl FrameWriter<Socket> {
    /// Writer over a socket, with `config.write_timeout` applied to it.
    pub fn with_config_socket(socket: Socket, config: FrameConfig) -> Result<Self> {
        socket
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(socket, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_frame;

    /// In-memory sink that records each flush boundary.
    #[derive(Default)]
    struct Recorder {
        bytes: Vec<u8>,
        flushed_at: Vec<usize>,
        hiccups: usize,
    }

    impl Write for Recorder {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.hiccups > 0 {
                self.hiccups -= 1;
                return Err(ErrorKind::Interrupted.into());
            }
            // Accept at most five bytes per call to force short writes.
            let n = buf.len().min(5);
            self.bytes.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed_at.push(self.bytes.len());
            Ok(())
        }
    }

    fn texts(bytes: &[u8]) -> Vec<String> {
        let mut wire = BytesMut::from(bytes);
        std::iter::from_fn(|| decode_frame(&mut wire, usize::MAX).unwrap())
            .map(|frame| frame.into_text())
            .collect()
    }

    #[test]
    fn each_frame_is_flushed_whole() {
        let mut writer = FrameWriter::new(Recorder::default());
        writer.send(r#"{"$type":"u8","$value":1}"#).unwrap();
        writer.send("[]").unwrap();

        let sink = writer.into_inner();
        let first_len = HEADER_SIZE + r#"{"$type":"u8","$value":1}"#.len();
        assert_eq!(sink.flushed_at, vec![first_len, first_len + HEADER_SIZE + 2]);
        assert_eq!(texts(&sink.bytes), vec![r#"{"$type":"u8","$value":1}"#, "[]"]);
    }

    #[test]
    fn short_and_interrupted_writes_complete() {
        let sink = Recorder {
            hiccups: 2,
            ..Recorder::default()
        };
        let mut writer = FrameWriter::new(sink);
        writer.send("written in pieces").unwrap();

        assert_eq!(texts(&writer.into_inner().bytes), vec!["written in pieces"]);
    }

    #[test]
    fn oversized_text_never_hits_the_stream() {
        let config = FrameConfig {
            max_payload_size: 8,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Recorder::default(), config);

        let err = writer.send("nine bytes").unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 10, max: 8 }));
        assert!(writer.into_inner().bytes.is_empty());
    }

    #[test]
    fn zero_length_write_means_closed() {
        struct Full;

        impl Write for Full {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Ok(0)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let err = FrameWriter::new(Full).send("x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    #[cfg(unix)]
    fn peer_gone_is_io_error() {
        let (near, far) = Socket::pair().unwrap();
        drop(far);

        let config = FrameConfig {
            write_timeout: Some(std::time::Duration::from_millis(50)),
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config_socket(near, config).unwrap();
        assert!(matches!(writer.send("hello?"), Err(FrameError::Io(_))));
    }
}
