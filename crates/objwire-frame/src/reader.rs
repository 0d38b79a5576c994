use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use objwire_transport::{Socket, TransportError};

use crate::codec::{decode_frame, Frame, FrameConfig, HEADER_SIZE, MAGIC};
use crate::error::{FrameError, Result};

const READ_CHUNK: usize = 8 * 1024;

/// Pulls whole text frames off a byte stream.
///
/// Bytes that arrive before a read timeout stay in the internal buffer, so
/// after `WouldBlock`/`TimedOut` the caller can simply call
/// [`FrameReader::read_frame`] again without losing anything.
pub struct FrameReader<T> {
    stream: T,
    pending: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    pub fn new(stream: T) -> Self {
        Self::with_config(stream, FrameConfig::default())
    }

    pub fn with_config(stream: T, config: FrameConfig) -> Self {
        Self {
            stream,
            pending: BytesMut::with_capacity(READ_CHUNK),
            config,
        }
    }

    /// Block until one complete frame is available.
    ///
    /// EOF is [`FrameError::ConnectionClosed`], whether it lands between
    /// frames or inside one.
    pub fn read_frame(&mut self) -> Result<Frame> {
        while !self.has_frame()? {
            self.fill()?;
        }
        decode_frame(&mut self.pending, self.config.max_payload_size)?
            .ok_or(FrameError::ConnectionClosed)
    }

    /// Bytes received but not yet handed out as a frame.
    pub fn buffered_len(&self) -> usize {
        self.pending.len()
    }

    // Checks the header as soon as it is complete so garbage or oversized
    // input fails before the payload is buffered.
    fn has_frame(&self) -> Result<bool> {
        if self.pending.len() < HEADER_SIZE {
            return Ok(false);
        }
        if self.pending[..2] != MAGIC {
            return Err(FrameError::InvalidMagic);
        }
        let len = u32::from_le_bytes([
            self.pending[2],
            self.pending[3],
            self.pending[4],
            self.pending[5],
        ]) as usize;
        if len > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: len,
                max: self.config.max_payload_size,
            });
        }
        Ok(self.pending.len() >= HEADER_SIZE + len)
    }

    fn fill(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => {
                    self.pending.extend_from_slice(&chunk[..n]);
                    return Ok(());
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }
}

impl FrameReader<Socket> {
    /// Reader over a socket, with `config.read_timeout` applied to it.
    pub fn with_config_socket(socket: Socket, config: FrameConfig) -> Result<Self> {
        socket
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(socket, config))
    }
}

pub(crate) fn transport_to_frame_error(err: TransportError) -> FrameError {
    match err {
        TransportError::Io(io)
        | TransportError::Accept(io)
        | TransportError::NotConnected(io)
        | TransportError::Bind { source: io, .. }
        | TransportError::Connect { source: io, .. } => FrameError::Io(io),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
