use std::string::FromUtf8Error;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The stream is not positioned at an `"OW"` frame header.
    #[error("bad frame header: expected magic \"OW\"")]
    InvalidMagic,

    #[error("frame payload of {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { size: usize, max: usize },

    /// The frame arrived intact but its text is not UTF-8. The frame has
    /// been consumed, so the stream is still aligned.
    #[error("frame text is not UTF-8: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),

    #[error("frame I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// EOF, either between frames or inside one.
    #[error("stream closed by peer")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
